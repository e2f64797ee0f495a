//! Integration tests for action dispatch through the assembled hub
//!
//! These tests verify:
//! - One broadcast per status-changing action, none for rejected ones
//! - Monitor transitions on mode changes (stop before start, no-op reselect)
//! - Vehicle changes re-sending vehicle parameters
//! - Join ordering under concurrent dispatch
//! - Replay determinism of the status document

mod common;

use anyhow::Result;
use camino::Utf8Path;
use common::NoVehicle;
use mockall::{Sequence, mock};
use proptest::prelude::*;
use serde_json::Value;
use statushub::hmi::ChannelObserver;
use statushub::services::{LogLevel, MapService, MonitorLogBuffer};
use statushub::{
    Action, ActionDispatcher, DispatchError, Hmi, HmiAction, HmiStatus, HubConfig, Metrics,
    ModeRegistry, Monitor, StatusManager,
};
use std::fs;
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

const CALIBRATION: &str = "Lidar-GNSS Calibration";

mock! {
    pub TestMonitor {}

    impl Monitor for TestMonitor {
        fn start(&self) -> Result<()>;
        fn stop(&self);
        fn restart(&self) -> Result<()>;
        fn is_enabled(&self) -> bool;
        fn progress(&self) -> Value;
    }
}

struct NoopMaps;

impl MapService for NoopMaps {
    fn reload_map(&self, _map: &str) -> Result<()> {
        Ok(())
    }
}

/// Lays out maps, a vehicle and a preprocess table under a temp dir
fn create_hub_fixture() -> (TempDir, HubConfig) {
    let temp_dir = TempDir::new().unwrap();
    let root = Utf8Path::from_path(temp_dir.path()).unwrap().to_path_buf();

    fs::create_dir_all(root.join("maps/city_map")).unwrap();
    fs::create_dir_all(root.join("maps/airport")).unwrap();
    fs::create_dir_all(root.join("vehicles/mkz")).unwrap();
    fs::write(
        root.join("vehicles/mkz/vehicle_param.yaml"),
        "brand: Lincoln\nlength: 4.93\nwidth: 2.11\nwheel_base: 2.85\n",
    )
    .unwrap();
    fs::write(root.join("preprocess_table.yaml"), "main_sensor: lidar16\n").unwrap();

    let mut config = HubConfig {
        maps_dir: root.join("maps"),
        vehicles_dir: root.join("vehicles"),
        ..HubConfig::default()
    };
    config.preprocess.default_config_path = root.join("preprocess_table.yaml");
    config.preprocess.output_path = root.join("out/user.yaml");
    config.preprocess.extract_command = "true".to_string();

    (temp_dir, config)
}

fn drain(rx: &mut UnboundedReceiver<String>) -> Vec<Value> {
    let mut messages = Vec::new();
    while let Ok(message) = rx.try_recv() {
        messages.push(serde_json::from_str(&message).unwrap());
    }
    messages
}

fn bare_dispatcher(modes: ModeRegistry) -> ActionDispatcher {
    ActionDispatcher::new(
        Arc::new(StatusManager::new(HmiStatus {
            modules: [("Recorder".to_string(), false)].into_iter().collect(),
            ..HmiStatus::default()
        })),
        modes,
        Arc::new(NoopMaps),
        Arc::new(NoVehicle),
        MonitorLogBuffer::new("test"),
        Arc::new(Metrics::new()),
    )
}

#[test]
fn test_scenario_map_unknown_action_and_mode() {
    let (_temp_dir, config) = create_hub_fixture();
    let (hmi, preprocess) = Hmi::from_config(&config, Arc::new(Metrics::new())).unwrap();
    let (observer, mut rx) = ChannelObserver::new();
    hmi.connect(observer.clone());
    assert_eq!(drain(&mut rx).len(), 2);

    // CHANGE_MAP city_map -> exactly one broadcast
    hmi.handle_message(
        observer.as_ref(),
        r#"{"type":"HMIAction","action":"CHANGE_MAP","value":"city_map"}"#,
    )
    .unwrap();
    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["type"], "HMIStatus");
    assert_eq!(messages[0]["currentMap"], "city_map");

    // Frobnicate -> no broadcast, warning notification
    let mut notifications = hmi.notifier().subscribe();
    let result = hmi.handle_message(observer.as_ref(), r#"{"type":"HMIAction","action":"Frobnicate"}"#);
    assert!(result.is_err());
    assert!(drain(&mut rx).is_empty());
    let notification = notifications.try_recv().unwrap();
    assert_eq!(notification.level, LogLevel::Warn);
    assert!(notification.msg.contains("Frobnicate"));
    assert_eq!(hmi.dispatcher().status().snapshot().current_map, "city_map");

    // CHANGE_MODE calibration -> preprocess monitor started
    assert!(!preprocess.is_enabled());
    hmi.dispatcher()
        .trigger("CHANGE_MODE", Some(CALIBRATION))
        .unwrap();
    assert!(preprocess.is_enabled());
    assert_eq!(hmi.dispatcher().active_mode().as_deref(), Some(CALIBRATION));
    assert_eq!(drain(&mut rx).len(), 1);
}

#[test]
fn test_lists_come_from_disk() {
    let (_temp_dir, config) = create_hub_fixture();
    let (hmi, _preprocess) = Hmi::from_config(&config, Arc::new(Metrics::new())).unwrap();

    let status = hmi.dispatcher().status().snapshot();
    assert_eq!(status.maps, vec!["airport".to_string(), "city_map".to_string()]);
    assert_eq!(status.vehicles, vec!["mkz".to_string()]);
    assert_eq!(status.modes, config.modes);
}

#[test]
fn test_missing_map_surfaces_error_but_keeps_field() {
    let (_temp_dir, config) = create_hub_fixture();
    let (hmi, _preprocess) = Hmi::from_config(&config, Arc::new(Metrics::new())).unwrap();
    let (observer, mut rx) = ChannelObserver::new();
    hmi.connect(observer.clone());
    drain(&mut rx);
    let mut notifications = hmi.notifier().subscribe();

    let err = hmi
        .dispatcher()
        .trigger("CHANGE_MAP", Some("harbor"))
        .unwrap_err();

    assert!(matches!(err, DispatchError::MapReload { .. }));
    // The broadcast went out before the reload was attempted
    assert_eq!(drain(&mut rx).len(), 1);
    assert_eq!(hmi.dispatcher().status().snapshot().current_map, "harbor");
    let levels: Vec<_> = std::iter::from_fn(|| notifications.try_recv().ok())
        .map(|n| n.level)
        .collect();
    assert!(levels.contains(&LogLevel::Error));
}

#[test]
fn test_vehicle_change_rebroadcasts_vehicle_param() {
    let (_temp_dir, config) = create_hub_fixture();
    let (hmi, _preprocess) = Hmi::from_config(&config, Arc::new(Metrics::new())).unwrap();
    let (observer, mut rx) = ChannelObserver::new();
    hmi.connect(observer.clone());
    drain(&mut rx);

    hmi.dispatcher()
        .trigger("CHANGE_VEHICLE", Some("mkz"))
        .unwrap();

    let messages = drain(&mut rx);
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["type"], "HMIStatus");
    assert_eq!(messages[0]["currentVehicle"], "mkz");
    assert_eq!(messages[1]["type"], "VehicleParam");
    assert_eq!(messages[1]["brand"], "Lincoln");
    assert_eq!(messages[1]["wheelBase"], 2.85);
}

#[test]
fn test_stop_before_start_across_modes() {
    let mut seq = Sequence::new();
    let mut calibration = MockTestMonitor::new();
    let mut collection = MockTestMonitor::new();
    calibration
        .expect_start()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));
    calibration
        .expect_stop()
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());
    collection
        .expect_start()
        .times(1)
        .in_sequence(&mut seq)
        .returning(|| Ok(()));
    collection
        .expect_stop()
        .times(1)
        .in_sequence(&mut seq)
        .return_const(());

    let modes = ModeRegistry::new()
        .with("calibration", Arc::new(calibration))
        .with("collection", Arc::new(collection));
    let dispatcher = bare_dispatcher(modes);

    for mode in ["calibration", "calibration", "collection", "Standard", "Standard"] {
        dispatcher
            .dispatch(&Action::with_value(HmiAction::ChangeMode, mode))
            .unwrap();
    }

    assert!(dispatcher.active_mode().is_none());
    assert_eq!(dispatcher.status().snapshot().current_mode, "Standard");
}

#[test]
fn test_join_ordering_under_concurrent_dispatch() {
    let (_temp_dir, config) = create_hub_fixture();
    let (hmi, _preprocess) = Hmi::from_config(&config, Arc::new(Metrics::new())).unwrap();
    let hmi = Arc::new(hmi);

    let writer = {
        let hmi = Arc::clone(&hmi);
        thread::spawn(move || {
            for i in 0..200 {
                let map = if i % 2 == 0 { "city_map" } else { "airport" };
                hmi.dispatcher().trigger("CHANGE_MAP", Some(map)).unwrap();
            }
        })
    };

    let mut receivers = Vec::new();
    for _ in 0..20 {
        let (observer, rx) = ChannelObserver::new();
        hmi.connect(observer);
        receivers.push(rx);
    }
    writer.join().unwrap();

    for mut rx in receivers {
        let messages = drain(&mut rx);
        assert!(messages.len() >= 2);
        assert_eq!(messages[0]["type"], "HMIStatus");
        assert_eq!(messages[1]["type"], "VehicleParam");
        assert!(messages[2..].iter().all(|m| m["type"] == "HMIStatus"));
    }
}

fn action_strategy() -> impl Strategy<Value = Action> {
    let names = prop::sample::select(vec!["calibration", "Standard", "city_map", "Recorder"]);
    (0..HmiAction::ALL.len(), names).prop_map(|(index, value)| {
        let kind = HmiAction::ALL[index];
        if kind.requires_value() {
            Action::with_value(kind, value)
        } else {
            Action::new(kind)
        }
    })
}

fn replay(actions: &[Action]) -> (HmiStatus, Option<String>) {
    let mut monitor = MockTestMonitor::new();
    monitor.expect_start().returning(|| Ok(()));
    monitor.expect_stop().return_const(());
    monitor.expect_is_enabled().return_const(true);
    monitor.expect_restart().returning(|| Ok(()));
    let dispatcher = bare_dispatcher(ModeRegistry::new().with("calibration", Arc::new(monitor)));

    for action in actions {
        let _ = dispatcher.dispatch(action);
    }
    (dispatcher.status().snapshot(), dispatcher.active_mode())
}

proptest! {
    #[test]
    fn prop_replay_is_deterministic(actions in prop::collection::vec(action_strategy(), 0..40)) {
        let first = replay(&actions);
        let second = replay(&actions);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn prop_unknown_action_never_mutates(name in "[a-z][a-zA-Z]{0,12}") {
        let dispatcher = bare_dispatcher(ModeRegistry::new());
        let before = dispatcher.status().snapshot();

        prop_assert!(dispatcher.trigger(&name, Some("city_map")).is_err());
        prop_assert_eq!(dispatcher.status().snapshot(), before);
    }
}
