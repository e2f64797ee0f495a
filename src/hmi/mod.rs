//! HMI module - the status hub proper.
//!
//! Wires the [`ActionDispatcher`] to the [`BroadcastHub`] and routes inbound
//! observer messages by their `type` field.
//!
//! # Components
//!
//! - [`ActionDispatcher`]: Serialized application of actions to the status document
//! - [`BroadcastHub`]: Fan-out of snapshots to observers
//! - [`Hmi`]: Message router and assembly of the whole hub
//!
//! # Inbound messages
//!
//! | `type`             | Handling                                              |
//! |--------------------|-------------------------------------------------------|
//! | `HMIAction`        | `{action, value?}` dispatched                          |
//! | `SubmitAudioEvent` | recorded, notification on success or failure           |
//! | `SubmitDriveEvent` | recorded, notification on success or failure           |
//! | `HMIStatus`        | current status resent to the sender                    |
//! | `MonitorProgress`  | active monitor's progress sent to the sender           |
//! | `Preprocess`       | table persisted, extraction command launched           |

pub mod broadcast;
pub mod dispatcher;

pub use broadcast::{
    BroadcastHub, ChannelObserver, Observer, ObserverError, ObserverId, typed_json,
};
pub use dispatcher::{ActionDispatcher, DispatchError, VehicleChangeHandler};

use crate::config::ConfigManager;
use crate::metrics::Metrics;
use crate::models::{
    ActionRequest, AudioEvent, DriveEvent, HmiAction, HmiStatus, HubConfig, PreprocessSettings,
    PreprocessTable,
};
use crate::monitors::{ModeRegistry, PreprocessMonitor};
use crate::services::{
    self, EventRecorder, FileMapService, MonitorLogBuffer, VehicleManager, VehicleStore,
};
use crate::state::StatusManager;
use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;

/// Envelope name of a progress reply
pub const MONITOR_PROGRESS_TYPE: &str = "MonitorProgress";

#[derive(Error, Debug)]
pub enum MessageError {
    #[error("Malformed message: {0}")]
    Malformed(String),

    #[error("Unknown message type: {0}")]
    UnknownType(String),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("Preprocess submission failed: {0}")]
    Preprocess(String),
}

/// Entry point for observers: connection lifecycle plus message routing.
///
/// # Example
/// ```ignore
/// let (hmi, preprocess) = Hmi::from_config(&config, metrics)?;
/// let (observer, mut outbound) = ChannelObserver::new();
/// hmi.connect(observer.clone());
/// hmi.handle_message(observer.as_ref(), r#"{"type":"HMIAction","action":"CHANGE_MAP","value":"city_map"}"#)?;
/// ```
pub struct Hmi {
    dispatcher: Arc<ActionDispatcher>,
    hub: Arc<BroadcastHub>,
    events: EventRecorder,
    notifier: MonitorLogBuffer,
    preprocess: PreprocessSettings,
}

impl Hmi {
    /// Connect `hub` to the dispatcher's status and vehicle notifications.
    pub fn new(
        dispatcher: Arc<ActionDispatcher>,
        hub: Arc<BroadcastHub>,
        notifier: MonitorLogBuffer,
        preprocess: PreprocessSettings,
    ) -> Self {
        let status_hub = Arc::downgrade(&hub);
        dispatcher
            .status()
            .register_status_update_handler(Box::new(move |changed, status| {
                if let Some(hub) = status_hub.upgrade() {
                    hub.on_status_changed(changed, status);
                }
            }));

        let vehicle_hub = Arc::downgrade(&hub);
        dispatcher.register_vehicle_change_handler(Box::new(move || {
            if let Some(hub) = vehicle_hub.upgrade() {
                hub.send_vehicle_param(None);
            }
        }));

        Self {
            dispatcher,
            hub,
            events: EventRecorder::new(),
            notifier,
            preprocess,
        }
    }

    /// Assemble the hub from configuration.
    ///
    /// Selects the default vehicle, loads the preprocess table (fatal on
    /// failure) and enters the default mode. Returns the preprocess monitor so
    /// the caller can attach its progress feed.
    pub fn from_config(
        config: &HubConfig,
        metrics: Arc<Metrics>,
    ) -> Result<(Self, Arc<PreprocessMonitor>)> {
        let notifier = MonitorLogBuffer::new("HMI");

        let vehicles = Arc::new(VehicleStore::new(
            &config.vehicles_dir,
            &config.vehicle_param_file,
            &config.sensor_height_file,
        ));
        if !config.default_vehicle.is_empty() {
            if let Err(e) = vehicles.use_vehicle(&config.default_vehicle) {
                tracing::warn!("Default vehicle {} unavailable: {:#}", config.default_vehicle, e);
            }
        }

        let preprocess = Arc::new(
            PreprocessMonitor::new(
                config.preprocess.clone(),
                vehicles.clone(),
                Arc::clone(&metrics),
            )
            .context("Failed to initialize the preprocess monitor")?,
        );
        let modes = ModeRegistry::new().with(config.preprocess.mode.clone(), preprocess.clone());

        let status = Arc::new(StatusManager::new(initial_status(config)));
        let dispatcher = Arc::new(ActionDispatcher::new(
            Arc::clone(&status),
            modes,
            Arc::new(FileMapService::new(&config.maps_dir)),
            vehicles.clone(),
            notifier.clone(),
            Arc::clone(&metrics),
        ));
        let hub = Arc::new(BroadcastHub::new(status, vehicles, notifier.clone(), metrics));
        let hmi = Self::new(dispatcher, hub, notifier, config.preprocess.clone());

        if !config.default_mode.is_empty() {
            // Failures are already reported on the notification channel
            let _ = hmi
                .dispatcher
                .trigger(HmiAction::ChangeMode.as_str(), Some(config.default_mode.as_str()));
        }

        let (maps, vehicles) = hmi
            .dispatcher
            .status()
            .read(|s| (s.maps.len(), s.vehicles.len()));
        tracing::info!(
            "Hub ready: {} modes, {} maps, {} vehicles",
            config.modes.len(),
            maps,
            vehicles
        );
        Ok((hmi, preprocess))
    }

    /// Register an observer; it receives the current status and vehicle
    /// parameters before anything else.
    pub fn connect(&self, observer: Arc<dyn Observer>) {
        self.hub.on_observer_joined(observer);
    }

    pub fn disconnect(&self, id: ObserverId) {
        self.hub.on_observer_left(id);
    }

    /// Route one inbound JSON message from `observer`.
    ///
    /// Rejections are logged and notified here; the returned error is for
    /// callers that want to inspect it.
    pub fn handle_message(&self, observer: &dyn Observer, raw: &str) -> Result<(), MessageError> {
        let mut json: Value = serde_json::from_str(raw).map_err(|e| {
            tracing::error!("Failed to parse JSON message: {}", e);
            MessageError::Malformed(e.to_string())
        })?;
        let kind = json
            .get("type")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                tracing::error!("Message without a type: {}", raw);
                MessageError::Malformed("missing type".to_string())
            })?;
        if let Some(fields) = json.as_object_mut() {
            fields.remove("type");
        }

        match kind.as_str() {
            "HMIAction" => {
                let request: ActionRequest = decode(json).inspect_err(|_| {
                    tracing::error!("Truncated HMIAction request.");
                })?;
                self.dispatcher
                    .trigger(&request.action, request.value.as_deref())?;
                Ok(())
            }
            "SubmitAudioEvent" => match decode::<AudioEvent>(json) {
                Ok(event) => {
                    self.events.submit_audio_event(event);
                    self.notifier.info("Audio event added.");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!("Truncated SubmitAudioEvent request.");
                    self.notifier.warn("Failed to submit an audio event.");
                    Err(e)
                }
            },
            "SubmitDriveEvent" => match decode::<DriveEvent>(json) {
                Ok(event) => {
                    self.events.submit_drive_event(event);
                    self.notifier.info("Drive event added.");
                    Ok(())
                }
                Err(e) => {
                    tracing::error!("Truncated SubmitDriveEvent request.");
                    self.notifier.warn("Failed to submit a drive event.");
                    Err(e)
                }
            },
            "HMIStatus" => {
                self.hub.send_status(observer);
                Ok(())
            }
            "MonitorProgress" => {
                self.send_monitor_progress(observer);
                Ok(())
            }
            "Preprocess" => self.submit_preprocess(json),
            other => {
                tracing::warn!("Unknown message type: {}", other);
                Err(MessageError::UnknownType(other.to_string()))
            }
        }
    }

    pub fn dispatcher(&self) -> &Arc<ActionDispatcher> {
        &self.dispatcher
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn events(&self) -> &EventRecorder {
        &self.events
    }

    pub fn notifier(&self) -> &MonitorLogBuffer {
        &self.notifier
    }

    fn send_monitor_progress(&self, observer: &dyn Observer) {
        let progress = self
            .dispatcher
            .current_monitor()
            .map(|monitor| monitor.progress())
            .unwrap_or_else(|| Value::Object(Map::new()));

        match typed_json(MONITOR_PROGRESS_TYPE, &progress) {
            Ok(payload) => {
                self.hub.send(observer, &payload);
            }
            Err(e) => tracing::error!("Failed to serialize monitor progress: {}", e),
        }
    }

    fn submit_preprocess(&self, payload: Value) -> Result<(), MessageError> {
        let table = decode::<PreprocessTable>(payload)
            .and_then(|table| {
                if table.fields.is_empty() {
                    Err(MessageError::Malformed("empty preprocess table".to_string()))
                } else {
                    Ok(table)
                }
            })
            .inspect_err(|e| {
                tracing::error!("Invalid preprocess table: {}", e);
                self.notifier
                    .error("Failed to get user configuration: invalid preprocess table.");
            })?;

        let output_path = &self.preprocess.output_path;
        ConfigManager::save_preprocess_table(output_path, &table).map_err(|e| {
            let msg = format!("Failed to generate user configuration file: {:#}", e);
            self.notifier.error(msg.clone());
            MessageError::Preprocess(msg)
        })?;
        tracing::info!("Saved user configuration to {}", output_path);

        services::process::spawn_detached(&self.preprocess.extract_command, self.notifier.clone())
            .map_err(|e| {
                let msg = format!("{:#}", e);
                self.notifier.error(msg.clone());
                MessageError::Preprocess(msg)
            })?;
        Ok(())
    }
}

fn decode<T: DeserializeOwned>(json: Value) -> Result<T, MessageError> {
    serde_json::from_value(json).map_err(|e| MessageError::Malformed(e.to_string()))
}

/// Initial status document: configured modes and modules, maps and vehicles
/// found on disk, default selections.
pub fn initial_status(config: &HubConfig) -> HmiStatus {
    HmiStatus {
        current_mode: String::new(),
        current_map: config.default_map.clone(),
        current_vehicle: config.default_vehicle.clone(),
        modes: config.modes.clone(),
        maps: services::list_subdirectories(&config.maps_dir),
        vehicles: services::list_subdirectories(&config.vehicles_dir),
        modules: config
            .modules
            .iter()
            .map(|module| (module.clone(), false))
            .collect::<IndexMap<_, _>>(),
    }
}
