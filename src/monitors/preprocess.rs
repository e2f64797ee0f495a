//! Progress cache for the data-preprocess pipeline.
//!
//! The pipeline reports `{percentage, logString}` events on its own feed. While
//! the monitor is enabled each event overwrites the two progress fields of a
//! document seeded from the vehicle's preprocess table; observers pull that
//! document on demand.

use crate::config::ConfigManager;
use crate::metrics::Metrics;
use crate::models::PreprocessSettings;
use crate::monitors::Monitor;
use crate::services::VehicleManager;
use anyhow::Result;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// A single progress event from the preprocess pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub percentage: f64,
    #[serde(rename = "logString")]
    pub log_string: String,
}

impl Progress {
    pub fn new(percentage: f64, log_string: impl Into<String>) -> Self {
        Self {
            percentage,
            log_string: log_string.into(),
        }
    }
}

/// Enabled flag and document share one lock so that an event can never land
/// after `stop()` returns.
#[derive(Debug)]
struct CacheState {
    enabled: bool,
    document: Map<String, Value>,
}

/// Monitor that caches preprocess progress behind a reader-writer lock.
///
/// Readers ([`read`](Self::read)) share the lock; the progress writer and the
/// lifecycle transitions take it exclusively. This lock is independent of the
/// dispatcher's, so progress ingestion never waits on status actions.
pub struct PreprocessMonitor {
    state: RwLock<CacheState>,

    /// Last preprocess table that loaded, restored on every fresh start
    base: RwLock<Map<String, Value>>,

    settings: PreprocessSettings,
    vehicles: Arc<dyn VehicleManager>,
    metrics: Arc<Metrics>,
}

impl PreprocessMonitor {
    /// Create the monitor, loading its preprocess table.
    ///
    /// # Errors
    /// Fails when the table cannot be read or parsed. Callers at startup treat
    /// this as fatal.
    pub fn new(
        settings: PreprocessSettings,
        vehicles: Arc<dyn VehicleManager>,
        metrics: Arc<Metrics>,
    ) -> Result<Self> {
        let base = load_configuration(&settings, vehicles.as_ref())?;
        Ok(Self {
            state: RwLock::new(CacheState {
                enabled: false,
                document: base.clone(),
            }),
            base: RwLock::new(base),
            settings,
            vehicles,
            metrics,
        })
    }

    /// Record a progress event; dropped while disabled.
    pub fn on_progress(&self, progress: &Progress) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if !state.enabled {
            self.metrics.record_progress_dropped();
            return;
        }
        state
            .document
            .insert("progress".to_string(), Value::from(progress.percentage));
        state
            .document
            .insert("logString".to_string(), Value::from(progress.log_string.clone()));
        self.metrics.record_progress_event();
    }

    /// Copy of the full cached document.
    pub fn read(&self) -> Map<String, Value> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .document
            .clone()
    }
}

impl Monitor for PreprocessMonitor {
    fn start(&self) -> Result<()> {
        if self.is_enabled() {
            return Ok(());
        }

        // The vehicle may have changed while disabled
        let reloaded = load_configuration(&self.settings, self.vehicles.as_ref());
        if let Ok(base) = &reloaded {
            *self.base.write().unwrap_or_else(PoisonError::into_inner) = base.clone();
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if !state.enabled {
            state.document = self
                .base
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            state.enabled = true;
            tracing::debug!("Preprocess monitor started");
        }
        reloaded.map(|_| ())
    }

    fn stop(&self) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .enabled = false;
        tracing::debug!("Preprocess monitor stopped");
    }

    fn is_enabled(&self) -> bool {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .enabled
    }

    fn progress(&self) -> Value {
        Value::Object(self.read())
    }
}

/// Resolve the preprocess table path: vehicle-specific first, else the default.
fn configuration_path(settings: &PreprocessSettings, vehicles: &dyn VehicleManager) -> Utf8PathBuf {
    if let Some(vehicle_dir) = vehicles.vehicle_data_path() {
        let candidate = vehicle_dir.join(&settings.config_subpath);
        if candidate.exists() {
            return candidate;
        }
        tracing::warn!(
            "No preprocess table found in {}. Using default one instead.",
            vehicle_dir
        );
    }
    settings.default_config_path.clone()
}

fn load_configuration(
    settings: &PreprocessSettings,
    vehicles: &dyn VehicleManager,
) -> Result<Map<String, Value>> {
    let path = configuration_path(settings, vehicles);
    let table = ConfigManager::load_preprocess_table(&path)?;
    tracing::debug!("Preprocess configuration loaded from {}", path);
    Ok(table.to_json_map())
}

/// Consume the progress feed on a dedicated task.
///
/// The task ends when every sender is dropped.
pub fn spawn_progress_listener(
    monitor: Arc<PreprocessMonitor>,
    mut feed: mpsc::Receiver<Progress>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::debug!("Progress listener started");
        while let Some(progress) = feed.recv().await {
            monitor.on_progress(&progress);
        }
        tracing::debug!("Progress feed closed");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::vehicle::test_support::FixedVehicle;
    use camino::Utf8Path;
    use std::fs;
    use tempfile::TempDir;

    fn settings_in(dir: &Utf8Path) -> PreprocessSettings {
        PreprocessSettings {
            default_config_path: dir.join("default_table.yaml"),
            ..PreprocessSettings::default()
        }
    }

    fn monitor_with_default_table(contents: &str) -> (PreprocessMonitor, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let settings = settings_in(&dir);
        fs::write(&settings.default_config_path, contents).unwrap();

        let monitor = PreprocessMonitor::new(
            settings,
            Arc::new(FixedVehicle::default()),
            Arc::new(Metrics::new()),
        )
        .unwrap();
        (monitor, temp_dir)
    }

    #[test]
    fn test_loads_default_table() {
        let (monitor, _dir) = monitor_with_default_table("main_sensor: lidar16\n");

        let document = monitor.read();
        assert_eq!(document["main_sensor"], "lidar16");
        assert!(!monitor.is_enabled());
    }

    #[test]
    fn test_prefers_vehicle_table() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let settings = settings_in(&dir);
        fs::write(&settings.default_config_path, "source: default\n").unwrap();

        let vehicle_dir = dir.join("mkz");
        let vehicle_table = vehicle_dir.join(&settings.config_subpath);
        fs::create_dir_all(vehicle_table.parent().unwrap()).unwrap();
        fs::write(&vehicle_table, "source: vehicle\n").unwrap();

        let monitor = PreprocessMonitor::new(
            settings,
            Arc::new(FixedVehicle::with_data_path(vehicle_dir)),
            Arc::new(Metrics::new()),
        )
        .unwrap();

        assert_eq!(monitor.read()["source"], "vehicle");
    }

    #[test]
    fn test_start_picks_up_vehicle_changed_while_disabled() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let settings = settings_in(&dir);
        fs::write(&settings.default_config_path, "source: default\n").unwrap();

        let vehicle_dir = dir.join("mkz");
        let vehicle_table = vehicle_dir.join(&settings.config_subpath);
        fs::create_dir_all(vehicle_table.parent().unwrap()).unwrap();
        fs::write(&vehicle_table, "source: vehicle\n").unwrap();

        let vehicles = Arc::new(FixedVehicle::default());
        let monitor =
            PreprocessMonitor::new(settings, vehicles.clone(), Arc::new(Metrics::new())).unwrap();
        assert_eq!(monitor.read()["source"], "default");

        vehicles.set_data_path(Some(vehicle_dir));
        monitor.start().unwrap();

        assert_eq!(monitor.read()["source"], "vehicle");
    }

    #[test]
    fn test_failed_start_keeps_previous_table() {
        let (monitor, dir) = monitor_with_default_table("version: 1\n");

        fs::write(dir.path().join("default_table.yaml"), "[broken").unwrap();
        assert!(monitor.start().is_err());

        assert!(monitor.is_enabled());
        assert_eq!(monitor.read()["version"], 1);
    }

    #[test]
    fn test_start_while_enabled_skips_reload() {
        let (monitor, dir) = monitor_with_default_table("version: 1\n");
        monitor.start().unwrap();

        fs::write(dir.path().join("default_table.yaml"), "[broken").unwrap();

        assert!(monitor.start().is_ok());
        assert_eq!(monitor.read()["version"], 1);
    }

    #[test]
    fn test_unparseable_table_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
        let settings = settings_in(&dir);
        fs::write(&settings.default_config_path, "- not\n- a mapping\n").unwrap();

        let result = PreprocessMonitor::new(
            settings,
            Arc::new(FixedVehicle::default()),
            Arc::new(Metrics::new()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_table_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();

        let result = PreprocessMonitor::new(
            settings_in(&dir),
            Arc::new(FixedVehicle::default()),
            Arc::new(Metrics::new()),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_events_dropped_while_disabled() {
        let (monitor, _dir) = monitor_with_default_table("main_sensor: lidar16\n");

        monitor.on_progress(&Progress::new(10.0, "extracting"));

        let document = monitor.read();
        assert!(document.get("progress").is_none());
        assert!(document.get("logString").is_none());
    }

    #[test]
    fn test_progress_overwrites_fields() {
        let (monitor, _dir) = monitor_with_default_table("main_sensor: lidar16\n");
        monitor.start().unwrap();

        monitor.on_progress(&Progress::new(10.0, "extracting"));
        monitor.on_progress(&Progress::new(55.5, "aligning"));

        let document = monitor.read();
        assert_eq!(document["progress"], 55.5);
        assert_eq!(document["logString"], "aligning");
        assert_eq!(document["main_sensor"], "lidar16");
    }

    #[test]
    fn test_start_after_stop_clears_progress() {
        let (monitor, _dir) = monitor_with_default_table("main_sensor: lidar16\n");
        monitor.start().unwrap();
        monitor.on_progress(&Progress::new(80.0, "almost"));

        monitor.stop();
        monitor.start().unwrap();

        let document = monitor.read();
        assert!(document.get("progress").is_none());
        assert_eq!(document["main_sensor"], "lidar16");
    }

    #[test]
    fn test_start_while_enabled_keeps_progress() {
        let (monitor, _dir) = monitor_with_default_table("main_sensor: lidar16\n");
        monitor.start().unwrap();
        monitor.on_progress(&Progress::new(30.0, "running"));

        monitor.start().unwrap();

        assert_eq!(monitor.read()["progress"], 30.0);
    }

    #[test]
    fn test_restart_reloads_table() {
        let (monitor, dir) = monitor_with_default_table("version: 1\n");
        monitor.start().unwrap();
        monitor.on_progress(&Progress::new(42.0, "running"));

        fs::write(dir.path().join("default_table.yaml"), "version: 2\n").unwrap();
        monitor.restart().unwrap();

        let document = monitor.read();
        assert!(monitor.is_enabled());
        assert_eq!(document["version"], 2);
        assert!(document.get("progress").is_none());
    }

    #[test]
    fn test_failed_restart_keeps_previous_table() {
        let (monitor, dir) = monitor_with_default_table("version: 1\n");
        monitor.start().unwrap();

        fs::write(dir.path().join("default_table.yaml"), "[broken").unwrap();
        assert!(monitor.restart().is_err());

        assert!(monitor.is_enabled());
        assert_eq!(monitor.read()["version"], 1);
    }

    #[tokio::test]
    async fn test_listener_consumes_feed() {
        let (monitor, _dir) = monitor_with_default_table("main_sensor: lidar16\n");
        let monitor = Arc::new(monitor);
        monitor.start().unwrap();

        let (tx, rx) = mpsc::channel(8);
        let handle = spawn_progress_listener(Arc::clone(&monitor), rx);

        tx.send(Progress::new(12.0, "first")).await.unwrap();
        tx.send(Progress::new(24.0, "second")).await.unwrap();
        drop(tx);
        handle.await.unwrap();

        assert_eq!(monitor.read()["logString"], "second");
    }
}
