//! Services module - collaborators the dispatcher drives.
//!
//! These are the boundaries to subsystems outside the status core. Each has a
//! trait (so tests and alternative deployments can substitute it) and a small
//! file-backed implementation used by the binary.
//!
//! # Components
//!
//! - [`MapService`] / [`FileMapService`]: Reloads map-derived data on `CHANGE_MAP`
//! - [`VehicleManager`] / [`VehicleStore`]: Loads vehicle geometry and sensor height on `CHANGE_VEHICLE`
//! - [`EventRecorder`]: Keeps submitted audio and drive events
//! - [`MonitorLogBuffer`]: User-visible notification channel
//! - [`process::spawn_detached`]: Fire-and-forget external command

pub mod events;
pub mod map;
pub mod monitor_log;
pub mod process;
pub mod vehicle;

pub use events::EventRecorder;
pub use map::{FileMapService, MapService};
pub use monitor_log::{LogLevel, MonitorLogBuffer, MonitorMessage};
pub use vehicle::{VehicleManager, VehicleStore};

use camino::Utf8Path;
use std::fs;

/// Sorted names of the subdirectories of `dir`.
///
/// A missing directory yields an empty list.
pub fn list_subdirectories(dir: &Utf8Path) -> Vec<String> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("Cannot list {}: {}", dir, e);
            return Vec::new();
        }
    };

    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    names
}
