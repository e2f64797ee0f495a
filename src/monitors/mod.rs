//! Mode monitors - pluggable units selected by mode name.
//!
//! A [`Monitor`] is started when its mode is selected and stopped when another
//! mode (or an unknown one) replaces it. [`ModeRegistry`] is populated once at
//! startup; the dispatcher keeps a non-owning key to the current entry.
//!
//! # Components
//!
//! - [`Monitor`]: Start/stop/restart/enabled capability plus a progress read
//! - [`ModeRegistry`]: Ordered mode name -> monitor mapping
//! - [`PreprocessMonitor`]: Progress cache fed by the data-preprocess pipeline

pub mod preprocess;

pub use preprocess::{PreprocessMonitor, Progress, spawn_progress_listener};

use indexmap::IndexMap;
use std::sync::Arc;

/// Lifecycle capability shared by every mode monitor.
///
/// Implementations use interior mutability; all methods take `&self` so a
/// monitor can be shared between the dispatcher and its data feed.
#[cfg_attr(test, mockall::automock)]
pub trait Monitor: Send + Sync {
    /// Reinitialize from configuration and begin accepting data.
    ///
    /// Starting an enabled monitor has no effect. A reinitialization failure is
    /// returned after the monitor is enabled with its previous configuration.
    fn start(&self) -> anyhow::Result<()>;

    /// Stop accepting data.
    fn stop(&self);

    /// Stop, then start again.
    fn restart(&self) -> anyhow::Result<()> {
        self.stop();
        self.start()
    }

    fn is_enabled(&self) -> bool;

    /// Current progress document.
    fn progress(&self) -> serde_json::Value;
}

/// Fixed mapping from mode name to monitor.
#[derive(Default, Clone)]
pub struct ModeRegistry {
    monitors: IndexMap<String, Arc<dyn Monitor>>,
}

impl ModeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a monitor under a mode name, replacing any previous entry.
    pub fn register(&mut self, mode: impl Into<String>, monitor: Arc<dyn Monitor>) {
        let mode = mode.into();
        if self.monitors.insert(mode.clone(), monitor).is_some() {
            tracing::warn!("Monitor for mode {} registered twice, keeping the last", mode);
        }
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, mode: impl Into<String>, monitor: Arc<dyn Monitor>) -> Self {
        self.register(mode, monitor);
        self
    }

    pub fn get(&self, mode: &str) -> Option<&Arc<dyn Monitor>> {
        self.monitors.get(mode)
    }

    pub fn contains(&self, mode: &str) -> bool {
        self.monitors.contains_key(mode)
    }

    /// Registered mode names in registration order.
    pub fn modes(&self) -> impl Iterator<Item = &str> {
        self.monitors.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.monitors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.monitors.is_empty()
    }
}

impl std::fmt::Debug for ModeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModeRegistry")
            .field("modes", &self.monitors.keys().collect::<Vec<_>>())
            .finish()
    }
}
