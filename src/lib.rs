// statushub - status synchronization hub for an operator console
//
// This is the library crate containing the dispatcher, broadcast hub, progress
// monitors and their collaborators. The binary crate (main.rs) serves one
// observer over stdin/stdout.

pub mod config;
pub mod hmi;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod monitors;
pub mod services;
pub mod state;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use hmi::{ActionDispatcher, BroadcastHub, DispatchError, Hmi, MessageError, Observer};
pub use metrics::Metrics;
pub use models::{Action, HmiAction, HmiStatus, HubConfig};
pub use monitors::{ModeRegistry, Monitor, PreprocessMonitor};
pub use state::StatusManager;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
