//! Data models for the status hub.
//!
//! - [`HmiStatus`]: The status document broadcast to every observer
//! - [`Action`] / [`HmiAction`]: Named requests that drive state transitions
//! - [`AudioEvent`] / [`DriveEvent`]: Operator-submitted event records
//! - [`HubConfig`]: Process configuration loaded from `statushub.yaml`
//! - [`VehicleParam`] / [`PreprocessTable`]: Vehicle-derived documents
//!
//! All wire-facing structs derive `Serialize`/`Deserialize`; the JSON casing of
//! each follows what observers expect (camelCase for status and vehicle
//! envelopes, snake_case for event submissions).

pub mod action;
pub mod config;
pub mod events;
pub mod status;

pub use action::{Action, ActionRequest, HmiAction, UnknownAction};
pub use config::{HubConfig, PreprocessSettings, PreprocessTable, SensorHeight, VehicleParam};
pub use events::{AudioEvent, DriveEvent};
pub use status::HmiStatus;
