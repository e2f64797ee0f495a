use serde::{Deserialize, Serialize};

/// An audio event reported by an operator.
///
/// Every field is required; a missing or wrongly typed field rejects the
/// whole submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioEvent {
    pub event_time_ms: u64,
    pub obstacle_id: i32,
    pub audio_type: i32,
    pub moving_result: i32,
    pub audio_direction: i32,
    pub is_siren_on: bool,
}

/// A drive event reported by an operator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriveEvent {
    pub event_time_ms: u64,
    pub event_msg: String,
    pub event_type: Vec<String>,
    pub is_reportable: bool,
}
