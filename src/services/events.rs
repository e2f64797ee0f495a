use crate::models::{AudioEvent, DriveEvent};
use std::sync::{Mutex, PoisonError};

/// In-memory record of operator-submitted events.
#[derive(Debug, Default)]
pub struct EventRecorder {
    audio_events: Mutex<Vec<AudioEvent>>,
    drive_events: Mutex<Vec<DriveEvent>>,
}

impl EventRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit_audio_event(&self, event: AudioEvent) {
        tracing::info!(
            "Audio event at {}ms: obstacle={} type={} siren={}",
            event.event_time_ms,
            event.obstacle_id,
            event.audio_type,
            event.is_siren_on
        );
        self.audio_events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    pub fn submit_drive_event(&self, event: DriveEvent) {
        tracing::info!(
            "Drive event at {}ms: {} {:?} reportable={}",
            event.event_time_ms,
            event.event_msg,
            event.event_type,
            event.is_reportable
        );
        self.drive_events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    pub fn audio_events(&self) -> Vec<AudioEvent> {
        self.audio_events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn drive_events(&self) -> Vec<DriveEvent> {
        self.drive_events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
