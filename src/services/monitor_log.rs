//! User-visible notification channel.
//!
//! Mirrors every message into `tracing` and fans it out to subscribers over a
//! tokio broadcast channel. This channel is distinct from the status
//! broadcast: it carries warnings about rejected input and collaborator
//! failures, not state.

use serde::Serialize;
use tokio::sync::broadcast;

/// Severity of a monitor message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// A single notification
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MonitorMessage {
    pub source: String,
    pub level: LogLevel,
    pub msg: String,
}

/// Cloneable handle to the notification channel.
///
/// Sending never fails: with no subscribers the message only reaches the log.
#[derive(Clone, Debug)]
pub struct MonitorLogBuffer {
    source: String,
    tx: broadcast::Sender<MonitorMessage>,
}

impl MonitorLogBuffer {
    /// Create a buffer tagging its messages with `source`
    ///
    /// # Returns
    /// A new buffer with a broadcast channel of 100 messages
    pub fn new(source: impl Into<String>) -> Self {
        let (tx, _) = broadcast::channel(100);
        Self {
            source: source.into(),
            tx,
        }
    }

    pub fn info(&self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::info!(source = %self.source, "{}", msg);
        self.emit(LogLevel::Info, msg);
    }

    pub fn warn(&self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::warn!(source = %self.source, "{}", msg);
        self.emit(LogLevel::Warn, msg);
    }

    pub fn error(&self, msg: impl Into<String>) {
        let msg = msg.into();
        tracing::error!(source = %self.source, "{}", msg);
        self.emit(LogLevel::Error, msg);
    }

    /// Subscribe to all future messages
    pub fn subscribe(&self) -> broadcast::Receiver<MonitorMessage> {
        self.tx.subscribe()
    }

    fn emit(&self, level: LogLevel, msg: String) {
        // Ignore send errors - it's OK if no one is listening
        let _ = self.tx.send(MonitorMessage {
            source: self.source.clone(),
            level,
            msg,
        });
    }
}
