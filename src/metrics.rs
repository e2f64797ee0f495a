// Performance metrics module
//
// Provides lightweight counters for dispatch, broadcast and progress ingestion

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Hub-wide counters
///
/// Uses atomic operations for thread-safe metric tracking without locks.
/// Shared as `Arc<Metrics>` between the dispatcher, the broadcast hub and the
/// progress monitor, and logged on shutdown.
#[derive(Debug)]
pub struct Metrics {
    /// Actions that passed validation and were applied
    pub actions_applied: AtomicU64,

    /// Actions rejected before mutation
    pub actions_rejected: AtomicU64,

    /// Actions whose field was published but whose collaborator failed
    pub actions_failed: AtomicU64,

    /// Status broadcasts fanned out
    pub broadcasts_sent: AtomicU64,

    /// Status notifications skipped because nothing changed
    pub broadcasts_skipped: AtomicU64,

    /// Individual messages delivered to observers
    pub observer_sends: AtomicU64,

    /// Deliveries that failed (observer gone)
    pub observer_send_errors: AtomicU64,

    /// Observers that joined
    pub observers_joined: AtomicU64,

    /// Progress events written to the cache
    pub progress_events: AtomicU64,

    /// Progress events dropped while the cache was disabled
    pub progress_dropped: AtomicU64,

    /// Hub start time
    start_time: Instant,
}

impl Metrics {
    /// Create a new Metrics instance
    pub fn new() -> Self {
        Self {
            actions_applied: AtomicU64::new(0),
            actions_rejected: AtomicU64::new(0),
            actions_failed: AtomicU64::new(0),
            broadcasts_sent: AtomicU64::new(0),
            broadcasts_skipped: AtomicU64::new(0),
            observer_sends: AtomicU64::new(0),
            observer_send_errors: AtomicU64::new(0),
            observers_joined: AtomicU64::new(0),
            progress_events: AtomicU64::new(0),
            progress_dropped: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_action_applied(&self) {
        self.actions_applied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_action_rejected(&self) {
        self.actions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_action_failed(&self) {
        self.actions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broadcast(&self) {
        self.broadcasts_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broadcast_skipped(&self) {
        self.broadcasts_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_observer_send(&self) {
        self.observer_sends.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_observer_send_error(&self) {
        self.observer_send_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_observer_joined(&self) {
        self.observers_joined.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_progress_event(&self) {
        self.progress_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_progress_dropped(&self) {
        self.progress_dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Get total uptime
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Log metrics summary
    pub fn log_summary(&self) {
        let uptime = self.uptime();
        tracing::info!("=== Hub Metrics Summary ===");
        tracing::info!("Uptime: {:.2}s", uptime.as_secs_f64());
        tracing::info!(
            "Actions: {} applied, {} rejected, {} failed",
            self.actions_applied.load(Ordering::Relaxed),
            self.actions_rejected.load(Ordering::Relaxed),
            self.actions_failed.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Broadcasts: {} sent, {} skipped (unchanged)",
            self.broadcasts_sent.load(Ordering::Relaxed),
            self.broadcasts_skipped.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Observers: {} joined, {} messages delivered, {} failed",
            self.observers_joined.load(Ordering::Relaxed),
            self.observer_sends.load(Ordering::Relaxed),
            self.observer_send_errors.load(Ordering::Relaxed)
        );
        tracing::info!(
            "Progress: {} events cached, {} dropped",
            self.progress_events.load(Ordering::Relaxed),
            self.progress_dropped.load(Ordering::Relaxed)
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
