// BroadcastHub - fans status snapshots out to connected observers
//
// Every outbound message is a typed JSON envelope: the serialized document with
// an extra `type` field naming it ("HMIStatus", "VehicleParam", ...).

use crate::metrics::Metrics;
use crate::models::HmiStatus;
use crate::services::{MonitorLogBuffer, VehicleManager};
use crate::state::StatusManager;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::mpsc;

/// Envelope name of the status document
pub const STATUS_TYPE: &str = "HMIStatus";

/// Envelope name of the vehicle geometry document
pub const VEHICLE_PARAM_TYPE: &str = "VehicleParam";

/// Identity of a connected observer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl ObserverId {
    /// Allocate a process-unique id
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer-{}", self.0)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ObserverError {
    #[error("{0} disconnected")]
    Disconnected(ObserverId),
}

/// A connected client able to receive pushed messages.
///
/// `send` must deliver the payload as one whole message; the transport behind
/// it frames it however it likes.
pub trait Observer: Send + Sync {
    fn id(&self) -> ObserverId;

    fn send(&self, payload: &str) -> Result<(), ObserverError>;
}

/// Observer backed by an unbounded tokio channel.
///
/// The transport owns the receiving half and writes each message out.
#[derive(Debug)]
pub struct ChannelObserver {
    id: ObserverId,
    tx: mpsc::UnboundedSender<String>,
}

impl ChannelObserver {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let observer = Arc::new(Self {
            id: ObserverId::next(),
            tx,
        });
        (observer, rx)
    }
}

impl Observer for ChannelObserver {
    fn id(&self) -> ObserverId {
        self.id
    }

    fn send(&self, payload: &str) -> Result<(), ObserverError> {
        self.tx
            .send(payload.to_string())
            .map_err(|_| ObserverError::Disconnected(self.id))
    }
}

/// Serialize `value` as a typed envelope.
///
/// Objects get a `type` field added next to their own fields; any other
/// value is wrapped as `{type, data}`.
pub fn typed_json<T: Serialize>(type_name: &str, value: &T) -> serde_json::Result<String> {
    let envelope = match serde_json::to_value(value)? {
        Value::Object(mut fields) => {
            fields.insert("type".to_string(), Value::from(type_name));
            Value::Object(fields)
        }
        other => serde_json::json!({ "type": type_name, "data": other }),
    };
    serde_json::to_string(&envelope)
}

/// Fan-out of status snapshots to every connected observer
///
/// The observer list sits behind a mutex that every fan-out and every join
/// takes. A joining observer therefore receives its initial snapshots before
/// any later broadcast, and no broadcast is delivered half-way to a single
/// observer.
///
/// # Related Types
///
/// - [`crate::state::StatusManager`]: Source of status snapshots
/// - [`crate::hmi::ActionDispatcher`]: Triggers broadcasts through registered handlers
pub struct BroadcastHub {
    observers: Mutex<IndexMap<ObserverId, Arc<dyn Observer>>>,
    status: Arc<StatusManager>,
    vehicles: Arc<dyn VehicleManager>,
    notifier: MonitorLogBuffer,
    metrics: Arc<Metrics>,
}

impl BroadcastHub {
    pub fn new(
        status: Arc<StatusManager>,
        vehicles: Arc<dyn VehicleManager>,
        notifier: MonitorLogBuffer,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            observers: Mutex::new(IndexMap::new()),
            status,
            vehicles,
            notifier,
            metrics,
        }
    }

    /// Status-update handler: broadcast `status` when it changed.
    pub fn on_status_changed(&self, changed: bool, status: &HmiStatus) {
        if !changed {
            // Status doesn't change, skip broadcasting
            self.metrics.record_broadcast_skipped();
            return;
        }

        match typed_json(STATUS_TYPE, status) {
            Ok(payload) => {
                self.broadcast(&payload);
                self.metrics.record_broadcast();
            }
            Err(e) => {
                tracing::error!("Failed to serialize status: {}", e);
                return;
            }
        }

        if status.current_map.is_empty() {
            self.notifier.warn("You haven't selected a map yet!");
        }
        if status.current_vehicle.is_empty() {
            self.notifier.warn("You haven't selected a vehicle yet!");
        }
    }

    /// Register a new observer, sending it the current status and vehicle
    /// parameters first.
    pub fn on_observer_joined(&self, observer: Arc<dyn Observer>) {
        let mut observers = self.lock_observers();

        self.send_status(observer.as_ref());
        self.send_vehicle_param(Some(observer.as_ref()));

        tracing::info!("{} joined ({} connected)", observer.id(), observers.len() + 1);
        observers.insert(observer.id(), observer);
        self.metrics.record_observer_joined();
    }

    pub fn on_observer_left(&self, id: ObserverId) {
        if self.lock_observers().shift_remove(&id).is_some() {
            tracing::info!("{} left", id);
        }
    }

    /// Unicast the current status snapshot.
    pub fn send_status(&self, observer: &dyn Observer) {
        match typed_json(STATUS_TYPE, &self.status.snapshot()) {
            Ok(payload) => {
                self.send(observer, &payload);
            }
            Err(e) => tracing::error!("Failed to serialize status: {}", e),
        }
    }

    /// Send the active vehicle's parameters to one observer, or to all.
    pub fn send_vehicle_param(&self, target: Option<&dyn Observer>) {
        let payload = match typed_json(VEHICLE_PARAM_TYPE, &self.vehicles.vehicle_param()) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Failed to serialize vehicle param: {}", e);
                return;
            }
        };

        match target {
            Some(observer) => {
                self.send(observer, &payload);
            }
            None => self.broadcast(&payload),
        }
    }

    /// Deliver one payload to one observer.
    pub fn send(&self, observer: &dyn Observer, payload: &str) -> bool {
        match observer.send(payload) {
            Ok(()) => {
                self.metrics.record_observer_send();
                true
            }
            Err(e) => {
                tracing::debug!("Send failed: {}", e);
                self.metrics.record_observer_send_error();
                false
            }
        }
    }

    /// Deliver one payload to every observer, pruning those that are gone.
    pub fn broadcast(&self, payload: &str) {
        let mut observers = self.lock_observers();
        observers.retain(|_, observer| self.send(observer.as_ref(), payload));
    }

    pub fn observer_count(&self) -> usize {
        self.lock_observers().len()
    }

    fn lock_observers(&self) -> std::sync::MutexGuard<'_, IndexMap<ObserverId, Arc<dyn Observer>>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
