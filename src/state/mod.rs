// State management module
//
// This module provides the StatusManager which wraps HmiStatus with thread-safe access
// and invokes registered status-update handlers after each dispatched action.

use crate::models::HmiStatus;
use std::sync::{Arc, PoisonError, RwLock};

/// Handler invoked after a status-changing action.
///
/// Receives whether the document actually changed and the new snapshot.
pub type StatusUpdateHandler = Box<dyn Fn(bool, &HmiStatus) + Send + Sync>;

/// Thread-safe holder of the status document with change notification
///
/// This is the central status component that:
/// - Provides non-torn snapshots of [`HmiStatus`] via `Arc<RwLock<T>>`
/// - Applies mutations handed to it by the dispatcher
/// - Invokes registered [`StatusUpdateHandler`]s synchronously on publish
///
/// # Write discipline
///
/// [`update()`](Self::update) and [`publish()`](Self::publish) are only called by
/// [`crate::hmi::ActionDispatcher`] while it holds its dispatch lock, so a
/// published snapshot always reflects exactly one fully-applied action. Readers
/// never take the dispatch lock.
///
/// # Related Types
///
/// - [`crate::models::HmiStatus`]: The underlying document
/// - [`crate::hmi::BroadcastHub`]: Primary status-update handler
pub struct StatusManager {
    /// The status document protected by RwLock for thread-safe access
    status: Arc<RwLock<HmiStatus>>,

    /// Handlers invoked on publish, in registration order
    handlers: Arc<RwLock<Vec<StatusUpdateHandler>>>,
}

impl StatusManager {
    /// Create a new StatusManager holding the given initial document
    pub fn new(initial: HmiStatus) -> Self {
        Self {
            status: Arc::new(RwLock::new(initial)),
            handlers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Get a read-only snapshot of the current status
    ///
    /// This clones the document, so it's safe to use without holding locks.
    pub fn snapshot(&self) -> HmiStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Execute a function with read access to the status
    ///
    /// # Example
    /// ```ignore
    /// let map = status_manager.read(|status| status.current_map.clone());
    /// ```
    pub fn read<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&HmiStatus) -> R,
    {
        let status = self.status.read().unwrap_or_else(PoisonError::into_inner);
        f(&status)
    }

    /// Apply a mutation under the write lock
    ///
    /// The closure reports whether it changed the document; that flag is
    /// returned as-is; nothing is inferred by comparing documents.
    pub(crate) fn update<F>(&self, update_fn: F) -> bool
    where
        F: FnOnce(&mut HmiStatus) -> bool,
    {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        update_fn(&mut status)
    }

    /// Invoke every registered handler with the current snapshot
    ///
    /// The write lock is released before handlers run so they can read freely.
    pub(crate) fn publish(&self, changed: bool) {
        let snapshot = self.snapshot();
        let handlers = self.handlers.read().unwrap_or_else(PoisonError::into_inner);
        for handler in handlers.iter() {
            handler(changed, &snapshot);
        }
    }

    /// Register a handler for status updates
    ///
    /// Handlers run synchronously inside the dispatch scope of every
    /// status-changing action.
    pub fn register_status_update_handler(&self, handler: StatusUpdateHandler) {
        self.handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }
}

impl Default for StatusManager {
    fn default() -> Self {
        Self::new(HmiStatus::default())
    }
}
