// ActionDispatcher - applies HMI actions to the status document
//
// One dispatch lock (the current-monitor slot) is held for the whole
// effect-then-publish sequence, so every published snapshot reflects exactly
// one applied action.

use crate::metrics::Metrics;
use crate::models::{Action, HmiAction};
use crate::monitors::{ModeRegistry, Monitor};
use crate::services::{MapService, MonitorLogBuffer, VehicleManager};
use crate::state::StatusManager;
use regex::Regex;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use thiserror::Error;

/// Handler invoked after the active vehicle changed.
pub type VehicleChangeHandler = Box<dyn Fn() + Send + Sync>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("Invalid HMIAction string: {0}")]
    UnknownAction(String),

    #[error("{0} requires a value")]
    MissingValue(HmiAction),

    #[error("Invalid value for {action}: {value:?}")]
    InvalidValue { action: HmiAction, value: String },

    #[error("Unknown module: {0}")]
    UnknownModule(String),

    #[error("Failed to load new simulation map {map}: {reason}")]
    MapReload { map: String, reason: String },

    #[error("Failed to load vehicle {vehicle}: {reason}")]
    VehicleReload { vehicle: String, reason: String },
}

impl DispatchError {
    /// True when the action was refused before anything was mutated.
    pub fn is_rejection(&self) -> bool {
        !matches!(
            self,
            DispatchError::MapReload { .. } | DispatchError::VehicleReload { .. }
        )
    }
}

/// Serializes every state transition of the hub.
///
/// Effects per action:
/// - `CHANGE_MAP`: set the map, then reload it through the [`MapService`]
/// - `CHANGE_VEHICLE`: set the vehicle, reload its profile, notify vehicle
///   handlers and restart the active monitor if it is enabled
/// - `CHANGE_MODE`: set the mode and switch the active monitor
/// - `START_MODULE` / `STOP_MODULE`: flip a configured module flag
/// - `RESET_MODE`: stop every module
/// - `NONE`: nothing
///
/// The status is published right after the document mutation, before any
/// collaborator runs; a collaborator failure does not roll the field back.
pub struct ActionDispatcher {
    /// Mode of the active monitor. Doubles as the dispatch lock.
    current_monitor: Mutex<Option<String>>,

    /// The active monitor itself, written only under the dispatch lock so
    /// progress reads never wait on an action.
    active_monitor: RwLock<Option<Arc<dyn Monitor>>>,

    status: Arc<StatusManager>,
    modes: ModeRegistry,
    map_service: Arc<dyn MapService>,
    vehicles: Arc<dyn VehicleManager>,
    vehicle_handlers: RwLock<Vec<VehicleChangeHandler>>,
    notifier: MonitorLogBuffer,
    metrics: Arc<Metrics>,

    /// Names that end up in filesystem paths must match this
    name_pattern: Regex,
}

impl ActionDispatcher {
    pub fn new(
        status: Arc<StatusManager>,
        modes: ModeRegistry,
        map_service: Arc<dyn MapService>,
        vehicles: Arc<dyn VehicleManager>,
        notifier: MonitorLogBuffer,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            current_monitor: Mutex::new(None),
            active_monitor: RwLock::new(None),
            status,
            modes,
            map_service,
            vehicles,
            vehicle_handlers: RwLock::new(Vec::new()),
            notifier,
            metrics,
            name_pattern: Regex::new(r"^[A-Za-z0-9][A-Za-z0-9 _.\-]*$")
                .expect("Invalid name regex"),
        }
    }

    /// Decode an action by wire name and dispatch it.
    pub fn trigger(&self, name: &str, value: Option<&str>) -> Result<bool, DispatchError> {
        let result = name
            .parse::<HmiAction>()
            .map_err(|e| DispatchError::UnknownAction(e.0))
            .and_then(|kind| {
                self.apply(&Action {
                    kind,
                    value: value.map(str::to_string),
                })
            });
        self.report(result)
    }

    /// Apply one action.
    ///
    /// Returns whether the status document changed. Errors are already
    /// logged and notified when this returns.
    pub fn dispatch(&self, action: &Action) -> Result<bool, DispatchError> {
        let result = self.apply(action);
        self.report(result)
    }

    /// Register a handler run after every successful vehicle change.
    pub fn register_vehicle_change_handler(&self, handler: VehicleChangeHandler) {
        self.vehicle_handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    /// Mode name of the active monitor
    pub fn active_mode(&self) -> Option<String> {
        self.lock_current().clone()
    }

    /// The active monitor, if any. Does not take the dispatch lock.
    pub fn current_monitor(&self) -> Option<Arc<dyn Monitor>> {
        self.active_monitor
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn status(&self) -> &Arc<StatusManager> {
        &self.status
    }

    pub fn modes(&self) -> &ModeRegistry {
        &self.modes
    }

    fn lock_current(&self) -> MutexGuard<'_, Option<String>> {
        self.current_monitor
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn report(&self, result: Result<bool, DispatchError>) -> Result<bool, DispatchError> {
        match &result {
            Ok(changed) => {
                self.metrics.record_action_applied();
                tracing::debug!("Action applied (changed: {})", changed);
            }
            Err(e) if e.is_rejection() => {
                self.metrics.record_action_rejected();
                self.notifier.warn(e.to_string());
            }
            Err(e) => {
                self.metrics.record_action_failed();
                self.notifier.error(e.to_string());
            }
        }
        result
    }

    fn validated_value<'a>(&self, action: &'a Action) -> Result<&'a str, DispatchError> {
        let value = action
            .value
            .as_deref()
            .ok_or(DispatchError::MissingValue(action.kind))?;
        if !self.name_pattern.is_match(value) {
            return Err(DispatchError::InvalidValue {
                action: action.kind,
                value: value.to_string(),
            });
        }
        Ok(value)
    }

    fn apply(&self, action: &Action) -> Result<bool, DispatchError> {
        let value = if action.kind.requires_value() {
            Some(self.validated_value(action)?)
        } else {
            None
        };

        let mut current = self.lock_current();
        tracing::info!(
            "HMIAction {} {}",
            action.kind,
            value.unwrap_or_default()
        );

        match (action.kind, value) {
            (HmiAction::ChangeMap, Some(map)) => {
                let changed = self.status.update(|s| s.set_map(map));
                self.status.publish(changed);

                self.map_service
                    .reload_map(map)
                    .map_err(|e| DispatchError::MapReload {
                        map: map.to_string(),
                        reason: format!("{:#}", e),
                    })?;
                Ok(changed)
            }
            (HmiAction::ChangeVehicle, Some(vehicle)) => {
                let changed = self.status.update(|s| s.set_vehicle(vehicle));
                self.status.publish(changed);

                self.vehicles
                    .use_vehicle(vehicle)
                    .map_err(|e| DispatchError::VehicleReload {
                        vehicle: vehicle.to_string(),
                        reason: format!("{:#}", e),
                    })?;
                for handler in self
                    .vehicle_handlers
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .iter()
                {
                    handler();
                }
                self.restart_enabled_monitor(current.as_deref());
                Ok(changed)
            }
            (HmiAction::ChangeMode, Some(mode)) => {
                let changed = self.status.update(|s| s.set_mode(mode));
                self.status.publish(changed);

                self.switch_monitor(&mut current, mode);
                Ok(changed)
            }
            (HmiAction::StartModule | HmiAction::StopModule, Some(module)) => {
                if !self.status.read(|s| s.modules.contains_key(module)) {
                    return Err(DispatchError::UnknownModule(module.to_string()));
                }
                let running = action.kind == HmiAction::StartModule;
                let changed = self
                    .status
                    .update(|s| s.set_module(module, running).unwrap_or(false));
                self.status.publish(changed);
                Ok(changed)
            }
            (HmiAction::ResetMode, _) => {
                let changed = self.status.update(|s| s.stop_all_modules());
                self.status.publish(changed);
                Ok(changed)
            }
            _ => {
                self.status.publish(false);
                Ok(false)
            }
        }
    }

    /// Move the active slot to `mode`'s monitor, or clear it when `mode` has none.
    ///
    /// `current` is the held dispatch lock.
    fn switch_monitor(&self, current: &mut Option<String>, mode: &str) {
        let Some(next) = self.modes.get(mode) else {
            if let Some(previous) = current.take() {
                self.set_active_monitor(None);
                if let Some(monitor) = self.modes.get(&previous) {
                    monitor.stop();
                }
                tracing::info!("Mode {} has no monitor, {} stopped", mode, previous);
            }
            return;
        };

        if current.as_deref() == Some(mode) {
            tracing::debug!("Monitor for {} already active", mode);
            return;
        }

        if let Some(previous) = current.as_deref().and_then(|m| self.modes.get(m)) {
            previous.stop();
        }
        *current = Some(mode.to_string());
        self.set_active_monitor(Some(Arc::clone(next)));
        match next.start() {
            Ok(()) => tracing::info!("Monitor for {} started", mode),
            Err(e) => self.notifier.error(format!(
                "Monitor for {} started with its previous configuration: {:#}",
                mode, e
            )),
        }
    }

    fn set_active_monitor(&self, monitor: Option<Arc<dyn Monitor>>) {
        *self
            .active_monitor
            .write()
            .unwrap_or_else(PoisonError::into_inner) = monitor;
    }

    fn restart_enabled_monitor(&self, current: Option<&str>) {
        let Some((mode, monitor)) = current.and_then(|m| self.modes.get(m).map(|mon| (m, mon)))
        else {
            return;
        };
        if !monitor.is_enabled() {
            return;
        }
        if let Err(e) = monitor.restart() {
            self.notifier
                .error(format!("Failed to restart monitor for {}: {:#}", mode, e));
        }
    }
}
