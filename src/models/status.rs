use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Single source of truth for the global system status.
///
/// This is the document every observer sees. It is serialized as a typed
/// `HMIStatus` envelope on every status-changing action and on demand.
///
/// # Thread Safety
///
/// `HmiStatus` is held by [`crate::state::StatusManager`]. Never mutate it
/// directly - all writes go through [`crate::hmi::ActionDispatcher`], which
/// serializes them under its dispatch lock.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HmiStatus {
    // Current selections
    pub current_mode: String,
    pub current_map: String,
    pub current_vehicle: String,

    // Available choices
    pub modes: Vec<String>,
    pub maps: Vec<String>,
    pub vehicles: Vec<String>,

    // Module name -> running flag
    pub modules: IndexMap<String, bool>,
}

impl HmiStatus {
    /// Set the current map, returning whether the field changed.
    pub fn set_map(&mut self, map: &str) -> bool {
        replace_if_different(&mut self.current_map, map)
    }

    /// Set the current vehicle, returning whether the field changed.
    pub fn set_vehicle(&mut self, vehicle: &str) -> bool {
        replace_if_different(&mut self.current_vehicle, vehicle)
    }

    /// Set the current mode, returning whether the field changed.
    pub fn set_mode(&mut self, mode: &str) -> bool {
        replace_if_different(&mut self.current_mode, mode)
    }

    /// Set a module's running flag.
    ///
    /// Returns `None` when the module is not configured, otherwise whether
    /// the flag changed.
    pub fn set_module(&mut self, module: &str, running: bool) -> Option<bool> {
        let flag = self.modules.get_mut(module)?;
        let changed = *flag != running;
        *flag = running;
        Some(changed)
    }

    /// Mark every module as stopped, returning whether any flag changed.
    pub fn stop_all_modules(&mut self) -> bool {
        let mut changed = false;
        for running in self.modules.values_mut() {
            changed |= *running;
            *running = false;
        }
        changed
    }
}

fn replace_if_different(field: &mut String, value: &str) -> bool {
    if field == value {
        return false;
    }
    value.clone_into(field);
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_with_modules() -> HmiStatus {
        let mut status = HmiStatus::default();
        status.modules.insert("Recorder".to_string(), false);
        status.modules.insert("Localization".to_string(), true);
        status
    }

    #[test]
    fn test_default_status_is_empty() {
        let status = HmiStatus::default();
        assert!(status.current_map.is_empty());
        assert!(status.current_vehicle.is_empty());
        assert!(status.current_mode.is_empty());
        assert!(status.modules.is_empty());
    }

    #[test]
    fn test_set_map_reports_change() {
        let mut status = HmiStatus::default();
        assert!(status.set_map("city_map"));
        assert!(!status.set_map("city_map"));
        assert_eq!(status.current_map, "city_map");
    }

    #[test]
    fn test_set_unknown_module() {
        let mut status = status_with_modules();
        assert_eq!(status.set_module("Planning", true), None);
        assert_eq!(status.set_module("Recorder", true), Some(true));
        assert_eq!(status.set_module("Recorder", true), Some(false));
    }

    #[test]
    fn test_stop_all_modules() {
        let mut status = status_with_modules();
        assert!(status.stop_all_modules());
        assert!(!status.stop_all_modules());
        assert!(status.modules.values().all(|running| !running));
    }

    #[test]
    fn test_serializes_camel_case() {
        let mut status = HmiStatus::default();
        status.set_map("city_map");
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["currentMap"], "city_map");
        assert!(json.get("current_map").is_none());
    }
}
