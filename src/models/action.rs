use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// Known action kinds, named on the wire in SCREAMING_SNAKE_CASE.
///
/// Parsed from the raw request name through [`FromStr`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HmiAction {
    None,
    ChangeMap,
    ChangeVehicle,
    ChangeMode,
    StartModule,
    StopModule,
    ResetMode,
}

impl HmiAction {
    /// Every action kind, in declaration order.
    pub const ALL: [HmiAction; 7] = [
        HmiAction::None,
        HmiAction::ChangeMap,
        HmiAction::ChangeVehicle,
        HmiAction::ChangeMode,
        HmiAction::StartModule,
        HmiAction::StopModule,
        HmiAction::ResetMode,
    ];

    /// Wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            HmiAction::None => "NONE",
            HmiAction::ChangeMap => "CHANGE_MAP",
            HmiAction::ChangeVehicle => "CHANGE_VEHICLE",
            HmiAction::ChangeMode => "CHANGE_MODE",
            HmiAction::StartModule => "START_MODULE",
            HmiAction::StopModule => "STOP_MODULE",
            HmiAction::ResetMode => "RESET_MODE",
        }
    }

    /// Whether the effect of this action needs a `value`.
    pub fn requires_value(&self) -> bool {
        matches!(
            self,
            HmiAction::ChangeMap
                | HmiAction::ChangeVehicle
                | HmiAction::ChangeMode
                | HmiAction::StartModule
                | HmiAction::StopModule
        )
    }
}

impl fmt::Display for HmiAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when an action name is not part of the known catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid HMIAction string: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for HmiAction {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HmiAction::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

/// An immutable request for a single state transition.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Action {
    pub kind: HmiAction,
    pub value: Option<String>,
}

impl Action {
    pub fn new(kind: HmiAction) -> Self {
        Self { kind, value: None }
    }

    pub fn with_value(kind: HmiAction, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: Some(value.into()),
        }
    }
}

/// Body of an inbound `HMIAction` message.
///
/// The action name stays a raw string here so that decoding failures can be
/// reported with the offending name.
#[derive(Clone, Debug, Deserialize)]
pub struct ActionRequest {
    pub action: String,
    #[serde(default)]
    pub value: Option<String>,
}
