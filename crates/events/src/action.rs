//! Identifiers for fault actions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Identifies one fault action.
///
/// The wire names follow the `*_ACTION_TYPE` convention the monitored node
/// and the control API use; [`FromStr`] also accepts the short kebab-case
/// names used in configuration files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ActionType {
    /// Do nothing.
    #[serde(rename = "NOOP_ACTION_TYPE")]
    Noop,
    /// Block the agent for a configured duration.
    #[serde(rename = "HALT_ACTION_TYPE")]
    Halt,
    /// Suspend the monitored process.
    #[serde(rename = "PAUSE_ACTION_TYPE")]
    Pause,
    /// Resume a suspended process.
    #[serde(rename = "CONTINUE_ACTION_TYPE")]
    Continue,
    /// Stop the monitored process or container.
    #[serde(rename = "STOP_ACTION_TYPE")]
    Stop,
    /// Restart a stopped process or container.
    #[serde(rename = "RESTART_ACTION_TYPE")]
    Restart,
    /// Resend the previously sent message.
    #[serde(rename = "RESEND_LAST_MESSAGE_ACTION_TYPE")]
    ResendLastMessage,
}

impl ActionType {
    /// Every action, in registry order.
    pub const ALL: [Self; 7] = [
        Self::Noop,
        Self::Halt,
        Self::Pause,
        Self::Continue,
        Self::Stop,
        Self::Restart,
        Self::ResendLastMessage,
    ];

    /// Wire identifier.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Noop => "NOOP_ACTION_TYPE",
            Self::Halt => "HALT_ACTION_TYPE",
            Self::Pause => "PAUSE_ACTION_TYPE",
            Self::Continue => "CONTINUE_ACTION_TYPE",
            Self::Stop => "STOP_ACTION_TYPE",
            Self::Restart => "RESTART_ACTION_TYPE",
            Self::ResendLastMessage => "RESEND_LAST_MESSAGE_ACTION_TYPE",
        }
    }

    /// Short name used in configuration and logs.
    #[must_use]
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::Noop => "noop",
            Self::Halt => "halt",
            Self::Pause => "pause",
            Self::Continue => "continue",
            Self::Stop => "stop",
            Self::Restart => "restart",
            Self::ResendLastMessage => "resend-last-message",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|action| action.as_str() == s || action.short_name() == s)
            .ok_or_else(|| Error::UnknownAction(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wire_and_short_names() {
        assert_eq!("PAUSE_ACTION_TYPE".parse::<ActionType>().unwrap(), ActionType::Pause);
        assert_eq!("resend-last-message".parse::<ActionType>().unwrap(), ActionType::ResendLastMessage);
        assert_eq!("stop".parse::<ActionType>().unwrap(), ActionType::Stop);
    }

    #[test]
    fn test_parse_unknown() {
        let err = "EXPLODE_ACTION_TYPE".parse::<ActionType>().unwrap_err();
        assert!(matches!(err, Error::UnknownAction(name) if name == "EXPLODE_ACTION_TYPE"));
    }

    #[test]
    fn test_serde_uses_wire_names() {
        let json = serde_json::to_string(&ActionType::Continue).unwrap();
        assert_eq!(json, "\"CONTINUE_ACTION_TYPE\"");
        let parsed: ActionType = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ActionType::Continue);
    }
}
