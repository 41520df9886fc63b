//! Externally visible agent state.

use std::fmt;
use std::sync::Arc;

use faultline_events::{ActionType, NodeState};
use serde::Serialize;
use tokio::sync::watch;

/// Whether the monitored node is running, as far as the agent's own actions
/// are concerned.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Availability {
    /// Running.
    #[default]
    Online,
    /// Suspended by a pause.
    Paused,
    /// Stopped by a stop.
    Stopped,
}

impl Availability {
    /// State after `action` completed successfully, if it changes.
    #[must_use]
    pub const fn after(action: ActionType) -> Option<Self> {
        match action {
            ActionType::Pause => Some(Self::Paused),
            ActionType::Continue | ActionType::Restart => Some(Self::Online),
            ActionType::Stop => Some(Self::Stopped),
            ActionType::Noop | ActionType::Halt | ActionType::ResendLastMessage => None,
        }
    }
}

impl fmt::Display for Availability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Online => "online",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        })
    }
}

/// Shared [`Availability`], updated by the dispatcher and the controller.
#[derive(Clone, Debug)]
pub struct AvailabilityMirror {
    inner: Arc<watch::Sender<Availability>>,
}

impl Default for AvailabilityMirror {
    fn default() -> Self {
        Self {
            inner: Arc::new(watch::Sender::new(Availability::Online)),
        }
    }
}

impl AvailabilityMirror {
    /// Current value.
    #[must_use]
    pub fn get(&self) -> Availability {
        *self.inner.borrow()
    }

    /// Record that `action` completed successfully.
    pub fn record(&self, action: ActionType) {
        if let Some(next) = Availability::after(action) {
            self.inner.send_if_modified(|current| {
                let changed = *current != next;
                *current = next;
                changed
            });
        }
    }

    /// Watch for availability changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Availability> {
        self.inner.subscribe()
    }
}

/// Snapshot returned by [`Controller::status`](crate::Controller::status).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStatus {
    /// Availability of the monitored node.
    pub availability: Availability,
    /// Step-by-step mode.
    pub step_by_step: bool,
    /// Education mode.
    pub education: bool,
    /// Last role the node reported.
    pub node_state: NodeState,
    /// Highest term seen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub term: Option<u64>,
    /// Last known leader.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub leader_id: Option<u64>,
    /// Highest committed index seen.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit_index: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_transitions() {
        let mirror = AvailabilityMirror::default();
        assert_eq!(mirror.get(), Availability::Online);

        mirror.record(ActionType::Pause);
        assert_eq!(mirror.get(), Availability::Paused);

        mirror.record(ActionType::Halt);
        assert_eq!(mirror.get(), Availability::Paused);

        mirror.record(ActionType::Continue);
        assert_eq!(mirror.get(), Availability::Online);

        mirror.record(ActionType::Stop);
        assert_eq!(mirror.get(), Availability::Stopped);

        mirror.record(ActionType::Restart);
        assert_eq!(mirror.get(), Availability::Online);
    }

    #[test]
    fn test_subscribers_see_transitions_only() {
        let mirror = AvailabilityMirror::default();
        let mut changes = mirror.subscribe();

        mirror.record(ActionType::Noop);
        mirror.record(ActionType::Continue);
        assert!(!changes.has_changed().unwrap());

        mirror.clone().record(ActionType::Stop);
        assert!(changes.has_changed().unwrap());
        assert_eq!(*changes.borrow_and_update(), Availability::Stopped);
    }

    #[test]
    fn test_status_wire_shape() {
        let status = AgentStatus {
            availability: Availability::Paused,
            step_by_step: true,
            education: true,
            node_state: NodeState::Leader,
            term: Some(4),
            leader_id: None,
            commit_index: Some(12),
        };

        assert_eq!(
            serde_json::to_value(status).unwrap(),
            serde_json::json!({
                "availability": "paused",
                "stepByStep": true,
                "education": true,
                "nodeState": "LEADER",
                "term": 4,
                "commitIndex": 12,
            })
        );
    }
}
