//! Inbound records reported by the monitored node.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Kind of an inbound record, carried in the `messageType` field.
///
/// Tags the agent does not know decode to [`EventKind::Unknown`] so newer
/// nodes are acknowledged instead of rejected.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// Leader heartbeat sent or received.
    Heartbeat,
    /// A vote request was observed.
    VoteRequestReceived,
    /// A vote was observed.
    VoteReceived,
    /// A log entry was replicated to a follower.
    LogEntryReplicated,
    /// A log entry was committed.
    LogEntryCommitted,
    /// The node suspects the leader has failed.
    LeaderSuspected,
    /// The leader suspects a follower has failed.
    FollowerSuspected,
    /// Periodic report of the node's Raft role.
    StateLog,
    /// Echo of a previously sent response.
    Response,
    /// Any tag this agent does not recognise.
    #[default]
    #[serde(other)]
    Unknown,
}

impl EventKind {
    /// Returns the wire tag for this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Heartbeat => "HEARTBEAT",
            Self::VoteRequestReceived => "VOTE_REQUEST_RECEIVED",
            Self::VoteReceived => "VOTE_RECEIVED",
            Self::LogEntryReplicated => "LOG_ENTRY_REPLICATED",
            Self::LogEntryCommitted => "LOG_ENTRY_COMMITTED",
            Self::LeaderSuspected => "LEADER_SUSPECTED",
            Self::FollowerSuspected => "FOLLOWER_SUSPECTED",
            Self::StateLog => "STATE_LOG",
            Self::Response => "RESPONSE",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raft role reported by a state-log record.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeState {
    /// The node is the current leader.
    Leader,
    /// The node follows a leader.
    #[default]
    Follower,
    /// The node is campaigning for leadership.
    Candidate,
}

impl NodeState {
    /// Returns the wire name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Leader => "LEADER",
            Self::Follower => "FOLLOWER",
            Self::Candidate => "CANDIDATE",
        }
    }
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A decoded record from the monitored node.
///
/// `sequence` and `generation` are assigned by the agent and never read
/// from the wire.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Agent-assigned arrival number, echoed back in the response.
    #[serde(skip)]
    pub sequence: u64,

    /// Connection epoch the record arrived on.
    #[serde(skip)]
    pub generation: u64,

    /// Record kind.
    #[serde(rename = "messageType")]
    pub kind: EventKind,

    /// Free-text log line for observers.
    #[serde(default)]
    pub log_message: String,

    /// Reported role, present on state-log records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_state: Option<NodeState>,

    /// Raft term the record refers to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub term: Option<u64>,

    /// Candidate requesting a vote.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub candidate_id: Option<u64>,

    /// Node that cast a vote.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voter_id: Option<u64>,

    /// Whether an observed vote was granted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vote_granted: Option<bool>,

    /// Leader involved in the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leader_id: Option<u64>,

    /// Follower involved in the record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follower_id: Option<u64>,

    /// Log index for replication and commit records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_index: Option<u64>,
}

impl Event {
    /// Decodes a record from a JSON payload.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload is not a JSON record.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }

    /// Encodes the record as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Returns true for periodic role reports, which are mirrored rather
    /// than dispatched.
    #[must_use]
    pub fn is_state_log(&self) -> bool {
        self.kind == EventKind::StateLog
    }

    /// Resets every field, keeping the log buffer's allocation.
    pub fn clear(&mut self) {
        let mut log_message = std::mem::take(&mut self.log_message);
        log_message.clear();
        *self = Self {
            log_message,
            ..Self::default()
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_vote_request() {
        let payload = br#"{"messageType":"VOTE_REQUEST_RECEIVED","logMessage":"vote request from 2","term":7,"candidateId":2}"#;
        let event = Event::decode(payload).unwrap();

        assert_eq!(event.kind, EventKind::VoteRequestReceived);
        assert_eq!(event.log_message, "vote request from 2");
        assert_eq!(event.term, Some(7));
        assert_eq!(event.candidate_id, Some(2));
        assert_eq!(event.sequence, 0);
    }

    #[test]
    fn test_decode_state_log() {
        let payload = br#"{"messageType":"STATE_LOG","logMessage":"","nodeState":"LEADER"}"#;
        let event = Event::decode(payload).unwrap();

        assert!(event.is_state_log());
        assert_eq!(event.node_state, Some(NodeState::Leader));
    }

    #[test]
    fn test_unknown_kind_fails_closed() {
        let payload = br#"{"messageType":"SNAPSHOT_INSTALLED","logMessage":"x"}"#;
        let event = Event::decode(payload).unwrap();

        assert_eq!(event.kind, EventKind::Unknown);
    }

    #[test]
    fn test_ignores_unrecognised_fields() {
        let payload = br#"{"messageType":"HEARTBEAT","logMessage":"hb","messageObject":{"a":1}}"#;
        let event = Event::decode(payload).unwrap();

        assert_eq!(event.kind, EventKind::Heartbeat);
    }

    #[test]
    fn test_decode_error() {
        assert!(Event::decode(b"not json").is_err());
    }

    #[test]
    fn test_clear_resets_fields() {
        let mut event = Event::decode(
            br#"{"messageType":"LOG_ENTRY_COMMITTED","logMessage":"commit 4","term":2,"logIndex":4}"#,
        )
        .unwrap();
        event.sequence = 9;
        event.clear();

        assert_eq!(event, Event::default());
        assert!(event.log_message.capacity() >= "commit 4".len());
    }
}
