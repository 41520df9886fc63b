//! Observation bridge: log fan-out and node-state mirroring.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use faultline_events::{Event, EventKind, NodeState};
use tokio::sync::watch;
use uuid::Uuid;

/// Callback receiving every log line reported by the monitored node.
pub type LogConsumer = Arc<dyn Fn(&str) + Send + Sync>;

/// Token identifying a registered [`LogConsumer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ConsumerId(Uuid);

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Concurrent registry of log consumers.
///
/// Delivery is synchronous and unordered across consumers.
#[derive(Clone, Default)]
pub struct LogConsumers {
    consumers: Arc<DashMap<Uuid, LogConsumer>>,
}

impl LogConsumers {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a consumer and return its token.
    pub fn register<F>(&self, consumer: F) -> ConsumerId
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let id = Uuid::new_v4();
        self.consumers.insert(id, Arc::new(consumer));
        ConsumerId(id)
    }

    /// Remove a consumer. Returns false if the token was unknown.
    pub fn unregister(&self, id: ConsumerId) -> bool {
        self.consumers.remove(&id.0).is_some()
    }

    /// Number of registered consumers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.consumers.len()
    }

    /// Returns true if nobody is listening.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.consumers.is_empty()
    }

    /// Deliver `line` to every registered consumer.
    pub fn broadcast(&self, line: &str) {
        // Snapshot first so a consumer may unregister itself from the callback
        let consumers: Vec<LogConsumer> = self
            .consumers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for consumer in consumers {
            consumer(line);
        }
    }
}

impl fmt::Debug for LogConsumers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogConsumers")
            .field("len", &self.consumers.len())
            .finish()
    }
}

/// What the agent last learned about the monitored node.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NodeSnapshot {
    /// Role from the latest state log.
    pub state: NodeState,
    /// Highest term seen in any record.
    pub term: Option<u64>,
    /// Leader named by the latest record that carried one.
    pub leader_id: Option<u64>,
    /// Highest committed log index seen.
    pub commit_index: Option<u64>,
}

/// Shared, continuously updated [`NodeSnapshot`].
///
/// Written only by the transport's read loop. Subscribers are woken only when
/// the snapshot actually changes.
#[derive(Clone, Debug)]
pub struct NodeStateMirror {
    snapshot: Arc<watch::Sender<NodeSnapshot>>,
}

impl Default for NodeStateMirror {
    fn default() -> Self {
        Self {
            snapshot: Arc::new(watch::Sender::new(NodeSnapshot::default())),
        }
    }
}

impl NodeStateMirror {
    /// Create a mirror holding the default snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current role.
    #[must_use]
    pub fn get(&self) -> NodeState {
        self.snapshot.borrow().state
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> NodeSnapshot {
        *self.snapshot.borrow()
    }

    /// Watch the snapshot for changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<NodeSnapshot> {
        self.snapshot.subscribe()
    }

    pub(crate) fn set(&self, state: NodeState) {
        self.snapshot.send_if_modified(|snapshot| {
            let changed = snapshot.state != state;
            snapshot.state = state;
            changed
        });
    }

    pub(crate) fn observe(&self, event: &Event) {
        self.snapshot.send_if_modified(|snapshot| {
            let before = *snapshot;
            if let Some(term) = event.term {
                snapshot.term = snapshot.term.max(Some(term));
            }
            if let Some(leader) = event.leader_id {
                snapshot.leader_id = Some(leader);
            }
            if event.kind == EventKind::LogEntryCommitted {
                if let Some(index) = event.log_index {
                    snapshot.commit_index = snapshot.commit_index.max(Some(index));
                }
            }
            *snapshot != before
        });
    }
}
