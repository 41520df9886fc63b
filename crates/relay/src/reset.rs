//! Reconnect coordination between the action engine and the read loop.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Notify;

#[derive(Debug)]
struct Inner {
    requested: AtomicBool,
    notify: Notify,
}

/// Flag telling the read loop to tear down and re-accept its connection.
///
/// Set by anyone (a stop action, the control API, a dead peer); cleared
/// only by the read loop after a successful accept.
#[derive(Clone, Debug)]
pub struct ResetSignal {
    inner: Arc<Inner>,
}

impl ResetSignal {
    /// Create a signal. Starts requested, so the first read-loop iteration
    /// accepts the initial connection.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                requested: AtomicBool::new(true),
                notify: Notify::new(),
            }),
        }
    }

    /// Request a reconnect before the next read.
    pub fn request(&self) {
        self.inner.requested.store(true, Ordering::Release);
        self.inner.notify.notify_one();
    }

    /// Whether a reconnect is pending.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.inner.requested.load(Ordering::Acquire)
    }

    pub(crate) fn clear(&self) {
        self.inner.requested.store(false, Ordering::Release);
    }

    pub(crate) async fn notified(&self) {
        self.inner.notify.notified().await;
    }
}

impl Default for ResetSignal {
    fn default() -> Self {
        Self::new()
    }
}
