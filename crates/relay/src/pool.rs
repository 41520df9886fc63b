//! Free-list object pool for events and responses.
//!
//! Every object lives in a numbered slot. [`Pool::get`] hands out a
//! [`Pooled`] handle that owns the object until it is released, either
//! explicitly with [`Pooled::release`] or by dropping the handle. Release
//! consumes the handle, so an object can never be returned twice, and the
//! object is reset before it re-enters the free list.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use faultline_events::{Event, Response};
use parking_lot::Mutex;

/// Objects that can be recycled through a [`Pool`].
pub trait Poolable: Default + Send + 'static {
    /// Return the object to its zero value.
    fn reset(&mut self);
}

impl Poolable for Event {
    fn reset(&mut self) {
        self.clear();
    }
}

impl Poolable for Response {
    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Point-in-time counters for a pool.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of slots ever allocated.
    pub allocated: usize,
    /// Slots currently sitting in the free list.
    pub idle: usize,
    /// Total handles handed out.
    pub gets: u64,
    /// Total handles released.
    pub puts: u64,
}

impl PoolStats {
    /// Handles currently checked out.
    #[must_use]
    pub const fn outstanding(&self) -> u64 {
        self.gets.saturating_sub(self.puts)
    }
}

struct Slots<T> {
    // `None` while the slot's object is checked out
    objects: Vec<Option<T>>,
    free: Vec<usize>,
}

struct Shared<T> {
    slots: Mutex<Slots<T>>,
    gets: AtomicU64,
    puts: AtomicU64,
}

/// A growable pool of reusable objects.
pub struct Pool<T: Poolable> {
    shared: Arc<Shared<T>>,
}

impl<T: Poolable> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Poolable> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Poolable> Pool<T> {
    /// Create an empty pool.
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                slots: Mutex::new(Slots {
                    objects: Vec::new(),
                    free: Vec::new(),
                }),
                gets: AtomicU64::new(0),
                puts: AtomicU64::new(0),
            }),
        }
    }

    /// Take an object from the pool, allocating a new slot if none is free.
    #[must_use]
    pub fn get(&self) -> Pooled<T> {
        let (slot, value) = {
            let mut slots = self.shared.slots.lock();
            match slots.free.pop() {
                Some(slot) => {
                    let value = slots.objects[slot].take().unwrap_or_default();
                    (slot, value)
                }
                None => {
                    slots.objects.push(None);
                    (slots.objects.len() - 1, T::default())
                }
            }
        };
        self.shared.gets.fetch_add(1, Ordering::Relaxed);

        Pooled {
            slot,
            value,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Current counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let slots = self.shared.slots.lock();
        PoolStats {
            allocated: slots.objects.len(),
            idle: slots.free.len(),
            gets: self.shared.gets.load(Ordering::Relaxed),
            puts: self.shared.puts.load(Ordering::Relaxed),
        }
    }
}

/// Exclusive handle to a pooled object.
pub struct Pooled<T: Poolable> {
    slot: usize,
    value: T,
    shared: Arc<Shared<T>>,
}

impl<T: Poolable> Pooled<T> {
    /// Slot index backing this handle.
    #[must_use]
    pub const fn slot(&self) -> usize {
        self.slot
    }

    /// Return the object to the pool.
    pub fn release(self) {
        drop(self);
    }
}

impl<T: Poolable> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: Poolable> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

impl<T: Poolable + fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pooled")
            .field("slot", &self.slot)
            .field("value", &self.value)
            .finish()
    }
}

impl<T: Poolable> Drop for Pooled<T> {
    fn drop(&mut self) {
        let mut value = std::mem::take(&mut self.value);
        value.reset();

        {
            let mut slots = self.shared.slots.lock();
            slots.objects[self.slot] = Some(value);
            slots.free.push(self.slot);
        }
        self.shared.puts.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faultline_events::{ActionType, EventKind};

    #[test]
    fn test_reuses_released_slot() {
        let pool = Pool::<Event>::new();

        let first = pool.get();
        let slot = first.slot();
        first.release();

        let second = pool.get();
        assert_eq!(second.slot(), slot);
        assert_eq!(pool.stats().allocated, 1);
    }

    #[test]
    fn test_grows_on_demand() {
        let pool = Pool::<Response>::new();
        let handles: Vec<_> = (0..5).map(|_| pool.get()).collect();

        let stats = pool.stats();
        assert_eq!(stats.allocated, 5);
        assert_eq!(stats.idle, 0);
        assert_eq!(stats.outstanding(), 5);

        drop(handles);
        let stats = pool.stats();
        assert_eq!(stats.idle, 5);
        assert_eq!(stats.gets, stats.puts);
    }

    #[test]
    fn test_reset_before_reuse() {
        let pool = Pool::<Event>::new();

        let mut event = pool.get();
        event.kind = EventKind::LeaderSuspected;
        event.log_message.push_str("leader 3 suspected");
        event.leader_id = Some(3);
        event.sequence = 42;
        drop(event);

        let event = pool.get();
        assert_eq!(event.kind, EventKind::Unknown);
        assert!(event.log_message.is_empty());
        assert_eq!(event.leader_id, None);
        assert_eq!(event.sequence, 0);
    }

    #[test]
    fn test_response_reset_before_reuse() {
        let pool = Pool::<Response>::new();

        let mut response = pool.get();
        response.action = Some(ActionType::Stop);
        response.sequence = 8;
        response.release();

        let response = pool.get();
        assert!(response.is_default());
        assert_eq!(response.sequence, 0);
    }

    #[test]
    fn test_concurrent_get_put() {
        let pool = Pool::<Event>::new();
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let pool = pool.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        let mut event = pool.get();
                        event.log_message.push('x');
                    }
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }

        let stats = pool.stats();
        assert_eq!(stats.gets, 8000);
        assert_eq!(stats.puts, 8000);
        assert!(stats.allocated <= 8);
        assert_eq!(stats.idle, stats.allocated);
    }
}
