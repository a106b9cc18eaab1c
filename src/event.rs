//! Coalescing event mailbox shared by the long-lived actors.
//!
//! An [`EventBox`] maps event types to their latest payload: a second
//! `set` of the same type before any waiter runs replaces the first
//! (set semantics on type). This is what lets the reader fire `ReadNew`
//! at any rate without backpressuring the coordinator. Waiters block on
//! a condition variable; there is no busy loop.
//!
//! The box is generic over the key and payload so the global
//! coordinator, the matcher, and the terminal each instantiate it with
//! their own event enums.

use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::sync::{Condvar, Mutex, MutexGuard};

use crate::matcher::Merger;
use std::sync::Arc;

/// Recovers the guard from a poisoned mutex.
///
/// A panicking worker aborts the process (the panic policy in §7), so a
/// poisoned lock can only be observed during unwind; recovering keeps
/// the remaining actors shut down cleanly instead of deadlocking.
fn relock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    lock.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

struct Inner<K, V> {
    events: HashMap<K, V>,
    unwatched: HashSet<K>,
}

/// Typed, coalescing, condition-variable-backed mailbox.
pub struct EventBox<K, V> {
    inner: Mutex<Inner<K, V>>,
    cond: Condvar,
}

impl<K, V> Default for EventBox<K, V>
where
    K: Copy + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> EventBox<K, V>
where
    K: Copy + Eq + Hash,
{
    /// Creates an empty box with every event type admitted.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                events: HashMap::new(),
                unwatched: HashSet::new(),
            }),
            cond: Condvar::new(),
        }
    }

    /// Installs `value` as the latest payload for `key` and wakes all
    /// waiters. Events for unwatched types are silently dropped.
    ///
    /// Wait-free for the producer apart from lock acquisition.
    pub fn set(&self, key: K, value: V) {
        let mut guard = relock(&self.inner);
        if guard.unwatched.contains(&key) {
            return;
        }
        guard.events.insert(key, value);
        drop(guard);
        self.cond.notify_all();
    }

    /// Blocks until the box is non-empty, then invokes `f` with
    /// exclusive access to the event map. The callback decides which
    /// entries to consume (remove) and which to leave pending.
    pub fn wait<R>(&self, f: impl FnOnce(&mut HashMap<K, V>) -> R) -> R {
        let mut guard = relock(&self.inner);
        while guard.events.is_empty() {
            guard = self
                .cond
                .wait(guard)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
        f(&mut guard.events)
    }

    /// Blocks until an event of type `key` is observed, consuming and
    /// returning its payload. Other pending entries are left untouched.
    pub fn wait_for(&self, key: K) -> V {
        let mut guard = relock(&self.inner);
        loop {
            if let Some(value) = guard.events.remove(&key) {
                return value;
            }
            guard = self
                .cond
                .wait(guard)
                .unwrap_or_else(std::sync::PoisonError::into_inner);
        }
    }

    /// Returns whether an event of type `key` is currently pending.
    /// Non-blocking.
    #[must_use]
    pub fn peek(&self, key: K) -> bool {
        relock(&self.inner).events.contains_key(&key)
    }

    /// Consumes and returns the pending payload for `key`, if any.
    /// Non-blocking.
    #[must_use]
    pub fn try_take(&self, key: K) -> Option<V> {
        relock(&self.inner).events.remove(&key)
    }

    /// Re-admits events of the given type.
    pub fn watch(&self, key: K) {
        relock(&self.inner).unwatched.remove(&key);
    }

    /// Denies events of the given type; subsequent `set` calls for it
    /// are dropped until [`watch`](Self::watch) re-admits them.
    pub fn unwatch(&self, key: K) {
        relock(&self.inner).unwatched.insert(key);
    }
}

// ---------------------------------------------------------------------------
// Concrete event vocabulary of the global coordinator
// ---------------------------------------------------------------------------

/// Event types flowing through the global mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// The reader ingested new items.
    ReadNew,
    /// The reader reached end-of-stream (possibly with a failure marker).
    ReadFin,
    /// The user edited the query.
    SearchNew,
    /// A scan passed a progress checkpoint.
    SearchProgress,
    /// A scan completed and produced a merger.
    SearchFin,
    /// An actor requested a clean shutdown.
    Quit,
}

/// Payloads carried by [`EventType`] entries on the global mailbox.
pub enum CoreEvent {
    /// Payload-free notification (`ReadNew`, `SearchNew`).
    Notify,
    /// End-of-stream marker; `failure` carries the producer error
    /// rendered on the info line, if any.
    ReadFinished {
        /// Human-readable producer failure, if the stream ended badly.
        failure: Option<String>,
    },
    /// Fraction of chunks scanned so far, in `0.0..=1.0`.
    Progress(f32),
    /// The ranked output of a completed scan.
    SearchFinished(Arc<Merger>),
    /// Requested process exit code.
    Quit(i32),
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    enum Key {
        A,
        B,
    }

    #[test]
    fn test_set_then_wait_consumes() {
        let eb: EventBox<Key, u32> = EventBox::new();
        eb.set(Key::A, 7);
        let got = eb.wait(|events| events.remove(&Key::A));
        assert_eq!(got, Some(7));
        assert!(!eb.peek(Key::A));
    }

    #[test]
    fn test_coalescing_keeps_latest_payload() {
        // Invariant: two sets of the same type before any wait are
        // observed exactly once, with the second payload.
        let eb: EventBox<Key, u32> = EventBox::new();
        eb.set(Key::A, 1);
        eb.set(Key::A, 2);
        let got = eb.wait(|events| events.remove(&Key::A));
        assert_eq!(got, Some(2));
        assert!(!eb.peek(Key::A));
    }

    #[test]
    fn test_unwatched_events_are_dropped() {
        let eb: EventBox<Key, u32> = EventBox::new();
        eb.unwatch(Key::B);
        eb.set(Key::B, 1);
        assert!(!eb.peek(Key::B));
        eb.watch(Key::B);
        eb.set(Key::B, 2);
        assert_eq!(eb.try_take(Key::B), Some(2));
    }

    #[test]
    fn test_wait_leaves_unconsumed_entries() {
        let eb: EventBox<Key, u32> = EventBox::new();
        eb.set(Key::A, 1);
        eb.set(Key::B, 2);
        eb.wait(|events| {
            events.remove(&Key::A);
        });
        assert!(eb.peek(Key::B));
    }

    #[test]
    fn test_wait_blocks_until_set() {
        let eb: Arc<EventBox<Key, u32>> = Arc::new(EventBox::new());
        let producer = Arc::clone(&eb);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.set(Key::A, 42);
        });
        let got = eb.wait(|events| events.remove(&Key::A));
        assert_eq!(got, Some(42));
        handle.join().unwrap_or_else(|_| panic!("producer panicked"));
    }

    #[test]
    fn test_wait_for_ignores_other_types() {
        let eb: Arc<EventBox<Key, u32>> = Arc::new(EventBox::new());
        let producer = Arc::clone(&eb);
        let handle = thread::spawn(move || {
            producer.set(Key::B, 1);
            thread::sleep(Duration::from_millis(10));
            producer.set(Key::A, 9);
        });
        let got = eb.wait_for(Key::A);
        assert_eq!(got, 9);
        assert!(eb.peek(Key::B));
        handle.join().unwrap_or_else(|_| panic!("producer panicked"));
    }
}
