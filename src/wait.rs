//! Condition-variable-based wait/notify glue (spec §5, §9).
//!
//! The source this subsystem is modeled on expresses wakeups as one-shot
//! notification handles selected against cancellation (§9). In Rust that
//! maps onto a `Mutex` + `Condvar` guarding a version counter: a waiter
//! registers (takes the lock, records the current version and a waiter-set
//! entry), re-checks the observed quantity under that same lock, and only
//! then blocks — so any writer update that races with registration is
//! either already visible at the check or guaranteed to fire the `Condvar`.
//! Writers bump the version and call `notify_all` after mutating the
//! observed quantity under *their own* lock, never under this one.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

use crate::cancel::CancellationToken;

/// How often a parked wait re-checks cancellation/close while waiting on the
/// condvar. Bounds cancellation latency (spec §5 "cancellation is prompt");
/// spec's "select over three channels" becomes condvar-wait-with-timeout
/// plus a poll of the two flag-shaped channels, since `std::sync::Condvar`
/// has no native multi-source select.
const POLL_INTERVAL: Duration = Duration::from_millis(20);

struct State {
    version: u64,
    waiters: HashSet<u64>,
    next_id: u64,
}

/// A one-shot registration returned by [`Notifier::register`]. Holding it
/// keeps the waiter counted in [`Notifier::waiter_count`]; dropping or
/// explicitly [`Notifier::deregister`]ing it removes the entry. Removal is
/// idempotent.
pub struct WaitHandle {
    id: u64,
}

/// Registers waiters parked on a position or a high-watermark value and
/// wakes them when a writer advances it.
pub struct Notifier {
    state: Mutex<State>,
    cv: Condvar,
}

pub enum WaitOutcome {
    /// The observed version advanced past the one seen at registration.
    Advanced(u64),
    /// Cancellation or log close fired before the version advanced.
    Cancelled,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                version: 0,
                waiters: HashSet::new(),
                next_id: 0,
            }),
            cv: Condvar::new(),
        }
    }

    /// Current version, to pass back in as `last_seen` on the next wait.
    pub fn version(&self) -> u64 {
        self.state.lock().expect("notifier lock poisoned").version
    }

    /// Bumps the version and wakes every parked waiter. Callers must have
    /// already published the underlying change (e.g. the segment's
    /// last-written position, or the log's high watermark) before calling
    /// this, so a waiter woken here always observes the new value.
    pub fn notify_all(&self) {
        let mut state = self.state.lock().expect("notifier lock poisoned");
        state.version = state.version.wrapping_add(1);
        drop(state);
        self.cv.notify_all();
    }

    /// Registers a waiter and returns its handle plus the version observed
    /// at registration time (the caller's "last seen" for [`Self::park`]).
    pub fn register(&self) -> (WaitHandle, u64) {
        let mut state = self.state.lock().expect("notifier lock poisoned");
        let id = state.next_id;
        state.next_id += 1;
        state.waiters.insert(id);
        (WaitHandle { id }, state.version)
    }

    /// Idempotent deregistration.
    pub fn deregister(&self, handle: &WaitHandle) {
        let mut state = self.state.lock().expect("notifier lock poisoned");
        state.waiters.remove(&handle.id);
    }

    pub fn waiter_count(&self) -> usize {
        self.state.lock().expect("notifier lock poisoned").waiters.len()
    }

    /// Blocks until the version advances past `last_seen`, or `cancel` /
    /// `closed` fires. `handle` is deregistered on every exit path.
    pub fn park(
        &self,
        handle: &WaitHandle,
        last_seen: u64,
        cancel: &CancellationToken,
        closed: &CancellationToken,
    ) -> WaitOutcome {
        let mut guard = self.state.lock().expect("notifier lock poisoned");
        let outcome = loop {
            if guard.version != last_seen {
                break WaitOutcome::Advanced(guard.version);
            }
            if cancel.is_cancelled() || closed.is_cancelled() {
                break WaitOutcome::Cancelled;
            }
            let (next_guard, _timed_out) = self
                .cv
                .wait_timeout(guard, POLL_INTERVAL)
                .expect("notifier lock poisoned");
            guard = next_guard;
        };
        guard.waiters.remove(&handle.id);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn wakes_on_notify_without_cancellation() {
        let notifier = Arc::new(Notifier::new());
        let (handle, seen) = notifier.register();
        assert_eq!(notifier.waiter_count(), 1);

        let notifier2 = Arc::clone(&notifier);
        let waker = thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            notifier2.notify_all();
        });

        let cancel = CancellationToken::new();
        let closed = CancellationToken::new();
        let outcome = notifier.park(&handle, seen, &cancel, &closed);
        assert!(matches!(outcome, WaitOutcome::Advanced(_)));
        assert_eq!(notifier.waiter_count(), 0);
        waker.join().unwrap();
    }

    #[test]
    fn cancellation_wakes_a_parked_waiter() {
        let notifier = Arc::new(Notifier::new());
        let (handle, seen) = notifier.register();
        let cancel = CancellationToken::new();
        let closed = CancellationToken::new();

        let cancel2 = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(10));
            cancel2.cancel();
        });

        let outcome = notifier.park(&handle, seen, &cancel, &closed);
        assert!(matches!(outcome, WaitOutcome::Cancelled));
        assert_eq!(notifier.waiter_count(), 0);
    }

    #[test]
    fn deregister_is_idempotent() {
        let notifier = Notifier::new();
        let (handle, _) = notifier.register();
        notifier.deregister(&handle);
        notifier.deregister(&handle);
        assert_eq!(notifier.waiter_count(), 0);
    }
}
