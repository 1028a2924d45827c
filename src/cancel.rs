//! Cancellation and shutdown signalling.
//!
//! `spec.md` models the caller's cancellation context and the log's
//! broadcast "closed" signal as independent things a reader selects over
//! (§5). Both reduce to the same shape here — a flag flipped once, visible
//! to every clone — so a single type backs both; `CommitLog` holds one for
//! its `closed` broadcast and callers hold one per logical request context.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cheaply cloned, one-shot "fire once, observed by everyone" flag.
#[derive(Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Fires the signal. Idempotent.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}
