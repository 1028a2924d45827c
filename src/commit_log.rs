//! Reference `CommitLog` (spec §4.4): owns the segment list and the high
//! watermark, and is the collaborator [`crate::reader`] streams against.
//!
//! Segment allocation policy, on-disk layout, and how the high watermark is
//! actually computed (replication acks, quorum, etc.) belong to the
//! surrounding storage/replication layer in the system this subsystem ships
//! in (spec §1) — they are the caller's problem, not this reader
//! subsystem's. This type is a fully in-memory, single-process stand-in so
//! the reader subsystem has something concrete to run and be tested
//! against; [`Self::append`] and [`Self::advance_hw`] are its only
//! non-spec surface.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, RwLock};

use crate::cancel::CancellationToken;
use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::header::HEADER_LEN;
use crate::segment::Segment;
use crate::wait::{Notifier, WaitHandle, WaitOutcome};

const DEFAULT_MAX_SEGMENT_BYTES: usize = 1 << 20;

pub struct CommitLog {
    segments: RwLock<Vec<Arc<Segment>>>,
    high_watermark: AtomicI64,
    hw_notifier: Notifier,
    closed: CancellationToken,
    clock: Arc<dyn Clock>,
    max_segment_bytes: usize,
    next_offset: AtomicI64,
}

impl CommitLog {
    pub fn new() -> Arc<Self> {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Arc<Self> {
        Self::with_config(clock, DEFAULT_MAX_SEGMENT_BYTES)
    }

    pub fn with_config(clock: Arc<dyn Clock>, max_segment_bytes: usize) -> Arc<Self> {
        Arc::new(Self {
            segments: RwLock::new(vec![Arc::new(Segment::new(0))]),
            high_watermark: AtomicI64::new(-1),
            hw_notifier: Notifier::new(),
            closed: CancellationToken::new(),
            clock,
            max_segment_bytes,
            next_offset: AtomicI64::new(0),
        })
    }

    /// A snapshot of the current segment list, ordered by base offset.
    /// Cloning only bumps `Arc` refcounts, not the underlying segments.
    pub fn segments(&self) -> Vec<Arc<Segment>> {
        self.segments.read().expect("segments lock poisoned").clone()
    }

    /// The highest committed offset, or `-1` if nothing has been
    /// committed yet (spec §3).
    pub fn high_watermark(&self) -> i64 {
        self.high_watermark.load(Ordering::Acquire)
    }

    /// The smallest offset a reader can still start from.
    pub fn oldest_offset(&self) -> i64 {
        self.segments
            .read()
            .expect("segments lock poisoned")
            .first()
            .map(|s| s.base_offset())
            .unwrap_or(0)
    }

    pub fn closed(&self) -> &CancellationToken {
        &self.closed
    }

    /// Broadcasts shutdown: every parked reader wakes and returns
    /// [`crate::Error::EndOfStream`].
    pub fn close(&self) {
        log::info!("commit log closing, waking all parked readers");
        self.closed.cancel();
        self.hw_notifier.notify_all();
    }

    pub fn wait_for_hw(&self) -> (WaitHandle, u64) {
        self.hw_notifier.register()
    }

    pub fn park_for_hw(
        &self,
        handle: &WaitHandle,
        last_seen: u64,
        cancel: &CancellationToken,
    ) -> WaitOutcome {
        self.hw_notifier.park(handle, last_seen, cancel, &self.closed)
    }

    pub fn remove_hw_waiter(&self, handle: &WaitHandle) {
        self.hw_notifier.deregister(handle);
    }

    /// Appends a record, rolling to a new segment first if it would not fit
    /// in the current tail. Returns the assigned offset.
    pub fn append(&self, payload: &[u8]) -> Result<i64> {
        let record_len = HEADER_LEN + payload.len();
        let mut segments = self.segments.write().expect("segments lock poisoned");
        let tail = segments.last().expect("commit log always has a tail segment").clone();
        let offset = self.next_offset.load(Ordering::Acquire);
        let timestamp = self.clock.now();

        let tail = if tail.last_written_position() > 0
            && tail.last_written_position() + record_len > self.max_segment_bytes
        {
            tail.finalize();
            log::debug!(
                "rolling segment at base {} to new segment at base {offset}",
                tail.base_offset()
            );
            let fresh = Arc::new(Segment::new(offset));
            segments.push(Arc::clone(&fresh));
            fresh
        } else {
            tail
        };
        drop(segments);

        tail.append(offset, timestamp, payload)?;
        self.next_offset.store(offset + 1, Ordering::Release);
        Ok(offset)
    }

    /// Advances the high watermark to `offset` and wakes parked committed
    /// readers. A no-op if `offset` is not ahead of the current HW.
    pub fn advance_hw(&self, offset: i64) {
        let mut current = self.high_watermark.load(Ordering::Acquire);
        loop {
            if offset <= current {
                return;
            }
            match self.high_watermark.compare_exchange(
                current,
                offset,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
        self.hw_notifier.notify_all();
    }

    /// Commits every record appended so far.
    pub fn commit_all(&self) {
        let next = self.next_offset.load(Ordering::Acquire);
        if next > 0 {
            self.advance_hw(next - 1);
        }
    }
}
