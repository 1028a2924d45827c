//! A single segment of the commit log (spec §3, §4.3): a byte-addressable,
//! append-only store plus an offset index, a last-written-position counter
//! readers can park on, and a finalized flag set once the segment is
//! rolled.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::cancel::CancellationToken;
use crate::error::{Error, Result};
use crate::header::{FrameHeader, HEADER_LEN};
use crate::wait::{Notifier, WaitHandle, WaitOutcome};

struct Store {
    buf: Vec<u8>,
    index: BTreeMap<i64, (usize, usize)>,
}

pub struct Segment {
    base_offset: i64,
    store: Mutex<Store>,
    last_written_position: AtomicUsize,
    finalized: AtomicBool,
    notifier: Notifier,
}

impl Segment {
    pub fn new(base_offset: i64) -> Self {
        Self {
            base_offset,
            store: Mutex::new(Store {
                buf: Vec::new(),
                index: BTreeMap::new(),
            }),
            last_written_position: AtomicUsize::new(0),
            finalized: AtomicBool::new(false),
            notifier: Notifier::new(),
        }
    }

    pub fn base_offset(&self) -> i64 {
        self.base_offset
    }

    pub fn last_written_position(&self) -> usize {
        self.last_written_position.load(Ordering::Acquire)
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.load(Ordering::Acquire)
    }

    /// Positional read (spec §4.3 `readAt`). Returns [`Error::EndOfStream`]
    /// once `pos` reaches the last-written position — soft for a live
    /// segment (more may still arrive), hard once [`Self::is_finalized`].
    /// Callers distinguish the two by checking `is_finalized` themselves.
    pub fn read_at(&self, buf: &mut [u8], pos: usize) -> Result<usize> {
        let last = self.last_written_position();
        if pos >= last {
            return Err(Error::EndOfStream);
        }
        let store = self.store.lock().expect("segment store lock poisoned");
        let available = last.min(store.buf.len()) - pos;
        let n = buf.len().min(available);
        buf[..n].copy_from_slice(&store.buf[pos..pos + n]);
        log::trace!("segment {} read {n} bytes at position {pos}", self.base_offset);
        Ok(n)
    }

    /// Spec §4.3 `findEntry`: resolves an offset to `(position, size)`.
    pub fn find_entry(&self, offset: i64) -> Result<(usize, usize)> {
        let store = self.store.lock().expect("segment store lock poisoned");
        store.index.get(&offset).copied().ok_or(Error::OffsetOutOfRange {
            offset,
            segment_base: self.base_offset,
        })
    }

    /// Registers a waiter for progress past the current last-written
    /// position; returns the handle plus the version to pass to
    /// [`Self::park_for_data`].
    pub fn wait_for_data(&self) -> (WaitHandle, u64) {
        self.notifier.register()
    }

    pub fn park_for_data(
        &self,
        handle: &WaitHandle,
        last_seen: u64,
        cancel: &CancellationToken,
        closed: &CancellationToken,
    ) -> WaitOutcome {
        self.notifier.park(handle, last_seen, cancel, closed)
    }

    /// Idempotent deregistration (spec §4.3 `removeWaiter`).
    pub fn remove_waiter(&self, handle: &WaitHandle) {
        self.notifier.deregister(handle);
    }

    pub fn waiter_count(&self) -> usize {
        self.notifier.waiter_count()
    }

    /// Appends one framed record at the current tail. Not part of the
    /// reader contract (§4.3 only specifies the read side) — this is the
    /// minimal writer-side behavior the bundled reference `CommitLog` needs
    /// to produce history for readers to stream back.
    pub fn append(&self, offset: i64, timestamp: u64, payload: &[u8]) -> Result<()> {
        debug_assert!(!self.is_finalized(), "append to a finalized segment");
        let mut store = self.store.lock().expect("segment store lock poisoned");
        let pos = store.buf.len();
        let header = FrameHeader::new(offset as u64, timestamp, payload.len() as u32);
        store.buf.extend_from_slice(&header.to_bytes());
        store.buf.extend_from_slice(payload);
        store.index.insert(offset, (pos, HEADER_LEN + payload.len()));
        let new_last = store.buf.len();
        drop(store);
        self.last_written_position.store(new_last, Ordering::Release);
        self.notifier.notify_all();
        Ok(())
    }

    /// Marks the segment rolled: no further appends, and parked waiters are
    /// released so they can advance to the successor segment.
    pub fn finalize(&self) {
        self.finalized.store(true, Ordering::Release);
        self.notifier.notify_all();
    }
}

/// Pure lookup helpers over a segment-list snapshot (spec §4.2). `segments`
/// must be sorted ascending by base offset, as every snapshot taken from
/// [`crate::CommitLog::segments`] is.
pub mod lookup {
    use super::Segment;
    use std::sync::Arc;

    /// The segment covering `offset`: the one with the greatest base offset
    /// `<= offset`. `None` if `offset` precedes the earliest base.
    pub fn find_segment(segments: &[Arc<Segment>], offset: i64) -> Option<(usize, Arc<Segment>)> {
        let idx = segments.partition_point(|s| s.base_offset() <= offset);
        if idx == 0 {
            return None;
        }
        Some((idx - 1, Arc::clone(&segments[idx - 1])))
    }

    /// The segment whose base offset equals `base` exactly.
    pub fn find_segment_by_base_offset(segments: &[Arc<Segment>], base: i64) -> Option<Arc<Segment>> {
        segments
            .binary_search_by(|s| s.base_offset().cmp(&base))
            .ok()
            .map(|idx| Arc::clone(&segments[idx]))
    }

    /// The segment immediately following the one based at `current_base`,
    /// i.e. the smallest base strictly greater than `current_base`. Spec
    /// §4.2 describes the successor lookup as
    /// `findSegmentByBaseOffset(segments, base+1)`, but segment base
    /// offsets are only guaranteed monotonically increasing, not spaced by
    /// exactly one — "next entry in the ordered snapshot" is the operation
    /// that definition is reaching for, and is what is implemented here.
    pub fn next_segment_after(segments: &[Arc<Segment>], current_base: i64) -> Option<Arc<Segment>> {
        let idx = segments.partition_point(|s| s.base_offset() <= current_base);
        segments.get(idx).cloned()
    }
}
