//! Spec §4.5: a reader that follows the write tail regardless of the high
//! watermark.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::cancel::CancellationToken;
use crate::commit_log::CommitLog;
use crate::error::{Error, Result};
use crate::segment::{lookup, Segment};
use crate::wait::WaitOutcome;

const SUCCESSOR_POLL_INTERVAL: Duration = Duration::from_millis(20);

struct State {
    segment: Arc<Segment>,
    pos: usize,
    /// Set once this reader has parked on `segment` without making
    /// progress, so the next tail-hit knows to re-examine the segment
    /// snapshot rather than immediately parking again (spec §9: needed to
    /// tell "just woke, must re-check" apart from "still at the tail").
    waiting: bool,
}

pub struct UncommittedReader {
    log: Arc<CommitLog>,
    cancel: CancellationToken,
    state: Mutex<State>,
}

impl UncommittedReader {
    pub fn new(log: &Arc<CommitLog>, cancel: CancellationToken, offset: i64) -> Result<Self> {
        let segments = log.segments();
        let (_, segment) =
            lookup::find_segment(&segments, offset).ok_or(Error::SegmentNotFound { offset })?;
        let (pos, _size) = segment.find_entry(offset)?;
        Ok(Self {
            log: Arc::clone(log),
            cancel,
            state: Mutex::new(State {
                segment,
                pos,
                waiting: false,
            }),
        })
    }

    /// Fills `buf` as far as the current write tail allows, blocking for
    /// more data when it runs dry. Returns the number of bytes copied and,
    /// on early termination, the error that ended the read — `EndOfStream`
    /// for cancellation or log close, never a fault for those two cases.
    pub fn read(&self, buf: &mut [u8]) -> (usize, Option<Error>) {
        let mut state = self.state.lock().expect("reader lock poisoned");
        let mut n = 0usize;
        loop {
            if n == buf.len() {
                return (n, None);
            }
            match state.segment.read_at(&mut buf[n..], state.pos) {
                Ok(copied) => {
                    n += copied;
                    state.pos += copied;
                    state.waiting = false;
                }
                Err(Error::EndOfStream) => {
                    if self.cancel.is_cancelled() || self.log.closed().is_cancelled() {
                        return (n, Some(Error::EndOfStream));
                    }
                    if let Some(err) = self.advance_past_tail(&mut state) {
                        return (n, Some(err));
                    }
                }
                Err(other) => return (n, Some(other)),
            }
        }
    }

    /// Handles a tail-hit. A successor segment already in the snapshot is
    /// always taken immediately. Otherwise behavior depends on whether
    /// this is the first time this reader has hit this particular tail
    /// (`!state.waiting`) or a re-entry after having already parked once
    /// with no progress (`state.waiting`):
    ///
    /// - First hit on a live (non-finalized) segment: register and park on
    ///   the segment's own notifier — the common case, woken the instant
    ///   more data or a roll arrives.
    /// - Re-entry (we already parked once and came back here without
    ///   `read_at` making progress): the only way that happens is the
    ///   segment having been finalized with no successor visible yet, a
    ///   transient roll race (spec §9). The segment's notifier has already
    ///   fired its last notification, so parking on it again would hang
    ///   forever; poll the segment-list snapshot directly instead.
    ///
    /// Returns `Some(err)` only on cancellation/close.
    fn advance_past_tail(&self, state: &mut State) -> Option<Error> {
        let segments = self.log.segments();
        if let Some(next) = lookup::next_segment_after(&segments, state.segment.base_offset()) {
            state.segment = next;
            state.pos = 0;
            state.waiting = false;
            return None;
        }

        if state.waiting {
            return match self.poll_for_successor(state.segment.base_offset()) {
                Some(next) => {
                    state.segment = next;
                    state.pos = 0;
                    state.waiting = false;
                    None
                }
                None => Some(Error::EndOfStream),
            };
        }

        log::debug!(
            "uncommitted reader parking at tail of segment base {}",
            state.segment.base_offset()
        );
        let (handle, seen) = state.segment.wait_for_data();
        state.waiting = true;
        let outcome = state
            .segment
            .park_for_data(&handle, seen, &self.cancel, self.log.closed());
        match outcome {
            WaitOutcome::Advanced(_) => None,
            WaitOutcome::Cancelled => Some(Error::EndOfStream),
        }
    }

    fn poll_for_successor(&self, current_base: i64) -> Option<Arc<Segment>> {
        loop {
            if self.cancel.is_cancelled() || self.log.closed().is_cancelled() {
                return None;
            }
            let segments = self.log.segments();
            if let Some(next) = lookup::next_segment_after(&segments, current_base) {
                return Some(next);
            }
            thread::sleep(SUCCESSOR_POLL_INTERVAL);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HEADER_LEN;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn reads_records_already_written() {
        let log = CommitLog::new();
        log.append(b"hello").unwrap();
        log.append(b"world").unwrap();

        let reader = UncommittedReader::new(&log, CancellationToken::new(), 0).unwrap();
        let mut buf = vec![0u8; HEADER_LEN + 5];
        let (n, err) = reader.read(&mut buf);
        assert!(err.is_none());
        assert_eq!(n, buf.len());
        assert_eq!(&buf[HEADER_LEN..], b"hello");
    }

    #[test]
    fn blocks_for_data_not_yet_written_then_delivers_it() {
        let log = CommitLog::new();
        log.append(b"first").unwrap();
        let reader = Arc::new(UncommittedReader::new(&log, CancellationToken::new(), 0).unwrap());

        let log2 = Arc::clone(&log);
        let writer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            log2.append(b"second").unwrap();
        });

        // "first" is 5 bytes, "second" is 6; request exactly first+second.
        let mut buf = vec![0u8; (HEADER_LEN + 5) + (HEADER_LEN + 6)];
        let (n, err) = reader.read(&mut buf);
        assert!(err.is_none());
        assert_eq!(n, buf.len());
        writer.join().unwrap();
    }

    #[test]
    fn cancellation_ends_a_blocked_read() {
        let log = CommitLog::new();
        let cancel = CancellationToken::new();
        let reader = Arc::new(UncommittedReader::new(&log, cancel.clone(), 0).unwrap());

        let cancel2 = cancel.clone();
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            cancel2.cancel();
        });

        let mut buf = vec![0u8; 16];
        let (n, err) = reader.read(&mut buf);
        assert_eq!(n, 0);
        assert!(matches!(err, Some(Error::EndOfStream)));
    }

    #[test]
    fn rolls_across_segments() {
        let log = CommitLog::with_config(Arc::new(crate::clock::SystemClock), HEADER_LEN + 4);
        log.append(b"aaaa").unwrap();
        log.append(b"bbbb").unwrap();
        assert_eq!(log.segments().len(), 2);

        let reader = UncommittedReader::new(&log, CancellationToken::new(), 0).unwrap();
        let mut buf = vec![0u8; 2 * (HEADER_LEN + 4)];
        let (n, err) = reader.read(&mut buf);
        assert!(err.is_none());
        assert_eq!(n, buf.len());
        assert_eq!(&buf[HEADER_LEN..HEADER_LEN + 4], b"aaaa");
        assert_eq!(&buf[2 * HEADER_LEN + 4..], b"bbbb");
    }
}
