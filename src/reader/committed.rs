//! Spec §4.6: a reader that only delivers data at or below the high
//! watermark, blocking at the HW boundary instead of following the raw
//! write tail.

use std::sync::{Arc, Mutex};

use crate::cancel::CancellationToken;
use crate::commit_log::CommitLog;
use crate::error::{Error, Result};
use crate::segment::{lookup, Segment};
use crate::wait::WaitOutcome;

enum ReaderState {
    /// Constructed (or parked) above the high watermark: nothing to read
    /// yet. `requested_offset` is the offset the caller actually asked
    /// for; `last_seen_hw` is only used to skip a redundant `park` call
    /// when the HW has already moved since it was last observed.
    Waiting { requested_offset: i64, last_seen_hw: i64 },
    Reading {
        segment: Arc<Segment>,
        pos: usize,
        hw: i64,
        hw_segment: Arc<Segment>,
        hw_pos: usize,
    },
}

pub struct CommittedReader {
    log: Arc<CommitLog>,
    cancel: CancellationToken,
    state: Mutex<ReaderState>,
}

impl CommittedReader {
    pub fn new(log: &Arc<CommitLog>, cancel: CancellationToken, offset: i64) -> Result<Self> {
        let hw = log.high_watermark();
        let state = if offset > hw {
            ReaderState::Waiting {
                requested_offset: offset,
                last_seen_hw: hw,
            }
        } else {
            let segments = log.segments();
            let (hw_segment, hw_pos) = hw_cursor(&segments, hw)?;
            let start_offset = offset.max(log.oldest_offset());
            let (_, segment) = lookup::find_segment(&segments, start_offset)
                .ok_or(Error::SegmentNotFound { offset: start_offset })?;
            let (pos, _size) = segment.find_entry(start_offset)?;
            ReaderState::Reading {
                segment,
                pos,
                hw,
                hw_segment,
                hw_pos,
            }
        };
        Ok(Self {
            log: Arc::clone(log),
            cancel,
            state: Mutex::new(state),
        })
    }

    pub fn read(&self, buf: &mut [u8]) -> (usize, Option<Error>) {
        let mut state = self.state.lock().expect("reader lock poisoned");
        let mut n = 0usize;
        loop {
            if n == buf.len() {
                return (n, None);
            }

            if let ReaderState::Waiting { requested_offset, .. } = &*state {
                let requested_offset = *requested_offset;
                match self.resolve_waiting(requested_offset) {
                    Ok(next) => *state = next,
                    Err(Error::EndOfStream) => return (n, Some(Error::EndOfStream)),
                    Err(other) => return (n, Some(other)),
                }
                continue;
            }

            let ReaderState::Reading {
                segment,
                pos,
                hw,
                hw_segment,
                hw_pos,
            } = &mut *state
            else {
                unreachable!("handled above");
            };

            let limit = if segment.base_offset() == hw_segment.base_offset() {
                hw_pos.saturating_sub(*pos)
            } else {
                buf.len() - n
            };
            let want = (buf.len() - n).min(limit);

            if want == 0 {
                match self.wait_past_hw(*hw) {
                    Ok((new_hw, new_segment, new_pos)) => {
                        *hw = new_hw;
                        *hw_segment = new_segment;
                        *hw_pos = new_pos;
                    }
                    Err(Error::EndOfStream) => return (n, Some(Error::EndOfStream)),
                    Err(other) => return (n, Some(other)),
                }
                continue;
            }

            match segment.read_at(&mut buf[n..n + want], *pos) {
                Ok(copied) => {
                    n += copied;
                    *pos += copied;
                }
                Err(Error::EndOfStream) => {
                    let segments = self.log.segments();
                    match lookup::next_segment_after(&segments, segment.base_offset()) {
                        Some(next) => {
                            *segment = next;
                            *pos = 0;
                        }
                        None => {
                            let base = segment.base_offset();
                            log::warn!(
                                "committed reader found no successor below the high watermark for segment base {base}"
                            );
                            return (n, Some(Error::InternalNoNextSegment { base }));
                        }
                    }
                }
                Err(other) => return (n, Some(other)),
            }
        }
    }

    /// Blocks until the HW advances past `requested_offset`, then resolves
    /// the HW cursor and the reader's own starting position.
    fn resolve_waiting(&self, requested_offset: i64) -> Result<ReaderState> {
        loop {
            let hw = self.log.high_watermark();
            if hw >= requested_offset {
                let segments = self.log.segments();
                let (hw_segment, hw_pos) = hw_cursor(&segments, hw)?;
                let start_offset = requested_offset.max(self.log.oldest_offset());
                let (_, segment) = lookup::find_segment(&segments, start_offset)
                    .ok_or(Error::SegmentNotFound { offset: start_offset })?;
                let (pos, _size) = segment.find_entry(start_offset)?;
                return Ok(ReaderState::Reading {
                    segment,
                    pos,
                    hw,
                    hw_segment,
                    hw_pos,
                });
            }
            if self.cancel.is_cancelled() || self.log.closed().is_cancelled() {
                return Err(Error::EndOfStream);
            }
            log::debug!("committed reader waiting for HW to reach offset {requested_offset}");
            let (handle, seen) = self.log.wait_for_hw();
            if let WaitOutcome::Cancelled = self.log.park_for_hw(&handle, seen, &self.cancel) {
                return Err(Error::EndOfStream);
            }
        }
    }

    /// Blocks until the HW advances past `current_hw`, then returns the
    /// refreshed HW cursor.
    fn wait_past_hw(&self, current_hw: i64) -> Result<(i64, Arc<Segment>, usize)> {
        loop {
            let hw = self.log.high_watermark();
            if hw > current_hw {
                let segments = self.log.segments();
                let (hw_segment, hw_pos) = hw_cursor(&segments, hw)?;
                return Ok((hw, hw_segment, hw_pos));
            }
            if self.cancel.is_cancelled() || self.log.closed().is_cancelled() {
                return Err(Error::EndOfStream);
            }
            let (handle, seen) = self.log.wait_for_hw();
            if let WaitOutcome::Cancelled = self.log.park_for_hw(&handle, seen, &self.cancel) {
                return Err(Error::EndOfStream);
            }
        }
    }
}

/// The byte position just past the high-watermark message: spec §4.6's
/// construction step defines `hwPos` this way directly, which this follows
/// in both the constructor and the read loop's re-resolution after a wait.
fn hw_cursor(segments: &[Arc<Segment>], hw: i64) -> Result<(Arc<Segment>, usize)> {
    let (_, segment) = lookup::find_segment(segments, hw).ok_or(Error::SegmentNotFound { offset: hw })?;
    let (pos, size) = segment.find_entry(hw)?;
    Ok((segment, pos + size))
}
