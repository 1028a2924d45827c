use thiserror::Error;

/// Errors surfaced by the commit log reader subsystem (spec §7).
#[derive(Debug, Error)]
pub enum Error {
    /// The offset does not fall within any segment of the current snapshot.
    #[error("segment not found for offset {offset}")]
    SegmentNotFound { offset: i64 },

    /// The segment exists but its index has no entry for the offset.
    #[error("offset {offset} out of range for segment base {segment_base}")]
    OffsetOutOfRange { offset: i64, segment_base: i64 },

    /// Orderly termination: cancellation or log close. Never a fault.
    #[error("end of stream")]
    EndOfStream,

    /// A committed reader expected a successor segment below the high
    /// watermark and found none — a storage invariant violation (§9).
    #[error("no next segment found below the high watermark (base {base})")]
    InternalNoNextSegment { base: i64 },

    /// Opaque positional-read failure from the underlying storage layer.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
