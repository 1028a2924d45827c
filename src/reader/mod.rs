//! Streaming readers over a [`crate::CommitLog`] (spec §4).
//!
//! Two readers share the same framing and segment-lookup machinery but
//! differ in what they will deliver: [`UncommittedReader`] follows the
//! write tail, [`CommittedReader`] never reads past the high watermark.
//! Both serialize `read` calls on their own internal mutex (spec §4: "each
//! reader's Read call is serialized on the reader's own mutex") and treat
//! cancellation or log close as an orderly end of stream, not a fault.

mod committed;
mod uncommitted;

pub use committed::CommittedReader;
pub use uncommitted::UncommittedReader;
