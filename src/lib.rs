//! A blocking, cancellable commit-log reader subsystem.
//!
//! [`CommitLog`] owns an ordered list of append-only [`segment::Segment`]s
//! and a high watermark. [`UncommittedReader`] streams records as they are
//! written, regardless of commitment; [`CommittedReader`] never reads past
//! the high watermark, blocking at that boundary instead. Both readers are
//! single-threaded internally (`Read` calls serialize on the reader's own
//! mutex) and treat cancellation or log close as an orderly end of stream.

pub mod cancel;
pub mod clock;
pub mod commit_log;
pub mod error;
pub mod header;
pub mod reader;
pub mod segment;
pub mod wait;

pub use cancel::CancellationToken;
pub use clock::{Clock, SystemClock};
pub use commit_log::CommitLog;
pub use error::{Error, Result};
pub use header::{decode_message, FrameHeader, HEADER_LEN};
pub use reader::{CommittedReader, UncommittedReader};
pub use segment::Segment;
