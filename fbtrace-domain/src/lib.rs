// /////////////////////////////////////////////////////////////////////////////
// fbtrace
// /////////////////////////////////////////////////////////////////////////////

//! # fbtrace Domain
//!
//! Pure, I/O-free data types for the fbtrace function-boundary tracer:
//! the binary log format (chunk framing, file header, image-info and
//! trace-buffer payloads) and the drop-accounting statistics counters.
//!
//! Nothing in this crate touches a file handle or a thread; the
//! `fbtrace` crate builds the writer, lock-free queue, and event sink
//! on top of these types.

pub mod constants;
pub mod error;
pub mod format;
pub mod stats;

pub use error::FormatError;
pub use stats::{Statistics, StatisticsSnapshot};
