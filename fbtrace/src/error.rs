// /////////////////////////////////////////////////////////////////////////////
// fbtrace
// /////////////////////////////////////////////////////////////////////////////

//! Errors surfaced by the parts of the sink that do touch I/O.
//!
//! Fast-path producer failures (no slot, no memory) never reach this
//! type — they become counter increments instead (`SPEC_FULL.md` §7).
//! `SinkError` is only for `create_default_sink` and any other
//! caller-visible operation.

use std::io;

use fbtrace_domain::FormatError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SinkError {
    /// The log path already exists; sinks never overwrite an existing
    /// file (mirrors `CREATE_NEW` semantics).
    #[error("log file already exists: {0}")]
    PathInUse(std::path::PathBuf),

    /// The process lacks permission to create the log file.
    #[error("access denied creating log file: {0}")]
    AccessDenied(std::path::PathBuf),

    /// Any other I/O failure while creating or writing the log.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// A chunk could not be encoded (bad path length, etc.).
    #[error("chunk format error: {0}")]
    Format(#[from] FormatError),
}
