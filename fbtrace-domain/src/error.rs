// /////////////////////////////////////////////////////////////////////////////
// fbtrace
// /////////////////////////////////////////////////////////////////////////////

//! Pure data errors for the binary log format.
//!
//! These are the errors C1 (the chunk codec) can raise on its own —
//! nothing here depends on I/O, which lives in the `fbtrace` crate's
//! `SinkError` instead.

use thiserror::Error;

/// Errors raised while encoding or decoding a chunk.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// A path exceeded the 32767-byte limit the on-disk `path_size`
    /// field can represent.
    #[error("path length {0} exceeds the maximum of 32767 bytes")]
    BadPathLength(usize),

    /// A chunk header's `reserved` field was nonzero on decode.
    #[error("chunk header reserved field is {0:#06x}, expected 0")]
    ReservedNonZero(u16),

    /// A chunk's declared size is not a multiple of `CHUNK_ALIGNMENT`,
    /// or is not large enough to hold its own header.
    #[error("chunk size {0} is not a valid aligned chunk length")]
    BadChunkSize(u32),

    /// The file header's signature did not match `FILE_SIGNATURE`.
    #[error("bad file signature: {0:?}")]
    BadSignature([u8; 4]),

    /// The trace-buffer payload length is zero or not a whole number
    /// of transition records.
    #[error("trace buffer length {0} is not a nonzero multiple of the transition record size")]
    BadTraceBufferLength(usize),

    /// A chunk header's `type` field did not match any known tag.
    #[error("unknown chunk type tag {0}")]
    UnknownChunkType(u16),
}
