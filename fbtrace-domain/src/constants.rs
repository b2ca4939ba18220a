// /////////////////////////////////////////////////////////////////////////////
// fbtrace
// /////////////////////////////////////////////////////////////////////////////

//! Format-fixed constants for the trace-log binary layout.
//!
//! These are part of the wire format, not configuration: changing any
//! of them changes what bytes a conforming reader expects to see.

/// Every chunk starts at an offset that is a multiple of this value,
/// and every chunk's declared size is a multiple of it too.
pub const CHUNK_ALIGNMENT: u32 = 8;

/// No chunk may straddle a boundary that is a multiple of this value.
/// Must be a power of two and at least 64 KiB.
pub const SEGMENT_SIZE: u64 = 65536;

/// 4-byte ASCII signature at offset 0 of the log file.
pub const FILE_SIGNATURE: [u8; 4] = *b"JTRC";

/// Current on-disk format version.
pub const FILE_VERSION: u32 = 1;

/// Characteristics bit: timestamps are TSC-sourced.
pub const CHARACTERISTIC_TIMESTAMP_TSC: u32 = 1 << 0;

/// Characteristics bit: the trace-buffer payload uses the 32-bit
/// transition layout.
pub const CHARACTERISTIC_32BIT: u32 = 1 << 1;

/// Longest path, in bytes, the `path_size` field can represent.
pub const MAX_PATH_LEN: usize = 0x7fff;

const _: () = assert!(SEGMENT_SIZE.is_power_of_two());
const _: () = assert!(SEGMENT_SIZE >= 65536);
