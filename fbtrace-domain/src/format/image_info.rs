// /////////////////////////////////////////////////////////////////////////////
// fbtrace
// /////////////////////////////////////////////////////////////////////////////

//! Image-load event framing: header + load address + size + path,
//! zero-padded to the chunk's declared, aligned size.
//!
//! The path is treated as an opaque byte string. The original format
//! assumes an ANSI host encoding; this implementation makes no
//! assumption about encoding beyond "bytes that fit in 32767 of them",
//! since nothing downstream interprets the path as text.

use crate::constants::MAX_PATH_LEN;
use crate::error::FormatError;
use crate::format::chunk::{aligned, ChunkHeader, ChunkType};

/// Fixed portion of the image-info payload, before the path bytes:
/// load address (8) + image size (4) + path size (2) + reserved (2).
const FIXED_PAYLOAD_LEN: u32 = 16;

/// Computes the total, aligned chunk length (including the 8-byte
/// chunk header) needed to hold an image-info event with the given
/// path length.
pub fn image_info_chunk_len(path_len: usize) -> Result<u32, FormatError> {
    if path_len > MAX_PATH_LEN {
        return Err(FormatError::BadPathLength(path_len));
    }
    let unaligned = ChunkHeader::LEN as u32 + FIXED_PAYLOAD_LEN + path_len as u32;
    Ok(aligned(unaligned))
}

/// Serialises a complete image-info chunk (header included), zero
/// padding the tail out to the value `image_info_chunk_len` would
/// return for the same path length.
pub fn encode_image_info(load_address: u64, image_size: u32, path: &[u8]) -> Result<Vec<u8>, FormatError> {
    let total_len = image_info_chunk_len(path.len())?;
    let mut out = vec![0u8; total_len as usize];

    let header = ChunkHeader::new(ChunkType::ImageInfo, total_len);
    out[0..ChunkHeader::LEN].copy_from_slice(&header.to_bytes());

    let mut off = ChunkHeader::LEN;
    out[off..off + 8].copy_from_slice(&load_address.to_le_bytes());
    off += 8;
    out[off..off + 4].copy_from_slice(&image_size.to_le_bytes());
    off += 4;
    out[off..off + 2].copy_from_slice(&(path.len() as u16).to_le_bytes());
    off += 2;
    // reserved (2 bytes) stays zero
    off += 2;
    out[off..off + path.len()].copy_from_slice(path);
    // everything after the path is already zero from `vec![0u8; ...]`

    Ok(out)
}

/// A decoded image-info chunk, used by tests and by any future reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub load_address: u64,
    pub image_size: u32,
    pub path: Vec<u8>,
}

pub fn decode_image_info(chunk_bytes: &[u8]) -> Result<ImageInfo, FormatError> {
    let header_bytes: [u8; ChunkHeader::LEN] = chunk_bytes[0..ChunkHeader::LEN]
        .try_into()
        .map_err(|_| FormatError::BadChunkSize(chunk_bytes.len() as u32))?;
    let header = ChunkHeader::from_bytes(&header_bytes)?;
    if header.chunk_type != ChunkType::ImageInfo {
        return Err(FormatError::UnknownChunkType(header.chunk_type as u16));
    }

    let mut off = ChunkHeader::LEN;
    let load_address = u64::from_le_bytes(chunk_bytes[off..off + 8].try_into().unwrap());
    off += 8;
    let image_size = u32::from_le_bytes(chunk_bytes[off..off + 4].try_into().unwrap());
    off += 4;
    let path_size = u16::from_le_bytes(chunk_bytes[off..off + 2].try_into().unwrap()) as usize;
    off += 2;
    let reserved = u16::from_le_bytes(chunk_bytes[off..off + 2].try_into().unwrap());
    if reserved != 0 {
        return Err(FormatError::ReservedNonZero(reserved));
    }
    off += 2;
    let path = chunk_bytes[off..off + path_size].to_vec();

    // Every byte from the end of the path to the end of the chunk
    // must be zero padding.
    if chunk_bytes[off + path_size..].iter().any(|&b| b != 0) {
        return Err(FormatError::BadChunkSize(header.size));
    }

    Ok(ImageInfo {
        load_address,
        image_size,
        path,
    })
}
