// /////////////////////////////////////////////////////////////////////////////
// fbtrace
// /////////////////////////////////////////////////////////////////////////////

//! Trace-buffer chunk framing: header + client tuple + N transition
//! records. The transition payload itself is written by the caller
//! (the drained buffer, untouched) rather than through this module, to
//! honor the "no intermediate copy" rule — this module only builds the
//! chunk header and the small client-tuple prefix, and decodes
//! transitions for tests/readers.

use crate::error::FormatError;
use crate::format::chunk::{ChunkHeader, ChunkType};

/// Size, in bytes, of one 32-bit-target transition record: kind (4) +
/// timestamp (8) + procedure (4) + info (4) + padding (4).
pub const TRANSITION_LEN: usize = 24;

/// Size, in bytes, of the client tuple (process-id + thread-id) that
/// prefixes the transitions in a trace-buffer chunk.
pub const CLIENT_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum TransitionKind {
    Entry = 1,
    Exit = 2,
}

/// One procedure-entry or procedure-exit event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub kind: TransitionKind,
    pub timestamp: u64,
    pub procedure: u32,
    /// Caller IP for `Entry`, return-value register for `Exit`.
    pub info: u32,
}

impl Transition {
    pub fn to_bytes(self) -> [u8; TRANSITION_LEN] {
        let mut out = [0u8; TRANSITION_LEN];
        out[0..4].copy_from_slice(&(self.kind as u32).to_le_bytes());
        out[4..12].copy_from_slice(&self.timestamp.to_le_bytes());
        out[12..16].copy_from_slice(&self.procedure.to_le_bytes());
        out[16..20].copy_from_slice(&self.info.to_le_bytes());
        // bytes 20..24 are padding, stay zero
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FormatError> {
        if bytes.len() != TRANSITION_LEN {
            return Err(FormatError::BadTraceBufferLength(bytes.len()));
        }
        let raw_kind = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let kind = match raw_kind {
            1 => TransitionKind::Entry,
            2 => TransitionKind::Exit,
            other => return Err(FormatError::BadTraceBufferLength(other as usize)),
        };
        let timestamp = u64::from_le_bytes(bytes[4..12].try_into().unwrap());
        let procedure = u32::from_le_bytes(bytes[12..16].try_into().unwrap());
        let info = u32::from_le_bytes(bytes[16..20].try_into().unwrap());
        Ok(Self {
            kind,
            timestamp,
            procedure,
            info,
        })
    }
}

/// Validates that `payload_len` is a nonzero multiple of
/// `TRANSITION_LEN` and returns the header for the resulting
/// trace-buffer chunk (client tuple + transitions).
pub fn trace_buffer_header(payload_len: usize) -> Result<ChunkHeader, FormatError> {
    if payload_len == 0 || payload_len % TRANSITION_LEN != 0 {
        return Err(FormatError::BadTraceBufferLength(payload_len));
    }
    let total = ChunkHeader::LEN + CLIENT_LEN + payload_len;
    Ok(ChunkHeader::new(ChunkType::TraceBuffer, total as u32))
}

/// Serialises the client tuple that prefixes a trace-buffer chunk's
/// transitions.
pub fn encode_client(process_id: u32, thread_id: u32) -> [u8; CLIENT_LEN] {
    let mut out = [0u8; CLIENT_LEN];
    out[0..4].copy_from_slice(&process_id.to_le_bytes());
    out[4..8].copy_from_slice(&thread_id.to_le_bytes());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transition_round_trips() {
        let t = Transition {
            kind: TransitionKind::Entry,
            timestamp: 1,
            procedure: 0x401000,
            info: 0x402000,
        };
        assert_eq!(Transition::from_bytes(&t.to_bytes()).unwrap(), t);
    }

    #[test]
    fn rejects_non_multiple_length() {
        assert!(trace_buffer_header(0).is_err());
        assert!(trace_buffer_header(TRANSITION_LEN - 1).is_err());
        assert!(trace_buffer_header(TRANSITION_LEN).is_ok());
    }

    #[test]
    fn literal_scenario_three_two_transitions() {
        // pid=100, tid=200, ENTRY ts=1 proc=0x401000 info=0x402000,
        // EXIT ts=2 proc=0x401000 info=0.
        let header = trace_buffer_header(2 * TRANSITION_LEN).unwrap();
        assert_eq!(header.size, 8 + 8 + 2 * 24);

        let client = encode_client(100, 200);
        assert_eq!(u32::from_le_bytes(client[0..4].try_into().unwrap()), 100);
        assert_eq!(u32::from_le_bytes(client[4..8].try_into().unwrap()), 200);

        let entry = Transition {
            kind: TransitionKind::Entry,
            timestamp: 1,
            procedure: 0x401000,
            info: 0x402000,
        };
        let exit = Transition {
            kind: TransitionKind::Exit,
            timestamp: 2,
            procedure: 0x401000,
            info: 0,
        };
        assert_eq!(entry.to_bytes().len() + exit.to_bytes().len(), 2 * TRANSITION_LEN);
    }
}
