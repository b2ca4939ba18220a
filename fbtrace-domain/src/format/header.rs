// /////////////////////////////////////////////////////////////////////////////
// fbtrace
// /////////////////////////////////////////////////////////////////////////////

//! The 32-byte file header written once at offset 0.

use crate::constants::{CHARACTERISTIC_32BIT, CHARACTERISTIC_TIMESTAMP_TSC, FILE_SIGNATURE, FILE_VERSION};
use crate::error::FormatError;

/// Signature + version + characteristics + reserved padding, written
/// once at the start of every log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileHeader {
    pub version: u32,
    pub characteristics: u32,
}

impl FileHeader {
    pub const LEN: usize = 32;

    /// The header this crate writes for every sink it creates: TSC
    /// timestamps, 32-bit transition layout.
    pub fn current() -> Self {
        Self {
            version: FILE_VERSION,
            characteristics: CHARACTERISTIC_TIMESTAMP_TSC | CHARACTERISTIC_32BIT,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[0..4].copy_from_slice(&FILE_SIGNATURE);
        out[4..8].copy_from_slice(&self.version.to_le_bytes());
        out[8..12].copy_from_slice(&self.characteristics.to_le_bytes());
        // bytes 12..32 stay zero (reserved)
        out
    }

    pub fn from_bytes(bytes: &[u8; Self::LEN]) -> Result<Self, FormatError> {
        let signature: [u8; 4] = bytes[0..4].try_into().unwrap();
        if signature != FILE_SIGNATURE {
            return Err(FormatError::BadSignature(signature));
        }
        let version = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        let characteristics = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
        Ok(Self { version, characteristics })
    }

    pub fn has_tsc_timestamps(&self) -> bool {
        self.characteristics & CHARACTERISTIC_TIMESTAMP_TSC != 0
    }

    pub fn is_32bit(&self) -> bool {
        self.characteristics & CHARACTERISTIC_32BIT != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_header_round_trips() {
        let header = FileHeader::current();
        let bytes = header.to_bytes();
        let decoded = FileHeader::from_bytes(&bytes).unwrap();
        assert_eq!(decoded, header);
        assert!(decoded.has_tsc_timestamps());
        assert!(decoded.is_32bit());
    }

    #[test]
    fn reserved_tail_is_zero() {
        let bytes = FileHeader::current().to_bytes();
        assert!(bytes[12..32].iter().all(|&b| b == 0));
    }

    #[test]
    fn rejects_bad_signature() {
        let mut bytes = FileHeader::current().to_bytes();
        bytes[0] = b'X';
        assert!(matches!(FileHeader::from_bytes(&bytes), Err(FormatError::BadSignature(_))));
    }

    #[test]
    fn literal_scenario_one_fresh_header_bytes() {
        // End-to-end scenario 1 from the spec: a fresh sink with no
        // events writes exactly this header and nothing else.
        let bytes = FileHeader::current().to_bytes();
        assert_eq!(&bytes[0..4], b"JTRC");
        assert_eq!(&bytes[4..8], &[0x01, 0x00, 0x00, 0x00]);
        assert_eq!(&bytes[8..12], &[0x03, 0x00, 0x00, 0x00]);
        assert!(bytes[12..32].iter().all(|&b| b == 0));
    }
}
