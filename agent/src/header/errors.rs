//! Header format errors

use thiserror::Error;

/// Reasons a header blob cannot be encoded or decoded
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("header data too short for {what}: need {needed} bytes, got {actual}")]
    TooShort {
        what: &'static str,
        needed: usize,
        actual: usize,
    },

    #[error("bad header magic: expected {expected:#010x}, found {found:#010x}")]
    BadMagic { expected: u32, found: u32 },

    #[error("unsupported header version: expected {expected}, found {found}")]
    UnsupportedVersion { expected: u32, found: u32 },

    #[error("bad header CRC: stored {stored:#010x}, computed {computed:#010x}")]
    ChecksumMismatch { stored: u32, computed: u32 },

    #[error("non-zero padding in firmware hash slot at byte {offset}")]
    NonZeroPadding { offset: usize },

    #[error("{field} must be {expected} bytes, got {actual}")]
    BadFieldLength {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}
