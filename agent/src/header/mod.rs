//! Firmware/update header
//!
//! A fixed big-endian record with an embedded CRC-32, followed by a
//! variable-length signature.

pub mod codec;
pub mod errors;

pub use codec::{decode, encode, hash_stream, FirmwareHeader};
pub use errors::FormatError;
