//! Header encoding and decoding

use std::path::Path;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::header::errors::FormatError;
use crate::utils::hex;

/// Magic constant at the start of every header
pub const HEADER_MAGIC: u32 = 0x5a51_b3d4;

/// The only supported format version
pub const HEADER_VERSION: u32 = 2;

/// Size of the digest actually produced (SHA-256)
pub const HASH_SIZE: usize = 32;

/// Width of the hash slot on the wire (sized for SHA-512)
pub const HASH_SLOT_SIZE: usize = 64;

pub const CAMPAIGN_ID_SIZE: usize = 16;

/// Fixed record covered by the checksum
pub const FIXED_RECORD_SIZE: usize = 4 + 4 + 8 + 8 + HASH_SLOT_SIZE + CAMPAIGN_ID_SIZE + 4;

pub const CHECKSUM_SIZE: usize = 4;

/// Fixed record plus checksum; the signature follows
pub const HEADER_SIZE: usize = FIXED_RECORD_SIZE + CHECKSUM_SIZE;

/// Read size used when hashing payloads
pub const HASH_CHUNK_SIZE: usize = 128 * 1024;

const MAGIC_OFFSET: usize = 0;
const VERSION_OFFSET: usize = 4;
const FW_VERSION_OFFSET: usize = 8;
const FW_SIZE_OFFSET: usize = 16;
const HASH_OFFSET: usize = 24;
const CAMPAIGN_OFFSET: usize = HASH_OFFSET + HASH_SLOT_SIZE;
const SIG_LEN_OFFSET: usize = CAMPAIGN_OFFSET + CAMPAIGN_ID_SIZE;

/// Metadata describing an update payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareHeader {
    /// Payload version as a Unix timestamp (seconds)
    pub firmware_version: u64,

    /// Payload size in bytes
    pub firmware_size: u64,

    /// SHA-256 of the payload
    pub firmware_hash: Vec<u8>,

    /// Opaque campaign identifier
    pub campaign_id: Vec<u8>,

    /// Opaque signature blob
    pub firmware_signature: Vec<u8>,
}

impl FirmwareHeader {
    /// Build a header describing the payload at `path`. The payload is
    /// hashed in chunks.
    pub async fn for_payload(
        path: &Path,
        firmware_version: u64,
        campaign_id: Vec<u8>,
        firmware_signature: Vec<u8>,
    ) -> std::io::Result<Self> {
        let mut file = tokio::fs::File::open(path).await?;
        let firmware_size = file.metadata().await?.len();
        let firmware_hash = hash_stream(&mut file).await?;
        Ok(Self {
            firmware_version,
            firmware_size,
            firmware_hash,
            campaign_id,
            firmware_signature,
        })
    }

    /// Firmware version interpreted as a timestamp
    pub fn version_time(&self) -> Option<DateTime<Utc>> {
        i64::try_from(self.firmware_version)
            .ok()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
    }
}

impl std::fmt::Display for FirmwareHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let version_time = self
            .version_time()
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        writeln!(f, "firmware_version:   {} ({})", self.firmware_version, version_time)?;
        writeln!(f, "firmware_size:      {}", self.firmware_size)?;
        writeln!(f, "firmware_hash:      {}", hex::encode(&self.firmware_hash))?;
        writeln!(f, "campaign_id:        {}", hex::encode(&self.campaign_id))?;
        write!(f, "firmware_signature: {} bytes", self.firmware_signature.len())
    }
}

/// Serialize a header
pub fn encode(header: &FirmwareHeader) -> Result<Vec<u8>, FormatError> {
    check_len("firmware_hash", HASH_SIZE, header.firmware_hash.len())?;
    check_len("campaign_id", CAMPAIGN_ID_SIZE, header.campaign_id.len())?;
    let sig_len = u32::try_from(header.firmware_signature.len()).map_err(|_| FormatError::BadFieldLength {
        field: "firmware_signature",
        expected: u32::MAX as usize,
        actual: header.firmware_signature.len(),
    })?;

    let mut buf = vec![0u8; HEADER_SIZE + header.firmware_signature.len()];
    buf[MAGIC_OFFSET..VERSION_OFFSET].copy_from_slice(&HEADER_MAGIC.to_be_bytes());
    buf[VERSION_OFFSET..FW_VERSION_OFFSET].copy_from_slice(&HEADER_VERSION.to_be_bytes());
    buf[FW_VERSION_OFFSET..FW_SIZE_OFFSET].copy_from_slice(&header.firmware_version.to_be_bytes());
    buf[FW_SIZE_OFFSET..HASH_OFFSET].copy_from_slice(&header.firmware_size.to_be_bytes());
    // Tail of the hash slot stays zero
    buf[HASH_OFFSET..HASH_OFFSET + HASH_SIZE].copy_from_slice(&header.firmware_hash);
    buf[CAMPAIGN_OFFSET..SIG_LEN_OFFSET].copy_from_slice(&header.campaign_id);
    buf[SIG_LEN_OFFSET..FIXED_RECORD_SIZE].copy_from_slice(&sig_len.to_be_bytes());

    let crc = crc32fast::hash(&buf[..FIXED_RECORD_SIZE]);
    buf[FIXED_RECORD_SIZE..HEADER_SIZE].copy_from_slice(&crc.to_be_bytes());
    buf[HEADER_SIZE..].copy_from_slice(&header.firmware_signature);

    Ok(buf)
}

/// Parse and verify a header
pub fn decode(data: &[u8]) -> Result<FirmwareHeader, FormatError> {
    if data.len() < HEADER_SIZE {
        return Err(FormatError::TooShort {
            what: "header",
            needed: HEADER_SIZE,
            actual: data.len(),
        });
    }

    let magic = read_u32(data, MAGIC_OFFSET);
    if magic != HEADER_MAGIC {
        return Err(FormatError::BadMagic {
            expected: HEADER_MAGIC,
            found: magic,
        });
    }

    let version = read_u32(data, VERSION_OFFSET);
    if version != HEADER_VERSION {
        return Err(FormatError::UnsupportedVersion {
            expected: HEADER_VERSION,
            found: version,
        });
    }

    let slot = &data[HASH_OFFSET..CAMPAIGN_OFFSET];
    if let Some(pos) = slot[HASH_SIZE..].iter().position(|b| *b != 0) {
        return Err(FormatError::NonZeroPadding {
            offset: HASH_OFFSET + HASH_SIZE + pos,
        });
    }

    let stored = read_u32(data, FIXED_RECORD_SIZE);
    let computed = crc32fast::hash(&data[..FIXED_RECORD_SIZE]);
    if stored != computed {
        return Err(FormatError::ChecksumMismatch { stored, computed });
    }

    let sig_len = read_u32(data, SIG_LEN_OFFSET) as usize;
    let sig_end = HEADER_SIZE.saturating_add(sig_len);
    if data.len() < sig_end {
        return Err(FormatError::TooShort {
            what: "signature",
            needed: sig_end,
            actual: data.len(),
        });
    }

    Ok(FirmwareHeader {
        firmware_version: read_u64(data, FW_VERSION_OFFSET),
        firmware_size: read_u64(data, FW_SIZE_OFFSET),
        firmware_hash: slot[..HASH_SIZE].to_vec(),
        campaign_id: data[CAMPAIGN_OFFSET..SIG_LEN_OFFSET].to_vec(),
        firmware_signature: data[HEADER_SIZE..sig_end].to_vec(),
    })
}

/// SHA-256 of everything readable from `reader`, read in
/// [`HASH_CHUNK_SIZE`] chunks
pub async fn hash_stream<R>(reader: &mut R) -> std::io::Result<Vec<u8>>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut hasher = Sha256::new();
    let mut chunk = vec![0u8; HASH_CHUNK_SIZE];
    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        hasher.update(&chunk[..n]);
    }
    Ok(hasher.finalize().to_vec())
}

fn check_len(field: &'static str, expected: usize, actual: usize) -> Result<(), FormatError> {
    if expected != actual {
        return Err(FormatError::BadFieldLength {
            field,
            expected,
            actual,
        });
    }
    Ok(())
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[offset..offset + 4]);
    u32::from_be_bytes(bytes)
}

fn read_u64(data: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_be_bytes(bytes)
}
