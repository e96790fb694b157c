//! Single-block content-addressed archive decoding and verification.
//!
//! A retrieval scoped to one top-level block yields an archive with a
//! varint-framed header followed by one section: a varint section
//! length, the block's binary content id, and the payload bytes. Only
//! that first section is examined; everything past it is ignored.

use sha2::{Digest, Sha256};
use spotcheck_api::cid::{
    decode_varint, ContentId, MULTIHASH_SHA2_256,
};
use spotcheck_api::outcome::OutcomeCode;

/// Typed failures produced when decoding or verifying an archive.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CarError {
    /// The archive envelope cannot be parsed.
    #[error("cannot parse content archive")]
    Malformed,

    /// The block is not the block that was requested.
    #[error("archive block does not match the requested content id")]
    UnexpectedBlock,

    /// The requested content id uses a hash algorithm we have not
    /// implemented.
    #[error("unsupported multihash algorithm {0}")]
    UnsupportedHash(u64),

    /// The payload does not hash to the requested content id.
    #[error("block payload does not match the content id digest")]
    HashMismatch,
}

impl From<&CarError> for OutcomeCode {
    fn from(e: &CarError) -> Self {
        match e {
            CarError::Malformed => OutcomeCode::MalformedCar,
            CarError::UnexpectedBlock => OutcomeCode::UnexpectedBlock,
            CarError::UnsupportedHash(_) => OutcomeCode::UnsupportedHash,
            CarError::HashMismatch => OutcomeCode::HashMismatch,
        }
    }
}

/// The first block of a decoded archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CarBlock {
    /// The content id the archive claims for the block.
    pub content_id: ContentId,

    /// The block payload bytes.
    pub payload: bytes::Bytes,
}

/// Decode the envelope of a single-block archive.
///
/// The header block is treated as opaque: only its framing is
/// validated. Truncation anywhere is [CarError::Malformed].
pub fn decode_first_block(car: &[u8]) -> Result<CarBlock, CarError> {
    let mut pos = 0;

    let (header_len, n) =
        decode_varint(car).ok_or(CarError::Malformed)?;
    pos += n;
    let header_len = header_len as usize;
    if header_len == 0 || car.len() < pos + header_len {
        return Err(CarError::Malformed);
    }
    pos += header_len;

    let (section_len, n) =
        decode_varint(&car[pos..]).ok_or(CarError::Malformed)?;
    pos += n;
    let section_len = section_len as usize;
    if section_len == 0 || car.len() < pos + section_len {
        return Err(CarError::Malformed);
    }
    let section = &car[pos..pos + section_len];

    let (content_id, cid_len) =
        ContentId::from_bytes(section).map_err(|_| CarError::Malformed)?;

    Ok(CarBlock {
        content_id,
        payload: bytes::Bytes::copy_from_slice(&section[cid_len..]),
    })
}

/// Verify that `block` answers a request for `expected`.
///
/// The block's own content id must equal the requested one, and the
/// payload must hash to the digest embedded in it.
pub fn verify_block(
    block: &CarBlock,
    expected: &ContentId,
) -> Result<(), CarError> {
    if block.content_id != *expected {
        return Err(CarError::UnexpectedBlock);
    }

    if expected.multihash_code() != MULTIHASH_SHA2_256 {
        return Err(CarError::UnsupportedHash(expected.multihash_code()));
    }

    let digest = Sha256::digest(&block.payload);
    if digest.as_slice() != expected.digest() {
        return Err(CarError::HashMismatch);
    }

    Ok(())
}

/// Hex multihash-prefixed sha2-256 digest of an entire fetched byte
/// stream, as reported in the `carChecksum` measurement field.
pub fn stream_checksum(car: &[u8]) -> String {
    let digest = Sha256::digest(car);
    let mut out = vec![MULTIHASH_SHA2_256 as u8, digest.len() as u8];
    out.extend_from_slice(&digest);
    hex::encode(out)
}
