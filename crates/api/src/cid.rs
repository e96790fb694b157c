//! Content identifier types.
//!
//! A [ContentId] names one content block by the hash of its payload.
//! Two string forms are accepted: the `b`-prefixed base32 form
//! (version 1) and the legacy `Qm...` base58btc form (version 0).
//! The binary form is what appears inside a content-addressed archive,
//! so the parser also reads identifiers straight out of archive bytes.

use crate::{ScError, ScResult};

/// Multicodec code for a sha2-256 multihash.
pub const MULTIHASH_SHA2_256: u64 = 0x12;

/// Typed failures produced when parsing a content identifier.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CidError {
    /// The string form uses an encoding we do not accept.
    #[error("unsupported content id encoding")]
    UnsupportedEncoding,

    /// The bytes do not form a valid content identifier.
    #[error("malformed content id")]
    Malformed,

    /// The identifier declares a version we do not accept.
    #[error("unsupported content id version {0}")]
    UnsupportedVersion(u64),
}

/// Decode an unsigned LEB128 varint from the front of `buf`.
///
/// Returns the value and the number of bytes consumed, or `None` if
/// the buffer ends mid-varint or the value overflows 64 bits.
pub fn decode_varint(buf: &[u8]) -> Option<(u64, usize)> {
    let mut out: u64 = 0;
    for (i, b) in buf.iter().enumerate() {
        if i >= 9 {
            return None;
        }
        out |= u64::from(b & 0x7f) << (i * 7);
        if b & 0x80 == 0 {
            return Some((out, i + 1));
        }
    }
    None
}

const BASE58_ALPHABET: &[u8] =
    b"123456789ABCDEFGHJKLMNPQRSTUVWXYZabcdefghijkmnopqrstuvwxyz";

fn base58_decode(src: &str) -> Option<Vec<u8>> {
    let mut out: Vec<u8> = Vec::with_capacity(src.len());
    for c in src.bytes() {
        let mut carry =
            BASE58_ALPHABET.iter().position(|a| *a == c)? as u32;
        for byte in out.iter_mut() {
            carry += (*byte as u32) * 58;
            *byte = (carry & 0xff) as u8;
            carry >>= 8;
        }
        while carry > 0 {
            out.push((carry & 0xff) as u8);
            carry >>= 8;
        }
    }
    for c in src.bytes() {
        if c == b'1' {
            out.push(0);
        } else {
            break;
        }
    }
    out.reverse();
    Some(out)
}

fn base58_encode(src: &[u8]) -> String {
    let mut digits: Vec<u8> = Vec::with_capacity(src.len() * 2);
    for byte in src {
        let mut carry = *byte as u32;
        for d in digits.iter_mut() {
            carry += (*d as u32) << 8;
            *d = (carry % 58) as u8;
            carry /= 58;
        }
        while carry > 0 {
            digits.push((carry % 58) as u8);
            carry /= 58;
        }
    }
    let mut out = String::with_capacity(digits.len() + 1);
    for byte in src {
        if *byte == 0 {
            out.push('1');
        } else {
            break;
        }
    }
    for d in digits.iter().rev() {
        out.push(BASE58_ALPHABET[*d as usize] as char);
    }
    out
}

/// A parsed content identifier.
///
/// Equality is defined over the binary form, so identifiers parsed
/// from a string and identifiers read out of archive bytes compare
/// directly.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ContentId {
    version: u64,
    codec: u64,
    multihash_code: u64,
    digest: bytes::Bytes,
    raw: bytes::Bytes,
}

impl ContentId {
    /// Parse a content identifier from its string form.
    pub fn parse(src: &str) -> Result<Self, CidError> {
        if let Some(b32) = src.strip_prefix('b') {
            let upper = b32.to_ascii_uppercase();
            let raw = data_encoding::BASE32_NOPAD
                .decode(upper.as_bytes())
                .map_err(|_| CidError::Malformed)?;
            let (cid, used) = Self::from_bytes(&raw)?;
            if used != raw.len() {
                return Err(CidError::Malformed);
            }
            Ok(cid)
        } else if src.starts_with("Qm") {
            let raw =
                base58_decode(src).ok_or(CidError::Malformed)?;
            let (cid, used) = Self::from_bytes(&raw)?;
            if used != raw.len() {
                return Err(CidError::Malformed);
            }
            Ok(cid)
        } else {
            Err(CidError::UnsupportedEncoding)
        }
    }

    /// Parse a binary content identifier from the front of `buf`.
    ///
    /// Returns the identifier and the number of bytes consumed. A
    /// leading `0x12 0x20` is the version 0 form (a bare sha2-256
    /// multihash); anything else must be a version 1 prefix.
    pub fn from_bytes(buf: &[u8]) -> Result<(Self, usize), CidError> {
        if buf.len() >= 2 && buf[0] == 0x12 && buf[1] == 0x20 {
            if buf.len() < 34 {
                return Err(CidError::Malformed);
            }
            return Ok((
                Self {
                    version: 0,
                    codec: 0x70,
                    multihash_code: MULTIHASH_SHA2_256,
                    digest: bytes::Bytes::copy_from_slice(&buf[2..34]),
                    raw: bytes::Bytes::copy_from_slice(&buf[..34]),
                },
                34,
            ));
        }

        let mut pos = 0;
        let (version, n) =
            decode_varint(&buf[pos..]).ok_or(CidError::Malformed)?;
        pos += n;
        if version != 1 {
            return Err(CidError::UnsupportedVersion(version));
        }
        let (codec, n) =
            decode_varint(&buf[pos..]).ok_or(CidError::Malformed)?;
        pos += n;
        let (multihash_code, n) =
            decode_varint(&buf[pos..]).ok_or(CidError::Malformed)?;
        pos += n;
        let (digest_len, n) =
            decode_varint(&buf[pos..]).ok_or(CidError::Malformed)?;
        pos += n;
        let digest_len = digest_len as usize;
        if buf.len() < pos + digest_len {
            return Err(CidError::Malformed);
        }
        let digest =
            bytes::Bytes::copy_from_slice(&buf[pos..pos + digest_len]);
        pos += digest_len;

        Ok((
            Self {
                version,
                codec,
                multihash_code,
                digest,
                raw: bytes::Bytes::copy_from_slice(&buf[..pos]),
            },
            pos,
        ))
    }

    /// The content identifier version (0 or 1).
    pub fn version(&self) -> u64 {
        self.version
    }

    /// The content codec (e.g. 0x55 for raw blocks).
    pub fn codec(&self) -> u64 {
        self.codec
    }

    /// The multihash algorithm code (e.g. [MULTIHASH_SHA2_256]).
    pub fn multihash_code(&self) -> u64 {
        self.multihash_code
    }

    /// The multihash digest bytes.
    pub fn digest(&self) -> &[u8] {
        &self.digest
    }

    /// The full binary form.
    pub fn as_bytes(&self) -> &[u8] {
        &self.raw
    }
}

impl std::fmt::Display for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.version == 0 {
            f.write_str(&base58_encode(&self.raw))
        } else {
            let enc = data_encoding::BASE32_NOPAD
                .encode(&self.raw)
                .to_ascii_lowercase();
            write!(f, "b{enc}")
        }
    }
}

impl std::fmt::Debug for ContentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl std::str::FromStr for ContentId {
    type Err = ScError;

    fn from_str(src: &str) -> ScResult<Self> {
        Self::parse(src)
            .map_err(|e| ScError::with_src("invalid content id", e))
    }
}
