//! Shared helpers for the test modules.

use sha2::{Digest, Sha256};
use spotcheck_api::cid::ContentId;

fn varint(mut value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            break;
        }
        out.push(byte | 0x80);
    }
    out
}

/// Build a syntactically valid single-block archive around `payload`,
/// returning the raw-codec v1 content id (string form) and the
/// archive bytes.
///
/// Assembled independently of the production decoder: varints and the
/// binary content id are written out by hand here.
pub fn build_single_block_car(payload: &[u8]) -> (String, Vec<u8>) {
    // binary v1 content id: version, raw codec, sha2-256 multihash
    let digest = Sha256::digest(payload);
    let mut cid_bytes = vec![0x01, 0x55, 0x12, 0x20];
    cid_bytes.extend_from_slice(&digest);

    let (cid, _) = ContentId::from_bytes(&cid_bytes).unwrap();

    // the header is opaque to the decoder; any non-empty body works
    let header = b"{\"version\":1}";

    let mut car = Vec::new();
    car.extend_from_slice(&varint(header.len() as u64));
    car.extend_from_slice(header);
    car.extend_from_slice(&varint(
        (cid_bytes.len() + payload.len()) as u64,
    ));
    car.extend_from_slice(&cid_bytes);
    car.extend_from_slice(payload);

    (cid.to_string(), car)
}
