//! Deterministic task sampling.
//!
//! Every station computes, without coordination, which assignments of
//! a round it must check: hash each assignment together with the
//! round randomness, hash the station id, and take the `quota`
//! assignments whose keys are nearest to the station key under xor
//! distance. The randomness is unknowable before the round is
//! published, so no station can position itself in advance, and any
//! third party can recompute the selection from public data.

use sha2::{Digest, Sha256};
use spotcheck_api::Assignment;

/// A 256-bit sampling key, kept as big-endian bytes.
///
/// Xor distance only ever needs byte-wise operations and big-endian
/// lexicographic comparison, so no big-integer arithmetic is
/// required.
pub type Key = [u8; 32];

/// Derive the key for one assignment within a round.
///
/// The key is the sha2-256 digest of the newline-joined content id,
/// provider id and round randomness.
pub fn task_key(assignment: &Assignment, randomness: &str) -> Key {
    let mut hasher = Sha256::new();
    hasher.update(assignment.content_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(assignment.provider_id.as_bytes());
    hasher.update(b"\n");
    hasher.update(randomness.as_bytes());
    hasher.finalize().into()
}

/// Derive the key for this station. Independent of any round.
pub fn station_key(station_id: &str) -> Key {
    Sha256::digest(station_id.as_bytes()).into()
}

fn xor_distance(a: &Key, b: &Key) -> Key {
    let mut out = [0_u8; 32];
    for (i, o) in out.iter_mut().enumerate() {
        *o = a[i] ^ b[i];
    }
    out
}

/// Select up to `quota` assignments for this station, ordered by
/// ascending xor distance between task key and station key.
///
/// Pure function of its inputs: repeated invocations return the same
/// subset in the same order. The pool is never mutated; ties keep
/// pool order.
pub fn pick_tasks(
    pool: &[Assignment],
    station_id: &str,
    randomness: &str,
    quota: u32,
) -> Vec<Assignment> {
    let station = station_key(station_id);

    let mut ranked: Vec<(Key, &Assignment)> = pool
        .iter()
        .map(|a| (xor_distance(&task_key(a, randomness), &station), a))
        .collect();
    ranked.sort_by(|(da, _), (db, _)| da.cmp(db));

    ranked
        .into_iter()
        .take(quota as usize)
        .map(|(_, a)| a.clone())
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    const RANDOMNESS: &str =
        "fc90e50dcdf20886b56c038b30fa921a5e57c532ea448dadcc209e44eec0445e";

    fn assignment(content_id: &str, provider_id: &str) -> Assignment {
        Assignment {
            content_id: content_id.into(),
            provider_id: provider_id.into(),
        }
    }

    fn pool() -> Vec<Assignment> {
        let mut out = Vec::new();
        for cid in ["bafyone", "bafytwo"] {
            for provider in ["f010", "f020", "f030", "f040"] {
                out.push(assignment(cid, provider));
            }
        }
        out
    }

    #[test]
    fn task_key_fixture() {
        let key = task_key(&assignment("bafyone", "f0123"), RANDOMNESS);
        assert_eq!(
            "2ae8a2e4fa088d331b6983f4d231812316f836ba445bd18bbb8518437568170f",
            hex::encode(key),
        );
    }

    #[test]
    fn station_key_fixture() {
        assert_eq!(
            "3a41a025bba7949e98e57717c22b8731d6248498bc888d59ffe1eb46b16cef84",
            hex::encode(station_key("some-station-id")),
        );
    }

    #[test]
    fn pick_tasks_fixture() {
        let selected =
            pick_tasks(&pool(), "some-station-id", RANDOMNESS, 3);
        assert_eq!(
            vec![
                assignment("bafyone", "f020"),
                assignment("bafyone", "f010"),
                assignment("bafytwo", "f020"),
            ],
            selected,
        );
    }

    #[test]
    fn pick_tasks_is_deterministic() {
        let a = pick_tasks(&pool(), "some-station-id", RANDOMNESS, 3);
        let b = pick_tasks(&pool(), "some-station-id", RANDOMNESS, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn randomness_changes_selection() {
        let a = pick_tasks(&pool(), "some-station-id", RANDOMNESS, 3);
        let b = pick_tasks(
            &pool(),
            "some-station-id",
            "e5a2c04e0e909e5dcd8b2f9f46e51e40d1f20eaf3a9e8c27b2f0a1b9d4c3e2f1",
            3,
        );
        assert_ne!(a, b);
    }

    #[test]
    fn zero_quota_selects_nothing() {
        assert!(pick_tasks(&pool(), "some-station-id", RANDOMNESS, 0)
            .is_empty());
    }

    #[test]
    fn quota_above_pool_selects_all() {
        let selected =
            pick_tasks(&pool(), "some-station-id", RANDOMNESS, 100);
        assert_eq!(pool().len(), selected.len());
        for a in pool() {
            assert!(selected.contains(&a));
        }
    }
}
