//! Check assignment and round types.

/// One retrieval check to perform: fetch this content from this
/// storage provider and verify what comes back.
///
/// Equality is by value; the same pair may legitimately appear in
/// more than one round.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    /// The content identifier to fetch, in string form.
    pub content_id: String,

    /// The storage provider expected to serve it, e.g. `f0142637`.
    pub provider_id: String,
}

/// A published round: a time-boxed batch of assignments with a
/// per-node quota. Immutable once fetched.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Round {
    /// Round identity assigned by the round server.
    pub round_id: String,

    /// Chain epoch at which the round started.
    pub start_epoch: i64,

    /// How many assignments each node should check this round.
    pub task_quota_per_node: u32,

    /// The full assignment pool, in publication order.
    pub assignments: Vec<Assignment>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_wire_format() {
        let round: Round = serde_json::from_str(
            r#"{
              "roundId": "123",
              "startEpoch": 4111111,
              "taskQuotaPerNode": 2,
              "assignments": [
                { "contentId": "bafyone", "providerId": "f010" }
              ]
            }"#,
        )
        .unwrap();

        assert_eq!("123", round.round_id);
        assert_eq!(4111111, round.start_epoch);
        assert_eq!(2, round.task_quota_per_node);
        assert_eq!(
            vec![Assignment {
                content_id: "bafyone".into(),
                provider_id: "f010".into(),
            }],
            round.assignments,
        );
    }
}
