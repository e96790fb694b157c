//! Per-round retrieval metrics types.

use std::sync::Arc;

/// A snapshot of the counters for one round.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MetricsSnapshot {
    /// How many rounds this process has started.
    pub round_index: u64,

    /// Retrieval checks attempted this round.
    pub total: u64,

    /// Retrieval checks that did not verify this round.
    pub failed: u64,

    /// Distinct (content id, provider id) pairs attempted this round.
    pub unique_pair_count: u64,
}

/// Trait for the per-round retrieval counters.
///
/// The worker loop owns exactly one instance and resets it at round
/// boundaries; implementations must tolerate fire-and-forget call
/// sites and never fail.
pub trait RetrievalMetrics: 'static + Send + Sync + std::fmt::Debug {
    /// Register one retrieval attempt.
    fn record_attempt(&self, content_id: &str, provider_id: &str);

    /// Register one failed retrieval. Called separately from
    /// [RetrievalMetrics::record_attempt].
    fn record_failure(&self);

    /// Clear the counters for a new round.
    fn reset(&self);

    /// Log the counters for the current round.
    fn report(&self);

    /// Get a snapshot of the current counters.
    fn snapshot(&self) -> MetricsSnapshot;
}

/// Trait-object [RetrievalMetrics].
pub type DynRetrievalMetrics = Arc<dyn RetrievalMetrics>;
