//! Per-round retrieval counters.

use std::collections::HashSet;
use std::sync::Mutex;

use spotcheck_api::metrics::{MetricsSnapshot, RetrievalMetrics};

#[derive(Debug, Default)]
struct Inner {
    round_index: u64,
    total: u64,
    failed: u64,
    unique_pairs: HashSet<(String, String)>,
}

/// The standard [RetrievalMetrics] implementation.
///
/// Plain counters behind a mutex; the worker loop is serial, so there
/// is never contention worth measuring.
#[derive(Debug, Default)]
pub struct RoundMetrics {
    inner: Mutex<Inner>,
}

impl RoundMetrics {
    /// Construct a zeroed [RoundMetrics].
    pub fn new() -> Self {
        Self::default()
    }
}

impl RetrievalMetrics for RoundMetrics {
    fn record_attempt(&self, content_id: &str, provider_id: &str) {
        let mut inner = self.inner.lock().expect("poisoned");
        inner.total += 1;
        inner
            .unique_pairs
            .insert((content_id.to_string(), provider_id.to_string()));
    }

    fn record_failure(&self) {
        self.inner.lock().expect("poisoned").failed += 1;
    }

    fn reset(&self) {
        let mut inner = self.inner.lock().expect("poisoned");
        inner.total = 0;
        inner.failed = 0;
        inner.unique_pairs.clear();
        inner.round_index += 1;
    }

    fn report(&self) {
        let s = self.snapshot();
        tracing::info!(
            round = s.round_index,
            attempted = s.total,
            failed = s.failed,
            unique_pairs = s.unique_pair_count,
            "round retrieval metrics"
        );
    }

    fn snapshot(&self) -> MetricsSnapshot {
        let inner = self.inner.lock().expect("poisoned");
        MetricsSnapshot {
            round_index: inner.round_index,
            total: inner.total,
            failed: inner.failed,
            unique_pair_count: inner.unique_pairs.len() as u64,
        }
    }
}
