//! Retrieval index lookup types.

use crate::outcome::{IndexerResult, Protocol};
use crate::BoxFut;
use std::sync::Arc;

/// One retrieval advertisement returned by the index.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalProvider {
    /// The advertising peer id.
    pub provider_id: String,

    /// The dialable address, in the protocol's own format.
    pub address: String,

    /// The advertised retrieval protocol.
    pub protocol: Protocol,

    /// The advertisement context id.
    pub context_id: String,
}

/// The outcome of an index lookup: the verdict that will be reported,
/// plus the provider to retrieve from when one qualifies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexQuery {
    /// The verdict to report with the measurement.
    pub indexer_result: IndexerResult,

    /// The advertisement to retrieve from, if any qualified.
    pub provider: Option<RetrievalProvider>,
}

/// Trait for implementing a retrieval index client.
///
/// Lookup never fails at this boundary: index errors are part of the
/// verdict ([IndexerResult::ErrorFetch] / [IndexerResult::Error]).
pub trait IndexClient: 'static + Send + Sync + std::fmt::Debug {
    /// Look up which providers advertise `content_id`, filtered to
    /// the provider identified by `peer_id`.
    fn lookup(
        &self,
        content_id: &str,
        peer_id: &str,
    ) -> BoxFut<'_, IndexQuery>;
}

/// Trait-object [IndexClient].
pub type DynIndexClient = Arc<dyn IndexClient>;
