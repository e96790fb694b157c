//! Round discovery types.

use crate::{BoxFut, Round, ScResult};
use std::sync::Arc;

/// Trait for obtaining the current round from the round server.
///
/// Discovery is a two-step protocol and the steps are deliberately
/// separate operations: the discovery request must not auto-follow
/// redirects, because the redirect target is what commits the round
/// randomness. The caller samples its task subset from the resolved
/// location, then fetches the round body from it.
pub trait RoundClient: 'static + Send + Sync + std::fmt::Debug {
    /// Ask the round server for the current round, returning the
    /// resolved round location from the redirect. The location string
    /// doubles as the round's sampling randomness: it is unknowable
    /// before the round is published.
    fn discover(&self) -> BoxFut<'_, ScResult<String>>;

    /// Fetch the round body from a previously discovered location.
    fn fetch_round(&self, location: &str) -> BoxFut<'_, ScResult<Round>>;
}

/// Trait-object [RoundClient].
pub type DynRoundClient = Arc<dyn RoundClient>;
