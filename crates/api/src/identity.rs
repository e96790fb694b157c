//! Provider identity resolution types.

use crate::{BoxFut, ScResult};
use std::sync::Arc;

/// One source of truth for mapping a storage provider id to the peer
/// id it publishes retrieval advertisements under.
///
/// A source returning `Ok(None)` answered authoritatively that it has
/// no mapping; that is distinct from the source failing.
pub trait PeerIdSource: 'static + Send + Sync + std::fmt::Debug {
    /// Look up the peer id for `provider_id`, e.g. `f0142637`.
    fn lookup(
        &self,
        provider_id: &str,
    ) -> BoxFut<'_, ScResult<Option<String>>>;
}

/// Trait-object [PeerIdSource].
pub type DynPeerIdSource = Arc<dyn PeerIdSource>;

/// Trait for resolving a provider's peer id across sources.
pub trait IdentityResolver: 'static + Send + Sync + std::fmt::Debug {
    /// Resolve the peer id for `provider_id`. Fails only when every
    /// source failed or answered empty.
    fn resolve(&self, provider_id: &str) -> BoxFut<'_, ScResult<String>>;
}

/// Trait-object [IdentityResolver].
pub type DynIdentityResolver = Arc<dyn IdentityResolver>;
