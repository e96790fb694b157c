//! Block transport types.
//!
//! A transport turns a dialable provider address plus a content id
//! into a stream of body bytes. There is one implementation per
//! retrieval protocol; the retrieval engine picks the implementation
//! from the advertised [Protocol](crate::outcome::Protocol) and never
//! branches on protocol strings itself.

use crate::BoxFut;
use std::sync::Arc;

/// Typed failures a transport can produce before or during a fetch.
///
/// These are the only transport failures the outcome taxonomy
/// distinguishes; anything else is carried as [TransportError::Other].
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// DNS resolution of the provider host failed.
    #[error("dns resolution failed")]
    Dns,

    /// The provider refused the TCP connection.
    #[error("connection refused")]
    ConnectionRefused,

    /// The operation exceeded its timeout.
    #[error("request timed out")]
    Timeout,

    /// Any other network-level failure.
    #[error("transport failure: {0}")]
    Other(Arc<str>),
}

impl TransportError {
    /// Construct an [TransportError::Other] from a display value.
    pub fn other<C: std::fmt::Display>(ctx: C) -> Self {
        Self::Other(ctx.to_string().into_boxed_str().into())
    }
}

/// A stream of body bytes produced by a transport fetch.
pub type BytesStream = std::pin::Pin<
    Box<
        dyn futures::Stream<Item = Result<bytes::Bytes, TransportError>>
            + Send,
    >,
>;

/// The response to a block fetch: the upstream status plus the body
/// byte stream. The stream yields chunks as they arrive so the caller
/// can record time-to-first-byte and enforce its own size cap.
pub struct BlockResponse {
    /// The upstream HTTP status code.
    pub status: u16,

    /// The body bytes.
    pub body: BytesStream,
}

impl std::fmt::Debug for BlockResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockResponse")
            .field("status", &self.status)
            .finish()
    }
}

/// Trait for implementing a block transport.
///
/// The `address` argument is in the transport's own dialable format:
/// a resolved `http(s)://` URL for plain HTTP, a provider multiaddr
/// for delegated transports.
pub trait BlockTransport: 'static + Send + Sync + std::fmt::Debug {
    /// Fetch the single top-level block for `content_id` from
    /// `address`.
    fn fetch_block(
        &self,
        address: &str,
        content_id: &str,
    ) -> BoxFut<'_, Result<BlockResponse, TransportError>>;

    /// Issue a lightweight HEAD probe for `content_id` at `address`,
    /// returning the upstream status code.
    fn probe_block(
        &self,
        address: &str,
        content_id: &str,
    ) -> BoxFut<'_, Result<u16, TransportError>>;
}

/// Trait-object [BlockTransport].
pub type DynBlockTransport = Arc<dyn BlockTransport>;
