//! Delegated graphsync block transport.
//!
//! Graphsync is not spoken in-process. Fetches are delegated to an
//! external fetcher daemon that exposes the same trustless gateway
//! surface as a provider's http endpoint, with the target provider
//! named in the query string.

use spotcheck_api::transport::{
    BlockResponse, BlockTransport, TransportError,
};
use spotcheck_api::BoxFut;

use crate::config::CheckerConfig;
use crate::http_transport::stream_get;

fn encode_component(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for byte in raw.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_'
            | b'.' | b'~' => out.push(byte as char),
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

/// A [BlockTransport] that hands fetches to the external graphsync
/// fetcher daemon.
///
/// The address argument is the provider's multiaddr, peer id suffix
/// included, which the daemon dials on our behalf.
#[derive(Debug)]
pub struct GraphsyncTransport {
    fetcher_base_url: String,
    agent: ureq::Agent,
}

impl GraphsyncTransport {
    /// Construct a [GraphsyncTransport] against the configured
    /// fetcher daemon.
    pub fn new(config: &CheckerConfig) -> Self {
        Self {
            fetcher_base_url: config
                .block_fetcher_url
                .trim_end_matches('/')
                .to_string(),
            agent: ureq::AgentBuilder::new()
                .timeout(config.request_timeout())
                .build(),
        }
    }

    fn block_url(&self, address: &str, content_id: &str) -> String {
        format!(
            "{}/ipfs/{content_id}?dag-scope=block&protocols=graphsync&providers={}",
            self.fetcher_base_url,
            encode_component(address),
        )
    }
}

impl BlockTransport for GraphsyncTransport {
    fn fetch_block(
        &self,
        address: &str,
        content_id: &str,
    ) -> BoxFut<'_, Result<BlockResponse, TransportError>> {
        let url = self.block_url(address, content_id);
        let agent = self.agent.clone();
        Box::pin(stream_get(agent, url))
    }

    fn probe_block(
        &self,
        _address: &str,
        _content_id: &str,
    ) -> BoxFut<'_, Result<u16, TransportError>> {
        // the fetcher daemon does not answer HEAD, and probes are
        // only meaningful against a provider's own http endpoint
        Box::pin(async move {
            Err(TransportError::other(
                "head probes are not supported over graphsync",
            ))
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn block_url_format() {
        let t = GraphsyncTransport::new(&CheckerConfig {
            block_fetcher_url: "http://127.0.0.1:62156/".into(),
            ..Default::default()
        });
        assert_eq!(
            "http://127.0.0.1:62156/ipfs/bafyone?dag-scope=block\
             &protocols=graphsync\
             &providers=%2Fip4%2F93.184.216.34%2Ftcp%2F1234%2Fp2p%2F12D3KooWPeer",
            t.block_url("/ip4/93.184.216.34/tcp/1234/p2p/12D3KooWPeer", "bafyone"),
        );
    }

    #[test]
    fn component_encoding_keeps_unreserved_bytes() {
        assert_eq!("abc-XYZ_0.9~", encode_component("abc-XYZ_0.9~"));
        assert_eq!("a%2Fb%20c%25", encode_component("a/b c%"));
    }
}
