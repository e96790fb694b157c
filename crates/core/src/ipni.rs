//! Retrieval index client.
//!
//! The index is queried once per check to learn whether, and over
//! which protocol, the assigned provider advertises the assigned
//! content. The lookup verdict is reported with the measurement even
//! when no retrieval follows.

use backon::{ExponentialBuilder, Retryable};
use base64::Engine;
use spotcheck_api::cid::decode_varint;
use spotcheck_api::index::{IndexClient, IndexQuery, RetrievalProvider};
use spotcheck_api::outcome::{IndexerResult, Protocol};
use spotcheck_api::BoxFut;

use crate::config::CheckerConfig;

#[derive(Debug, thiserror::Error)]
enum QueryError {
    #[error("index responded with status {0}")]
    Status(u16),

    #[error("index query failed: {0}")]
    Other(String),
}

#[derive(Debug, serde::Deserialize)]
struct LookupResponse {
    #[serde(rename = "MultihashResults", default)]
    multihash_results: Vec<MultihashResult>,
}

#[derive(Debug, serde::Deserialize)]
struct MultihashResult {
    #[serde(rename = "ProviderResults", default)]
    provider_results: Vec<ProviderResult>,
}

#[derive(Debug, serde::Deserialize)]
struct ProviderResult {
    #[serde(rename = "ContextID")]
    context_id: String,

    /// Base64, leading varint identifies the transfer protocol.
    #[serde(rename = "Metadata")]
    metadata: String,

    #[serde(rename = "Provider")]
    provider: ProviderInfo,
}

#[derive(Debug, serde::Deserialize)]
struct ProviderInfo {
    #[serde(rename = "ID")]
    id: String,

    #[serde(rename = "Addrs", default)]
    addrs: Vec<String>,
}

fn protocol_from_metadata(metadata: &str) -> Option<Protocol> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(metadata)
        .ok()?;
    let (code, _) = decode_varint(&bytes)?;
    match code {
        0x910 | 4128768 => Some(Protocol::Graphsync),
        0x920 => Some(Protocol::Http),
        // 0x900 is bitswap, which checks never exercise
        _ => None,
    }
}

/// Pick the advertisement to retrieve from.
///
/// Only advertisements from the assigned provider qualify. An http
/// advertisement wins outright; otherwise the first graphsync
/// advertisement is kept as a fallback.
fn select_provider(
    results: Vec<ProviderResult>,
    peer_id: &str,
) -> IndexQuery {
    let mut graphsync = None;

    for r in results {
        let Some(protocol) = protocol_from_metadata(&r.metadata) else {
            continue;
        };
        let Some(address) = r.provider.addrs.first() else {
            continue;
        };
        if r.provider.id != peer_id {
            continue;
        }

        let address = match protocol {
            Protocol::Http => address.clone(),
            Protocol::Graphsync => {
                format!("{address}/p2p/{}", r.provider.id)
            }
        };
        let provider = RetrievalProvider {
            provider_id: r.provider.id,
            address,
            protocol,
            context_id: r.context_id,
        };

        match protocol {
            Protocol::Http => {
                return IndexQuery {
                    indexer_result: IndexerResult::Ok,
                    provider: Some(provider),
                };
            }
            Protocol::Graphsync => {
                if graphsync.is_none() {
                    graphsync = Some(provider);
                }
            }
        }
    }

    match graphsync {
        Some(provider) => {
            tracing::debug!(
                "http is not advertised, falling back to graphsync"
            );
            IndexQuery {
                indexer_result: IndexerResult::HttpNotAdvertised,
                provider: Some(provider),
            }
        }
        None => IndexQuery {
            indexer_result: IndexerResult::NoValidAdvertisement,
            provider: None,
        },
    }
}

/// An [IndexClient] backed by an IPNI-compatible http index.
#[derive(Debug)]
pub struct IpniClient {
    indexer_base_url: String,
    agent: ureq::Agent,
}

impl IpniClient {
    /// Construct an [IpniClient] against the configured index.
    pub fn new(config: &CheckerConfig) -> Self {
        Self {
            indexer_base_url: config
                .indexer_base_url
                .trim_end_matches('/')
                .to_string(),
            agent: ureq::AgentBuilder::new()
                .timeout(config.request_timeout())
                .build(),
        }
    }

    async fn query(
        &self,
        content_id: &str,
    ) -> Result<Vec<ProviderResult>, QueryError> {
        let url =
            format!("{}/cid/{content_id}", self.indexer_base_url);
        let agent = self.agent.clone();

        let body = tokio::task::spawn_blocking(move || {
            match agent.get(&url).call() {
                Ok(resp) => resp
                    .into_string()
                    .map_err(|e| QueryError::Other(e.to_string())),
                Err(ureq::Error::Status(code, _)) => {
                    Err(QueryError::Status(code))
                }
                Err(err) => Err(QueryError::Other(err.to_string())),
            }
        })
        .await
        .map_err(|_| QueryError::Other("task join error".into()))??;

        let parsed: LookupResponse = serde_json::from_str(&body)
            .map_err(|e| QueryError::Other(e.to_string()))?;
        Ok(parsed
            .multihash_results
            .into_iter()
            .flat_map(|r| r.provider_results)
            .collect())
    }
}

impl IndexClient for IpniClient {
    fn lookup(
        &self,
        content_id: &str,
        peer_id: &str,
    ) -> BoxFut<'_, IndexQuery> {
        let content_id = content_id.to_string();
        let peer_id = peer_id.to_string();
        Box::pin(async move {
            let results = (|| self.query(&content_id))
                .retry(ExponentialBuilder::default().with_max_times(5))
                // only server-side failures are worth retrying
                .when(|err| {
                    matches!(err, QueryError::Status(c) if *c >= 500)
                })
                .notify(|err, wait| {
                    tracing::warn!(
                        ?err,
                        ?wait,
                        "index query failed, retrying"
                    );
                })
                .await;

            match results {
                Ok(results) => {
                    tracing::debug!(
                        count = results.len(),
                        "index returned provider results"
                    );
                    select_provider(results, &peer_id)
                }
                Err(QueryError::Status(code)) => IndexQuery {
                    indexer_result: IndexerResult::Error(code),
                    provider: None,
                },
                Err(err) => {
                    tracing::warn!(?err, "index query failed");
                    IndexQuery {
                        indexer_result: IndexerResult::ErrorFetch,
                        provider: None,
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn metadata(varint_bytes: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(varint_bytes)
    }

    fn result(
        peer_id: &str,
        addr: &str,
        varint_bytes: &[u8],
    ) -> ProviderResult {
        ProviderResult {
            context_id: "ctx".into(),
            metadata: metadata(varint_bytes),
            provider: ProviderInfo {
                id: peer_id.into(),
                addrs: vec![addr.into()],
            },
        }
    }

    const HTTP: &[u8] = &[0xa0, 0x12];
    const GRAPHSYNC: &[u8] = &[0x90, 0x12];
    const GRAPHSYNC_LEGACY: &[u8] = &[0x80, 0x80, 0xfc, 0x01];
    const BITSWAP: &[u8] = &[0x80, 0x12];

    #[test]
    fn protocol_decoding() {
        assert_eq!(
            Some(Protocol::Http),
            protocol_from_metadata(&metadata(HTTP)),
        );
        assert_eq!(
            Some(Protocol::Graphsync),
            protocol_from_metadata(&metadata(GRAPHSYNC)),
        );
        assert_eq!(
            Some(Protocol::Graphsync),
            protocol_from_metadata(&metadata(GRAPHSYNC_LEGACY)),
        );
        assert_eq!(None, protocol_from_metadata(&metadata(BITSWAP)));
        assert_eq!(None, protocol_from_metadata("not base64!"));
    }

    #[test]
    fn http_advertisement_wins() {
        let q = select_provider(
            vec![
                result("peer-a", "/dns/a.example/tcp/1/http", GRAPHSYNC),
                result("peer-a", "/dns/a.example/tcp/2/http", HTTP),
            ],
            "peer-a",
        );
        assert_eq!(IndexerResult::Ok, q.indexer_result);
        let p = q.provider.unwrap();
        assert_eq!(Protocol::Http, p.protocol);
        // http addresses are passed through untouched
        assert_eq!("/dns/a.example/tcp/2/http", p.address);
    }

    #[test]
    fn graphsync_fallback_appends_the_peer_id() {
        let q = select_provider(
            vec![result(
                "peer-a",
                "/ip4/93.184.216.34/tcp/1234",
                GRAPHSYNC,
            )],
            "peer-a",
        );
        assert_eq!(IndexerResult::HttpNotAdvertised, q.indexer_result);
        assert_eq!(
            "/ip4/93.184.216.34/tcp/1234/p2p/peer-a",
            q.provider.unwrap().address,
        );
    }

    #[test]
    fn other_peers_do_not_qualify() {
        let q = select_provider(
            vec![result("peer-b", "/dns/b.example/tcp/1/http", HTTP)],
            "peer-a",
        );
        assert_eq!(
            IndexerResult::NoValidAdvertisement,
            q.indexer_result,
        );
        assert!(q.provider.is_none());
    }

    #[test]
    fn unsupported_protocols_and_empty_addrs_are_skipped() {
        let mut no_addr =
            result("peer-a", "/dns/a.example/tcp/1/http", HTTP);
        no_addr.provider.addrs.clear();

        let q = select_provider(
            vec![
                result("peer-a", "/dns/a.example/tcp/1", BITSWAP),
                no_addr,
            ],
            "peer-a",
        );
        assert_eq!(
            IndexerResult::NoValidAdvertisement,
            q.indexer_result,
        );
    }
}
