//! The retrieval check engine.
//!
//! One call to [CheckEngine::check] runs the full staged pipeline for
//! a single assignment: resolve the provider's peer id, ask the index
//! what it advertises, dial the advertised endpoint, and verify the
//! bytes that come back. Nothing is thrown across the check boundary;
//! every failure mode collapses into fields of the returned
//! [OutcomeRecord].

use futures::StreamExt;
use sha2::{Digest, Sha256};
use spotcheck_api::cid::{ContentId, MULTIHASH_SHA2_256};
use spotcheck_api::identity::DynIdentityResolver;
use spotcheck_api::index::DynIndexClient;
use spotcheck_api::outcome::{
    IndexerResult, OutcomeCode, OutcomeRecord, Protocol,
};
use spotcheck_api::transport::{DynBlockTransport, TransportError};
use spotcheck_api::{Assignment, Timestamp};

use crate::car::{decode_first_block, verify_block};
use crate::config::CheckerConfig;
use crate::multiaddr::multiaddr_to_http_url;

fn transport_outcome(
    err: TransportError,
    record: &mut OutcomeRecord,
) -> OutcomeCode {
    match err {
        TransportError::Dns => OutcomeCode::DnsFailure,
        TransportError::ConnectionRefused => {
            OutcomeCode::ConnectionRefused
        }
        TransportError::Timeout => {
            record.timeout = true;
            OutcomeCode::NoHttpResponse
        }
        TransportError::Other(msg) => {
            tracing::debug!(%msg, "unclassified transport failure");
            record.timeout = true;
            OutcomeCode::NoHttpResponse
        }
    }
}

/// The retrieval check pipeline.
#[derive(Debug)]
pub struct CheckEngine {
    identity: DynIdentityResolver,
    index: DynIndexClient,
    http: DynBlockTransport,
    graphsync: DynBlockTransport,
    max_car_size: u64,
}

impl CheckEngine {
    /// Construct a [CheckEngine] over the given collaborators.
    pub fn new(
        config: &CheckerConfig,
        identity: DynIdentityResolver,
        index: DynIndexClient,
        http: DynBlockTransport,
        graphsync: DynBlockTransport,
    ) -> Self {
        Self {
            identity,
            index,
            http,
            graphsync,
            max_car_size: config.max_car_size_bytes,
        }
    }

    /// Run one retrieval check, start to finish.
    pub async fn check(&self, assignment: &Assignment) -> OutcomeRecord {
        let mut record = OutcomeRecord::new();

        let peer_id = match self
            .identity
            .resolve(&assignment.provider_id)
            .await
        {
            Ok(peer_id) => peer_id,
            Err(err) => {
                tracing::warn!(
                    ?err,
                    provider_id = %assignment.provider_id,
                    "cannot resolve the provider's peer id"
                );
                record.indexer_result = Some(IndexerResult::ErrorFetch);
                return record;
            }
        };

        let query = self
            .index
            .lookup(&assignment.content_id, &peer_id)
            .await;
        record.indexer_result = Some(query.indexer_result);
        let Some(provider) = query.provider else {
            return record;
        };
        record.protocol = Some(provider.protocol);
        record.provider_address = Some(provider.address.clone());

        // the probe is informational and only meaningful against the
        // provider's own http endpoint
        if provider.protocol == Protocol::Http {
            self.probe(
                &provider.address,
                &assignment.content_id,
                &mut record,
            )
            .await;
        }

        self.fetch(
            provider.protocol,
            &provider.address,
            &assignment.content_id,
            &mut record,
        )
        .await;

        record
    }

    async fn probe(
        &self,
        address: &str,
        content_id: &str,
        record: &mut OutcomeRecord,
    ) {
        let Ok(url) = multiaddr_to_http_url(address) else {
            // the fetch stage records the address failure
            return;
        };
        record.head_status_code =
            Some(match self.http.probe_block(&url, content_id).await {
                Ok(status) => status,
                // no response at all gets the same sentinel the fetch
                // path uses
                Err(_) => 600,
            });
    }

    async fn fetch(
        &self,
        protocol: Protocol,
        address: &str,
        content_id: &str,
        record: &mut OutcomeRecord,
    ) {
        let (transport, dial) = match protocol {
            Protocol::Http => match multiaddr_to_http_url(address) {
                Ok(url) => (&self.http, url),
                Err(err) => {
                    record.status_code = Some((&err).into());
                    return;
                }
            },
            Protocol::Graphsync => {
                (&self.graphsync, address.to_string())
            }
        };

        record.start_at = Some(Timestamp::now());
        let code = self
            .fetch_and_verify(transport, &dial, content_id, record)
            .await;
        record.end_at = Some(Timestamp::now());
        record.status_code = Some(code);
    }

    async fn fetch_and_verify(
        &self,
        transport: &DynBlockTransport,
        dial: &str,
        content_id: &str,
        record: &mut OutcomeRecord,
    ) -> OutcomeCode {
        let resp = match transport.fetch_block(dial, content_id).await {
            Ok(resp) => resp,
            Err(err) => return transport_outcome(err, record),
        };
        if resp.status != 200 {
            return OutcomeCode::Http(resp.status);
        }

        let mut hasher = Sha256::new();
        let mut body = Vec::new();
        let mut stream = resp.body;
        while let Some(chunk) = stream.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => return transport_outcome(err, record),
            };
            if record.first_byte_at.is_none() {
                record.first_byte_at = Some(Timestamp::now());
            }
            record.byte_length += chunk.len() as u64;
            if record.byte_length > self.max_car_size {
                tracing::warn!(
                    byte_length = record.byte_length,
                    "aborting fetch, response exceeds the size cap"
                );
                record.car_too_large = true;
                return OutcomeCode::Http(200);
            }
            hasher.update(&chunk);
            body.extend_from_slice(&chunk);
        }

        let digest = hasher.finalize();
        let mut sum = vec![MULTIHASH_SHA2_256 as u8, digest.len() as u8];
        sum.extend_from_slice(&digest);
        record.car_checksum = Some(hex::encode(sum));

        let block = match decode_first_block(&body) {
            Ok(block) => block,
            Err(err) => return (&err).into(),
        };
        let expected = match ContentId::parse(content_id) {
            Ok(expected) => expected,
            // an unparseable request cid cannot match any block
            Err(_) => return OutcomeCode::UnexpectedBlock,
        };
        match verify_block(&block, &expected) {
            Ok(()) => OutcomeCode::Http(200),
            Err(err) => (&err).into(),
        }
    }
}
