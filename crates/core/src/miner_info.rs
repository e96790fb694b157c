//! Provider identity resolution.
//!
//! A provider id such as `f0142637` names an on-chain actor; the
//! index knows providers by the peer id they advertise under. Two
//! sources can answer the mapping: the chain state itself, and a
//! registry contract that providers can update without waiting for
//! chain state. Both are consulted concurrently and the contract
//! answer wins when it is non-empty.

use std::sync::Arc;
use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use sha3::{Digest, Keccak256};
use spotcheck_api::identity::{
    DynPeerIdSource, IdentityResolver, PeerIdSource,
};
use spotcheck_api::{BoxFut, ScError, ScResult};

use crate::config::CheckerConfig;

fn rpc_retry() -> ExponentialBuilder {
    // five attempts in total
    ExponentialBuilder::default()
        .with_min_delay(Duration::from_secs(5))
        .with_factor(1.5)
        .with_max_times(4)
}

/// Shared JSON-RPC plumbing for both sources.
#[derive(Debug, Clone)]
struct RpcClient {
    rpc_url: Arc<str>,
    auth_token: Option<Arc<str>>,
    agent: ureq::Agent,
}

impl RpcClient {
    fn new(config: &CheckerConfig) -> Self {
        Self {
            rpc_url: config.rpc_url.as_str().into(),
            auth_token: config
                .rpc_auth_token
                .as_deref()
                .map(Into::into),
            agent: ureq::AgentBuilder::new()
                .timeout(config.request_timeout())
                .build(),
        }
    }

    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> ScResult<serde_json::Value> {
        let payload = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        })
        .to_string();

        let this = self.clone();
        let body = tokio::task::spawn_blocking(move || {
            let mut req = this
                .agent
                .post(&this.rpc_url)
                .set("Content-Type", "application/json")
                .set("Accept", "application/json");
            if let Some(token) = &this.auth_token {
                req = req.set(
                    "Authorization",
                    &format!("Bearer {token}"),
                );
            }
            req.send_string(&payload)
                .map_err(ScError::new)?
                .into_string()
                .map_err(ScError::new)
        })
        .await
        .map_err(|_| ScError::new("task join error"))??;

        let resp: serde_json::Value =
            serde_json::from_str(&body).map_err(ScError::new)?;
        if let Some(err) = resp.get("error") {
            return Err(ScError::new(format!(
                "rpc {method} failed: {err}"
            )));
        }
        Ok(resp
            .get("result")
            .cloned()
            .unwrap_or(serde_json::Value::Null))
    }
}

/// A [PeerIdSource] backed by the chain's own miner state.
///
/// Two chained lookups: the current chain head, then the miner info
/// at that head. Each is retried independently.
#[derive(Debug)]
pub struct ChainMinerInfoSource {
    rpc: RpcClient,
}

impl ChainMinerInfoSource {
    /// Construct a [ChainMinerInfoSource] against the configured rpc
    /// endpoint.
    pub fn new(config: &CheckerConfig) -> Self {
        Self {
            rpc: RpcClient::new(config),
        }
    }

    async fn chain_head(&self) -> ScResult<serde_json::Value> {
        let head = (|| {
            self.rpc.call("Filecoin.ChainHead", serde_json::json!([]))
        })
        .retry(rpc_retry())
        .notify(|err, wait| {
            tracing::warn!(?err, ?wait, "chain head query failed");
        })
        .await
        .map_err(|err| {
            ScError::new(format!("cannot obtain chain head: {err}"))
        })?;

        head.get("Cids")
            .cloned()
            .ok_or_else(|| ScError::new("chain head carried no cids"))
    }
}

impl PeerIdSource for ChainMinerInfoSource {
    fn lookup(
        &self,
        provider_id: &str,
    ) -> BoxFut<'_, ScResult<Option<String>>> {
        let provider_id = provider_id.to_string();
        Box::pin(async move {
            let head = self.chain_head().await?;

            let info = (|| {
                self.rpc.call(
                    "Filecoin.StateMinerInfo",
                    serde_json::json!([provider_id, head]),
                )
            })
            .retry(rpc_retry())
            .notify(|err, wait| {
                tracing::warn!(?err, ?wait, "miner info query failed");
            })
            .await
            .map_err(|err| {
                ScError::new(format!(
                    "cannot obtain miner info for {provider_id}: {err}"
                ))
            })?;

            Ok(info
                .get("PeerId")
                .and_then(|v| v.as_str())
                .map(str::to_string))
        })
    }
}

/// The registry contract address is part of the node configuration;
/// see [CheckerConfig::registry_contract_address].
#[derive(Debug)]
pub struct ContractPeerIdSource {
    rpc: RpcClient,
    contract_address: String,
}

/// Four-byte call selector for `getPeerData(uint64)`.
fn get_peer_data_selector() -> [u8; 4] {
    let digest = Keccak256::digest(b"getPeerData(uint64)");
    [digest[0], digest[1], digest[2], digest[3]]
}

/// ABI-encode the `getPeerData(uint64)` call.
fn encode_get_peer_data(numeric_id: u64) -> String {
    let mut data = get_peer_data_selector().to_vec();
    let mut arg = [0_u8; 32];
    arg[24..].copy_from_slice(&numeric_id.to_be_bytes());
    data.extend_from_slice(&arg);
    format!("0x{}", hex::encode(data))
}

fn abi_word(data: &[u8], offset: usize) -> ScResult<usize> {
    let word = data
        .get(offset..offset + 32)
        .ok_or_else(|| ScError::new("truncated contract response"))?;
    if word[..24].iter().any(|b| *b != 0) {
        return Err(ScError::new("oversized abi word"));
    }
    let mut out = [0_u8; 8];
    out.copy_from_slice(&word[24..]);
    Ok(u64::from_be_bytes(out) as usize)
}

/// Decode the peer id string out of the ABI-encoded
/// `(string peerID, bytes signature)` return tuple.
fn decode_peer_data(data: &[u8]) -> ScResult<String> {
    let tuple = abi_word(data, 0)?;
    let string_offset = tuple + abi_word(data, tuple)?;
    let len = abi_word(data, string_offset)?;
    let bytes = data
        .get(string_offset + 32..string_offset + 32 + len)
        .ok_or_else(|| ScError::new("truncated contract response"))?;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| ScError::with_src("peer id is not utf-8", e))
}

impl ContractPeerIdSource {
    /// Construct a [ContractPeerIdSource] against the configured rpc
    /// endpoint and registry contract.
    pub fn new(config: &CheckerConfig) -> Self {
        Self {
            rpc: RpcClient::new(config),
            contract_address: config.registry_contract_address.clone(),
        }
    }

    fn numeric_id(provider_id: &str) -> ScResult<u64> {
        provider_id
            .strip_prefix("f0")
            .or_else(|| provider_id.strip_prefix("t0"))
            .and_then(|id| id.parse().ok())
            .ok_or_else(|| {
                ScError::new(format!(
                    "not a provider actor id: {provider_id}"
                ))
            })
    }
}

impl PeerIdSource for ContractPeerIdSource {
    fn lookup(
        &self,
        provider_id: &str,
    ) -> BoxFut<'_, ScResult<Option<String>>> {
        let provider_id = provider_id.to_string();
        Box::pin(async move {
            let numeric_id = Self::numeric_id(&provider_id)?;

            let result = self
                .rpc
                .call(
                    "eth_call",
                    serde_json::json!([
                        {
                            "to": self.contract_address,
                            "data": encode_get_peer_data(numeric_id),
                        },
                        "latest",
                    ]),
                )
                .await?;

            let raw = result.as_str().ok_or_else(|| {
                ScError::new("contract call returned no data")
            })?;
            let raw = hex::decode(raw.trim_start_matches("0x"))
                .map_err(ScError::new)?;

            let peer_id = decode_peer_data(&raw)?;
            Ok(if peer_id.is_empty() {
                None
            } else {
                Some(peer_id)
            })
        })
    }
}

/// An [IdentityResolver] racing the registry contract against chain
/// miner state.
#[derive(Debug)]
pub struct MinerInfoResolver {
    contract: DynPeerIdSource,
    chain: DynPeerIdSource,
}

impl MinerInfoResolver {
    /// Construct a resolver over the two standard sources.
    pub fn new(config: &CheckerConfig) -> Self {
        Self {
            contract: Arc::new(ContractPeerIdSource::new(config)),
            chain: Arc::new(ChainMinerInfoSource::new(config)),
        }
    }

    /// Construct a resolver over explicit sources.
    pub fn with_sources(
        contract: DynPeerIdSource,
        chain: DynPeerIdSource,
    ) -> Self {
        Self { contract, chain }
    }
}

impl IdentityResolver for MinerInfoResolver {
    fn resolve(&self, provider_id: &str) -> BoxFut<'_, ScResult<String>> {
        let provider_id = provider_id.to_string();
        Box::pin(async move {
            let (contract, chain) = tokio::join!(
                self.contract.lookup(&provider_id),
                self.chain.lookup(&provider_id),
            );

            if let Ok(Some(peer_id)) = &contract {
                if !peer_id.is_empty() {
                    tracing::debug!("using peer id from the contract");
                    return Ok(peer_id.clone());
                }
            }

            if let Ok(Some(peer_id)) = chain {
                tracing::debug!("using peer id from miner state");
                return Ok(peer_id);
            }

            Err(ScError::new(format!(
                "failed to obtain the peer id of {provider_id}: \
                 contract: {contract:?}, chain: {chain:?}"
            )))
        })
    }
}
