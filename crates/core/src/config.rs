//! Checker node configuration.

/// Configuration parameters for a checker node.
///
/// These are process-lifetime values, the likes of which might be
/// found in a configuration file or on the command line.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckerConfig {
    /// The opaque identity of this station. Constant for the process
    /// lifetime.
    pub station_id: String,

    /// Base url of the round and measurement server.
    /// E.g. `https://api.checker.example`.
    pub api_base_url: String,

    /// Base url of the retrieval index.
    pub indexer_base_url: String,

    /// Url of the chain JSON-RPC endpoint.
    pub rpc_url: String,

    /// Optional bearer token for the chain RPC endpoint.
    pub rpc_auth_token: Option<String>,

    /// Address of the peer-id registry contract.
    pub registry_contract_address: String,

    /// Base url of the external graphsync-capable block fetcher
    /// daemon that delegated retrievals go through.
    pub block_fetcher_url: String,

    /// Abort a fetch once this many body bytes have accumulated.
    /// Default: 200 MiB.
    pub max_car_size_bytes: u64,

    /// Per-request timeout in ms for every network operation.
    /// Default: 60 seconds.
    pub request_timeout_ms: u32,

    /// Approximate round length in ms, used for pacing.
    /// Default: 20 minutes.
    pub round_length_ms: u32,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            station_id: String::new(),
            api_base_url: "<https://your.round.server>".into(),
            indexer_base_url: "https://cid.contact".into(),
            rpc_url: "https://api.node.glif.io/rpc/v0".into(),
            rpc_auth_token: None,
            registry_contract_address:
                "0x14183aD016Ddc83D638425D6328009aa390339Ce".into(),
            block_fetcher_url: "http://127.0.0.1:62156".into(),
            max_car_size_bytes: 200 * 1024 * 1024,
            request_timeout_ms: 1000 * 60,
            round_length_ms: 1000 * 60 * 20,
        }
    }
}

impl CheckerConfig {
    /// Get the per-request timeout duration.
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_timeout_ms as u64)
    }

    /// Get the round length duration.
    pub fn round_length(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.round_length_ms as u64)
    }
}
