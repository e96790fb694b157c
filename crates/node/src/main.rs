//! The binary spotcheck-node.

use std::sync::Arc;

use spotcheck_api::{Assignment, Measurement};
use spotcheck_core::config::CheckerConfig;
use spotcheck_core::engine::CheckEngine;
use spotcheck_core::graphsync_transport::GraphsyncTransport;
use spotcheck_core::http_transport::HttpTransport;
use spotcheck_core::ipni::IpniClient;
use spotcheck_core::metrics::RoundMetrics;
use spotcheck_core::miner_info::MinerInfoResolver;
use spotcheck_core::report::HttpMeasurementReporter;
use spotcheck_core::round_client::HttpRoundClient;
use spotcheck_core::tasker::Tasker;
use spotcheck_core::worker::Worker;

const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");
const RUNTIME_VERSION: &str = "tokio-1";

#[derive(clap::Parser, Debug)]
#[command(version)]
pub struct Args {
    /// The station identity to check as. Generated at random when
    /// omitted; pass a stable value to keep the same task subsets
    /// across restarts.
    #[arg(long)]
    pub station_id: Option<String>,

    /// Base url of the round and measurement server.
    #[arg(long)]
    pub api_base_url: Option<String>,

    /// Base url of the retrieval index.
    #[arg(long)]
    pub indexer_base_url: Option<String>,

    /// Url of the chain JSON-RPC endpoint.
    #[arg(long)]
    pub rpc_url: Option<String>,

    /// Bearer token for the chain JSON-RPC endpoint.
    #[arg(long)]
    pub rpc_auth_token: Option<String>,

    /// Base url of the external graphsync-capable block fetcher
    /// daemon.
    #[arg(long)]
    pub block_fetcher_url: Option<String>,

    /// Run a single check of this content id, print the measurement
    /// and exit without submitting anything.
    #[arg(long, requires = "check_provider")]
    pub check_cid: Option<String>,

    /// The storage provider to check `--check-cid` against,
    /// e.g. `f0142637`.
    #[arg(long, requires = "check_cid")]
    pub check_provider: Option<String>,
}

impl Args {
    fn into_config(self) -> (CheckerConfig, Option<Assignment>) {
        let defaults = CheckerConfig::default();
        let station_id = self.station_id.unwrap_or_else(|| {
            let station_id = hex::encode(rand::random::<[u8; 32]>());
            tracing::info!(%station_id, "generated a station identity");
            station_id
        });
        let config = CheckerConfig {
            station_id,
            api_base_url: self
                .api_base_url
                .unwrap_or(defaults.api_base_url),
            indexer_base_url: self
                .indexer_base_url
                .unwrap_or(defaults.indexer_base_url),
            rpc_url: self.rpc_url.unwrap_or(defaults.rpc_url),
            rpc_auth_token: self.rpc_auth_token,
            block_fetcher_url: self
                .block_fetcher_url
                .unwrap_or(defaults.block_fetcher_url),
            ..defaults
        };
        let one_shot = match (self.check_cid, self.check_provider) {
            (Some(content_id), Some(provider_id)) => Some(Assignment {
                content_id,
                provider_id,
            }),
            _ => None,
        };
        (config, one_shot)
    }
}

fn build_engine(config: &CheckerConfig) -> Arc<CheckEngine> {
    Arc::new(CheckEngine::new(
        config,
        Arc::new(MinerInfoResolver::new(config)),
        Arc::new(IpniClient::new(config)),
        Arc::new(HttpTransport::new(config)),
        Arc::new(GraphsyncTransport::new(config)),
    ))
}

/// Run one check and print the measurement instead of submitting it.
async fn run_one_shot(config: CheckerConfig, assignment: Assignment) {
    let engine = build_engine(&config);
    let record = engine.check(&assignment).await;

    let measurement = Measurement {
        content_id: assignment.content_id,
        provider_id: assignment.provider_id,
        station_id: config.station_id,
        client_version: CLIENT_VERSION.into(),
        runtime_version: RUNTIME_VERSION.into(),
        record,
    };
    println!(
        "{}",
        serde_json::to_string_pretty(&measurement)
            .expect("measurements always serialize"),
    );
}

async fn run_worker(config: CheckerConfig) {
    let engine = build_engine(&config);
    let rounds = Arc::new(HttpRoundClient::new(&config));
    let tasker =
        Arc::new(Tasker::new(rounds, config.station_id.clone()));
    let reporter = Arc::new(HttpMeasurementReporter::new(&config));
    let metrics = Arc::new(RoundMetrics::new());

    let worker = Worker::new(
        &config,
        tasker,
        engine,
        reporter,
        metrics,
        CLIENT_VERSION.into(),
        RUNTIME_VERSION.into(),
    );

    let (send, recv) = tokio::sync::oneshot::channel();
    let mut send = Some(send);
    ctrlc::set_handler(move || {
        if let Some(send) = send.take() {
            let _ = send.send(());
        }
    })
    .expect("failed to install the signal handler");

    tracing::info!(
        station_id = %config.station_id,
        version = CLIENT_VERSION,
        "checker node started"
    );

    tokio::select! {
        _ = worker.run() => {}
        _ = recv => {
            tracing::info!("terminating");
        }
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new("info")
                }),
        )
        .init();

    let args = <Args as clap::Parser>::parse();
    let (config, one_shot) = args.into_config();

    match one_shot {
        Some(assignment) => run_one_shot(config, assignment).await,
        None => run_worker(config).await,
    }
}
