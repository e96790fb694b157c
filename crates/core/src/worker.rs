//! The serial worker loop.
//!
//! One check at a time: take the next assignment, run the engine,
//! submit the measurement, sleep to hold the round cadence. Nothing
//! that happens inside an iteration is fatal; a failed submission or
//! an unreachable round server is logged and the loop carries on.

use std::sync::Arc;
use std::time::Duration;

use spotcheck_api::metrics::DynRetrievalMetrics;
use spotcheck_api::report::DynMeasurementReporter;
use spotcheck_api::Measurement;

use crate::config::CheckerConfig;
use crate::engine::CheckEngine;
use crate::pacing::{next_delay, MAX_DELAY};
use crate::tasker::Tasker;

/// The long-running checker worker.
#[derive(Debug)]
pub struct Worker {
    tasker: Arc<Tasker>,
    engine: Arc<CheckEngine>,
    reporter: DynMeasurementReporter,
    metrics: DynRetrievalMetrics,
    station_id: String,
    client_version: String,
    runtime_version: String,
    round_length: Duration,
}

impl Worker {
    /// Construct a [Worker] over the given collaborators.
    pub fn new(
        config: &CheckerConfig,
        tasker: Arc<Tasker>,
        engine: Arc<CheckEngine>,
        reporter: DynMeasurementReporter,
        metrics: DynRetrievalMetrics,
        client_version: String,
        runtime_version: String,
    ) -> Self {
        Self {
            tasker,
            engine,
            reporter,
            metrics,
            station_id: config.station_id.clone(),
            client_version,
            runtime_version,
            round_length: config.round_length(),
        }
    }

    /// Run checks forever.
    pub async fn run(&self) {
        let mut current_round: Option<String> = None;

        loop {
            let delay = self.run_one(&mut current_round).await;
            tokio::time::sleep(delay).await;
        }
    }

    /// Run a single iteration, returning how long to sleep before the
    /// next one.
    async fn run_one(
        &self,
        current_round: &mut Option<String>,
    ) -> Duration {
        let started = std::time::Instant::now();

        let task = match self.tasker.next().await {
            Ok(Some(task)) => task,
            Ok(None) => {
                tracing::debug!("no tasks to execute");
                return MAX_DELAY;
            }
            Err(err) => {
                tracing::warn!(?err, "cannot obtain the next task");
                return MAX_DELAY;
            }
        };

        if task.round_id.is_some() && *current_round != task.round_id {
            if current_round.is_some() {
                self.metrics.report();
            }
            self.metrics.reset();
            *current_round = task.round_id.clone();
        }

        let assignment = task.assignment;
        tracing::info!(
            content_id = %assignment.content_id,
            provider_id = %assignment.provider_id,
            "starting retrieval check"
        );
        self.metrics.record_attempt(
            &assignment.content_id,
            &assignment.provider_id,
        );

        let record = self.engine.check(&assignment).await;
        let success = record
            .status_code
            .map(|c| c.is_success())
            .unwrap_or(false);
        if !success {
            self.metrics.record_failure();
        }
        tracing::info!(
            status_code = ?record.status_code.map(|c| c.as_u16()),
            indexer_result = ?record.indexer_result,
            "retrieval check finished"
        );

        let measurement = Measurement {
            content_id: assignment.content_id,
            provider_id: assignment.provider_id,
            station_id: self.station_id.clone(),
            client_version: self.client_version.clone(),
            runtime_version: self.runtime_version.clone(),
            record,
        };
        match self.reporter.submit(&measurement).await {
            Ok(id) => {
                tracing::info!(id, "measurement submitted");
            }
            Err(err) => {
                tracing::warn!(?err, "failed to submit the measurement");
            }
        }

        next_delay(started.elapsed(), self.round_length, task.quota)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::metrics::RoundMetrics;
    use crate::test_utils::build_single_block_car;
    use spotcheck_api::index::{IndexQuery, RetrievalProvider};
    use spotcheck_api::outcome::{IndexerResult, Protocol};
    use spotcheck_api::report::MeasurementReporter;
    use spotcheck_api::transport::{
        BlockResponse, BlockTransport, TransportError,
    };
    use spotcheck_api::{
        Assignment, BoxFut, Round, RoundClient, ScError, ScResult,
    };
    use std::sync::Mutex;

    #[derive(Debug)]
    struct OneRound(Round);

    impl RoundClient for OneRound {
        fn discover(&self) -> BoxFut<'_, ScResult<String>> {
            Box::pin(async move { Ok("/rounds/meridian/0x1a/1".into()) })
        }

        fn fetch_round(
            &self,
            _location: &str,
        ) -> BoxFut<'_, ScResult<Round>> {
            let out = self.0.clone();
            Box::pin(async move { Ok(out) })
        }
    }

    #[derive(Debug, Default)]
    struct CollectingReporter(Mutex<Vec<Measurement>>);

    impl MeasurementReporter for CollectingReporter {
        fn submit(
            &self,
            measurement: &Measurement,
        ) -> BoxFut<'_, ScResult<u64>> {
            let m = measurement.clone();
            Box::pin(async move {
                let mut all = self.0.lock().unwrap();
                all.push(m);
                Ok(all.len() as u64)
            })
        }
    }

    #[derive(Debug)]
    struct FailingReporter;

    impl MeasurementReporter for FailingReporter {
        fn submit(
            &self,
            _measurement: &Measurement,
        ) -> BoxFut<'_, ScResult<u64>> {
            Box::pin(async move { Err(ScError::new("offline")) })
        }
    }

    #[derive(Debug)]
    struct ServingTransport(Vec<u8>);

    impl BlockTransport for ServingTransport {
        fn fetch_block(
            &self,
            _address: &str,
            _content_id: &str,
        ) -> BoxFut<'_, Result<BlockResponse, TransportError>> {
            let car = bytes::Bytes::copy_from_slice(&self.0);
            Box::pin(async move {
                Ok(BlockResponse {
                    status: 200,
                    body: Box::pin(futures::stream::iter([Ok(car)])),
                })
            })
        }

        fn probe_block(
            &self,
            _address: &str,
            _content_id: &str,
        ) -> BoxFut<'_, Result<u16, TransportError>> {
            Box::pin(async move { Ok(200) })
        }
    }

    #[derive(Debug)]
    struct StubIdentity;

    impl spotcheck_api::identity::IdentityResolver for StubIdentity {
        fn resolve(
            &self,
            _provider_id: &str,
        ) -> BoxFut<'_, ScResult<String>> {
            Box::pin(async move { Ok("peer-a".into()) })
        }
    }

    #[derive(Debug)]
    struct StubIndex;

    impl spotcheck_api::index::IndexClient for StubIndex {
        fn lookup(
            &self,
            _content_id: &str,
            _peer_id: &str,
        ) -> BoxFut<'_, IndexQuery> {
            Box::pin(async move {
                IndexQuery {
                    indexer_result: IndexerResult::Ok,
                    provider: Some(RetrievalProvider {
                        provider_id: "peer-a".into(),
                        address: "/dns/frisbii.example/tcp/443/https"
                            .into(),
                        protocol: Protocol::Http,
                        context_id: "ctx".into(),
                    }),
                }
            })
        }
    }

    fn worker(
        car: &[u8],
        cid: &str,
        reporter: DynMeasurementReporter,
    ) -> (Worker, DynRetrievalMetrics) {
        let config = CheckerConfig {
            station_id: "some-station-id".into(),
            ..Default::default()
        };
        let rounds = Arc::new(OneRound(Round {
            round_id: "1".into(),
            start_epoch: 4111111,
            task_quota_per_node: 1,
            assignments: vec![Assignment {
                content_id: cid.into(),
                provider_id: "f010".into(),
            }],
        }));
        let tasker = Arc::new(Tasker::new(
            rounds,
            config.station_id.clone(),
        ));
        let engine = Arc::new(CheckEngine::new(
            &config,
            Arc::new(StubIdentity),
            Arc::new(StubIndex),
            Arc::new(ServingTransport(car.to_vec())),
            Arc::new(ServingTransport(Vec::new())),
        ));
        let metrics: DynRetrievalMetrics =
            Arc::new(RoundMetrics::new());
        let worker = Worker::new(
            &config,
            tasker,
            engine,
            reporter,
            metrics.clone(),
            "0.1.0".into(),
            "test".into(),
        );
        (worker, metrics)
    }

    #[tokio::test]
    async fn a_successful_check_is_submitted_and_counted() {
        let (cid, car) = build_single_block_car(b"hello world");
        let reporter = Arc::new(CollectingReporter::default());
        let (worker, metrics) = worker(&car, &cid, reporter.clone());

        let mut current_round = None;
        worker.run_one(&mut current_round).await;

        assert_eq!(Some("1".to_string()), current_round);

        let submitted = reporter.0.lock().unwrap();
        assert_eq!(1, submitted.len());
        let m = &submitted[0];
        assert_eq!(cid, m.content_id);
        assert_eq!("f010", m.provider_id);
        assert_eq!("some-station-id", m.station_id);
        assert!(m
            .record
            .status_code
            .map(|c| c.is_success())
            .unwrap_or(false));

        let s = metrics.snapshot();
        assert_eq!(1, s.total);
        assert_eq!(0, s.failed);
        assert_eq!(1, s.unique_pair_count);
        // reset once when entering the round
        assert_eq!(1, s.round_index);
    }

    #[tokio::test]
    async fn a_failed_check_counts_as_a_failure() {
        // the served body is not a valid archive
        let (cid, _) = build_single_block_car(b"hello world");
        let reporter = Arc::new(CollectingReporter::default());
        let (worker, metrics) =
            worker(&[1, 2, 3], &cid, reporter.clone());

        let mut current_round = None;
        worker.run_one(&mut current_round).await;

        // the measurement is still submitted
        assert_eq!(1, reporter.0.lock().unwrap().len());
        assert_eq!(1, metrics.snapshot().failed);
    }

    #[tokio::test]
    async fn a_failed_submission_is_not_fatal() {
        let (cid, car) = build_single_block_car(b"hello world");
        let (worker, metrics) =
            worker(&car, &cid, Arc::new(FailingReporter));

        let mut current_round = None;
        worker.run_one(&mut current_round).await;

        // the loop carries on and the attempt is still counted
        assert_eq!(1, metrics.snapshot().total);
    }

    #[tokio::test]
    async fn idle_iterations_sleep_the_maximum() {
        let (cid, car) = build_single_block_car(b"hello world");
        let reporter = Arc::new(CollectingReporter::default());
        let (worker, _) = worker(&car, &cid, reporter.clone());

        let mut current_round = None;
        worker.run_one(&mut current_round).await;
        // the single sampled task is done; the round has nothing left
        let delay = worker.run_one(&mut current_round).await;
        assert_eq!(MAX_DELAY, delay);
        assert_eq!(1, reporter.0.lock().unwrap().len());
    }
}
