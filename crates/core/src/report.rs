//! Measurement submission to the round server.

use std::sync::Arc;

use spotcheck_api::report::MeasurementReporter;
use spotcheck_api::{BoxFut, Measurement, ScError, ScResult};

use crate::config::CheckerConfig;

#[derive(Debug, serde::Deserialize)]
struct SubmitResponse {
    id: u64,
}

/// A [MeasurementReporter] posting to the round server's
/// `/measurements` endpoint.
#[derive(Debug)]
pub struct HttpMeasurementReporter {
    api_base_url: Arc<str>,
    agent: ureq::Agent,
}

impl HttpMeasurementReporter {
    /// Construct an [HttpMeasurementReporter] against the configured
    /// round server.
    pub fn new(config: &CheckerConfig) -> Self {
        Self {
            api_base_url: config.api_base_url.as_str().into(),
            agent: ureq::AgentBuilder::new()
                .timeout(config.request_timeout())
                .build(),
        }
    }
}

impl MeasurementReporter for HttpMeasurementReporter {
    fn submit(
        &self,
        measurement: &Measurement,
    ) -> BoxFut<'_, ScResult<u64>> {
        let payload = serde_json::to_string(measurement);
        Box::pin(async move {
            let payload = payload.map_err(ScError::new)?;
            let url = format!("{}/measurements", self.api_base_url);
            let agent = self.agent.clone();

            let body = tokio::task::spawn_blocking(move || {
                agent
                    .post(&url)
                    .set("Content-Type", "application/json")
                    .send_string(&payload)
                    .map_err(ScError::new)?
                    .into_string()
                    .map_err(ScError::new)
            })
            .await
            .map_err(|_| ScError::new("task join error"))??;

            let resp: SubmitResponse = serde_json::from_str(&body)
                .map_err(|e| {
                    ScError::with_src(
                        "unexpected measurement submission response",
                        e,
                    )
                })?;
            Ok(resp.id)
        })
    }
}
