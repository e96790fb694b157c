//! Http round discovery against the round server.

use std::sync::Arc;

use spotcheck_api::{BoxFut, Round, RoundClient, ScError, ScResult};

use crate::config::CheckerConfig;

/// A [RoundClient] backed by the round server's http api.
///
/// Discovery deliberately does not follow the redirect from
/// `/rounds/current`: the redirect target names the round immutably
/// and doubles as the round randomness, so the raw `location` header
/// is the item of interest.
#[derive(Debug)]
pub struct HttpRoundClient {
    api_base_url: Arc<str>,
    agent: ureq::Agent,
}

impl HttpRoundClient {
    /// Construct an [HttpRoundClient] talking to the configured round
    /// server.
    pub fn new(config: &CheckerConfig) -> Self {
        Self {
            api_base_url: config.api_base_url.as_str().into(),
            agent: ureq::AgentBuilder::new()
                .redirects(0)
                .timeout(config.request_timeout())
                .build(),
        }
    }

    fn join(&self, location: &str) -> String {
        if location.starts_with("http://")
            || location.starts_with("https://")
        {
            location.to_string()
        } else {
            format!("{}{location}", self.api_base_url)
        }
    }
}

impl RoundClient for HttpRoundClient {
    fn discover(&self) -> BoxFut<'_, ScResult<String>> {
        Box::pin(async move {
            let url = format!("{}/rounds/current", self.api_base_url);
            let agent = self.agent.clone();

            let resp = tokio::task::spawn_blocking(move || {
                agent
                    .get(&url)
                    .set("Content-Type", "application/json")
                    .call()
                    .map_err(ScError::new)
            })
            .await
            .map_err(|_| ScError::new("task join error"))??;

            let status = resp.status();
            if !(300..400).contains(&status) {
                return Err(ScError::new(format!(
                    "expected a redirect from the round server, got {status}"
                )));
            }

            resp.header("location")
                .map(str::to_string)
                .ok_or_else(|| {
                    ScError::new(
                        "round server redirect carried no location",
                    )
                })
        })
    }

    fn fetch_round(&self, location: &str) -> BoxFut<'_, ScResult<Round>> {
        let url = self.join(location);
        Box::pin(async move {
            let agent = self.agent.clone();

            let body = tokio::task::spawn_blocking(move || {
                agent
                    .get(&url)
                    .set("Content-Type", "application/json")
                    .call()
                    .map_err(ScError::new)?
                    .into_string()
                    .map_err(ScError::new)
            })
            .await
            .map_err(|_| ScError::new("task join error"))??;

            serde_json::from_str(&body).map_err(ScError::new)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn client(base: &str) -> HttpRoundClient {
        HttpRoundClient::new(&CheckerConfig {
            api_base_url: base.into(),
            ..Default::default()
        })
    }

    #[test]
    fn relative_locations_join_onto_the_base_url() {
        let c = client("https://api.example");
        assert_eq!(
            "https://api.example/rounds/meridian/0x1a/99",
            c.join("/rounds/meridian/0x1a/99"),
        );
    }

    #[test]
    fn absolute_locations_pass_through() {
        let c = client("https://api.example");
        assert_eq!(
            "https://other.example/rounds/1",
            c.join("https://other.example/rounds/1"),
        );
    }
}
