//! Plain http block transport.

use std::io::Read;

use bytes::Bytes;
use spotcheck_api::transport::{
    BlockResponse, BlockTransport, TransportError,
};
use spotcheck_api::BoxFut;

use crate::config::CheckerConfig;

/// Classify a ureq transport failure into the outcome taxonomy.
///
/// ureq reports both refused connections and timeouts under a couple
/// of different error kinds depending on where in the dial they
/// happen, so the io message is consulted as well.
pub(crate) fn classify_transport(err: &ureq::Error) -> TransportError {
    let ureq::Error::Transport(t) = err else {
        // status errors carry a response and are not transport
        // failures, callers handle them before classifying
        return TransportError::other(err);
    };

    let msg = t.to_string();
    match t.kind() {
        ureq::ErrorKind::Dns => TransportError::Dns,
        ureq::ErrorKind::ConnectionFailed | ureq::ErrorKind::Io => {
            if msg.contains("refused") {
                TransportError::ConnectionRefused
            } else if msg.contains("timed out") {
                TransportError::Timeout
            } else {
                TransportError::other(msg)
            }
        }
        _ => TransportError::other(msg),
    }
}

fn classify_io(err: &std::io::Error) -> TransportError {
    match err.kind() {
        std::io::ErrorKind::ConnectionRefused => {
            TransportError::ConnectionRefused
        }
        std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
            TransportError::Timeout
        }
        _ => TransportError::other(err),
    }
}

/// Issue a blocking GET on a background thread, handing the status
/// back as soon as the response headers arrive and streaming the body
/// through a channel after that.
///
/// Dropping the returned stream hangs up the channel, which stops the
/// background read loop on its next chunk.
pub(crate) async fn stream_get(
    agent: ureq::Agent,
    url: String,
) -> Result<BlockResponse, TransportError> {
    let (status_send, status_recv) = tokio::sync::oneshot::channel();
    let (body_send, body_recv) = futures::channel::mpsc::unbounded();

    tokio::task::spawn_blocking(move || {
        let resp = match agent.get(&url).call() {
            Ok(resp) => resp,
            Err(ureq::Error::Status(code, _)) => {
                // a response arrived, just not a happy one; the body
                // is not worth streaming
                let _ = status_send.send(Ok(code));
                return;
            }
            Err(err) => {
                let _ = status_send.send(Err(classify_transport(&err)));
                return;
            }
        };

        let status = resp.status();
        if status_send.send(Ok(status)).is_err() {
            return;
        }

        let mut reader = resp.into_reader();
        let mut buf = [0_u8; 16 * 1024];
        loop {
            match reader.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    if body_send
                        .unbounded_send(Ok(Bytes::copy_from_slice(
                            &buf[..n],
                        )))
                        .is_err()
                    {
                        break;
                    }
                }
                Err(err) => {
                    let _ =
                        body_send.unbounded_send(Err(classify_io(&err)));
                    break;
                }
            }
        }
    });

    let status = status_recv
        .await
        .map_err(|_| TransportError::other("fetch task dropped"))??;

    Ok(BlockResponse {
        status,
        body: Box::pin(body_recv),
    })
}

/// A [BlockTransport] that dials the provider's own http endpoint.
///
/// The address argument is the provider's resolved `http(s)://` base
/// url.
#[derive(Debug)]
pub struct HttpTransport {
    agent: ureq::Agent,
}

impl HttpTransport {
    /// Construct an [HttpTransport] with the configured timeout.
    pub fn new(config: &CheckerConfig) -> Self {
        Self {
            agent: ureq::AgentBuilder::new()
                .timeout(config.request_timeout())
                .build(),
        }
    }

    fn block_url(address: &str, content_id: &str) -> String {
        format!(
            "{}/ipfs/{content_id}?dag-scope=block",
            address.trim_end_matches('/'),
        )
    }
}

impl BlockTransport for HttpTransport {
    fn fetch_block(
        &self,
        address: &str,
        content_id: &str,
    ) -> BoxFut<'_, Result<BlockResponse, TransportError>> {
        let url = Self::block_url(address, content_id);
        let agent = self.agent.clone();
        Box::pin(stream_get(agent, url))
    }

    fn probe_block(
        &self,
        address: &str,
        content_id: &str,
    ) -> BoxFut<'_, Result<u16, TransportError>> {
        let url = Self::block_url(address, content_id);
        let agent = self.agent.clone();
        Box::pin(async move {
            let status = tokio::task::spawn_blocking(move || {
                match agent
                    .head(&url)
                    .set("Accept", "application/vnd.ipld.raw")
                    .call()
                {
                    Ok(resp) => Ok(resp.status()),
                    Err(ureq::Error::Status(code, _)) => Ok(code),
                    Err(err) => Err(classify_transport(&err)),
                }
            })
            .await
            .map_err(|_| TransportError::other("probe task dropped"))??;

            Ok(status)
        })
    }
}
