//! reqwest implementation of `PeerTransport`

use super::{endpoint_url, AGENT_CARD_PATH, DISCOVER_PATH, HEALTH_PATH, TASK_PATH};
use crate::error::TransportError;
use crate::protocol::{AgentCard, DiscoveryAck, HealthReport, TaskRequest, TaskResponse};
use crate::transport::PeerTransport;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Upper bound on how much of a non-200 body is kept in the error
const MAX_ERROR_BODY_LEN: usize = 512;

/// Talks to peers over plain HTTP with JSON bodies
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Result<Self, TransportError> {
        let client = Client::builder()
            .user_agent(concat!("a2a-mesh/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Unreachable {
                url: String::new(),
                message: format!("failed to build HTTP client: {e}"),
            })?;
        Ok(Self { client })
    }

    /// Reuse an existing reqwest client (connection pool, proxies, TLS settings)
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        url: String,
        request: RequestBuilder,
        timeout: Duration,
    ) -> Result<T, TransportError> {
        debug!(url = %url, timeout_ms = timeout.as_millis() as u64, "Sending peer request");

        let response = request.timeout(timeout).send().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    url: url.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                }
            } else {
                TransportError::Unreachable {
                    url: url.clone(),
                    message: e.to_string(),
                }
            }
        })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                TransportError::Timeout {
                    url: url.clone(),
                    timeout_ms: timeout.as_millis() as u64,
                }
            } else {
                TransportError::MalformedBody {
                    url: url.clone(),
                    message: format!("failed to read body: {e}"),
                }
            }
        })?;

        if status != StatusCode::OK {
            return Err(TransportError::Status {
                url,
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        serde_json::from_slice(&body).map_err(|e| TransportError::MalformedBody {
            url,
            message: e.to_string(),
        })
    }
}

fn truncate_body(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= MAX_ERROR_BODY_LEN {
        return text.into_owned();
    }
    let mut end = MAX_ERROR_BODY_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[async_trait]
impl PeerTransport for HttpTransport {
    async fn fetch_card(
        &self,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<AgentCard, TransportError> {
        let url = endpoint_url(endpoint, AGENT_CARD_PATH);
        let request = self.client.get(&url);
        self.execute(url, request, timeout).await
    }

    async fn exchange_cards(
        &self,
        endpoint: &str,
        own_card: &AgentCard,
        timeout: Duration,
    ) -> Result<DiscoveryAck, TransportError> {
        let url = endpoint_url(endpoint, DISCOVER_PATH);
        let request = self.client.post(&url).json(own_card);
        self.execute(url, request, timeout).await
    }

    async fn post_task(
        &self,
        endpoint: &str,
        request: &TaskRequest,
        timeout: Duration,
    ) -> Result<TaskResponse, TransportError> {
        let url = endpoint_url(endpoint, TASK_PATH);
        let builder = self.client.post(&url).json(request);
        self.execute(url, builder, timeout).await
    }

    async fn check_health(
        &self,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<HealthReport, TransportError> {
        let url = endpoint_url(endpoint, HEALTH_PATH);
        let request = self.client.get(&url);
        self.execute(url, request, timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_body_keeps_short_text() {
        assert_eq!(truncate_body(b"bad request"), "bad request");
    }

    #[test]
    fn test_truncate_body_respects_char_boundaries() {
        let long = "é".repeat(400);
        let truncated = truncate_body(long.as_bytes());
        assert!(truncated.ends_with("..."));
        assert!(truncated.len() <= MAX_ERROR_BODY_LEN + 3);
    }
}
