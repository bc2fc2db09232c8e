//! Transport layer for agent communication
//!
//! `PeerTransport` abstracts the outbound half of the wire contract so the client
//! role and the orchestrator can run against HTTP peers or in-memory mocks alike.

use crate::error::TransportError;
use crate::protocol::{AgentCard, DiscoveryAck, HealthReport, TaskRequest, TaskResponse};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub mod http;

pub use http::{HttpTransport, ServerHandle};

/// Outbound calls to a peer's protocol endpoints
///
/// Every call takes the peer's base endpoint and an upper bound on its duration.
#[async_trait]
pub trait PeerTransport: Send + Sync {
    /// GET `/agent-card`
    async fn fetch_card(&self, endpoint: &str, timeout: Duration)
        -> Result<AgentCard, TransportError>;

    /// POST `/discover` with our own card
    async fn exchange_cards(
        &self,
        endpoint: &str,
        own_card: &AgentCard,
        timeout: Duration,
    ) -> Result<DiscoveryAck, TransportError>;

    /// POST `/task`
    async fn post_task(
        &self,
        endpoint: &str,
        request: &TaskRequest,
        timeout: Duration,
    ) -> Result<TaskResponse, TransportError>;

    /// GET `/health`
    async fn check_health(
        &self,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<HealthReport, TransportError>;
}

#[async_trait]
impl<T: PeerTransport + ?Sized> PeerTransport for Arc<T> {
    async fn fetch_card(
        &self,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<AgentCard, TransportError> {
        (**self).fetch_card(endpoint, timeout).await
    }

    async fn exchange_cards(
        &self,
        endpoint: &str,
        own_card: &AgentCard,
        timeout: Duration,
    ) -> Result<DiscoveryAck, TransportError> {
        (**self).exchange_cards(endpoint, own_card, timeout).await
    }

    async fn post_task(
        &self,
        endpoint: &str,
        request: &TaskRequest,
        timeout: Duration,
    ) -> Result<TaskResponse, TransportError> {
        (**self).post_task(endpoint, request, timeout).await
    }

    async fn check_health(
        &self,
        endpoint: &str,
        timeout: Duration,
    ) -> Result<HealthReport, TransportError> {
        (**self).check_health(endpoint, timeout).await
    }
}
