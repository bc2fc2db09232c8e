//! Client role of the agent runtime
//!
//! `AgentClient` issues discovery and task calls to peers. Every call is bounded by the
//! client's timeout and fails with `TransportError::Timeout` on expiry. Nothing here
//! retries: the caller decides.

use crate::agent::registry::AgentRegistry;
use crate::error::{AgentError, AgentResult, TransportError};
use crate::observability::discovery_span;
use crate::protocol::{
    AgentCard, HealthReport, Parameters, TaskOutcome, TaskRequest, TaskResponse,
    DISCOVERED_STATUS,
};
use crate::transport::{HttpTransport, PeerTransport};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn, Instrument};

/// Outbound half of an agent, bound to its registry
pub struct AgentClient<T: PeerTransport = HttpTransport> {
    own_card: AgentCard,
    registry: AgentRegistry,
    transport: T,
    timeout: Duration,
}

impl<T: PeerTransport> AgentClient<T> {
    /// Create a client for the identity registered in `registry`
    pub fn new(registry: AgentRegistry, transport: T, timeout: Duration) -> AgentResult<Self> {
        let own_card = registry.self_card().ok_or_else(|| {
            AgentError::configuration("registry has no own agent card registered")
        })?;

        Ok(Self {
            own_card,
            registry,
            transport,
            timeout,
        })
    }

    pub fn own_card(&self) -> &AgentCard {
        &self.own_card
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn bounded<R>(
        &self,
        endpoint: &str,
        call: impl Future<Output = Result<R, TransportError>>,
    ) -> Result<R, TransportError> {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(TransportError::Timeout {
                url: endpoint.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }

    /// Exchange cards with the peer at `endpoint` and store its card
    pub async fn discover(&self, endpoint: &str) -> AgentResult<AgentCard> {
        let span = discovery_span!(
            agent_id = %self.own_card.agent_id,
            peer_endpoint = %endpoint,
            inbound = false
        );

        async move {
            let ack = self
                .bounded(
                    endpoint,
                    self.transport
                        .exchange_cards(endpoint, &self.own_card, self.timeout),
                )
                .await
                .map_err(|e| {
                    warn!(error = %e, "Discovery exchange failed");
                    AgentError::discovery(endpoint, e.into())
                })?;

            if ack.status != DISCOVERED_STATUS {
                return Err(AgentError::discovery(
                    endpoint,
                    AgentError::protocol_violation(format!(
                        "discovery acknowledged with status '{}'",
                        ack.status
                    )),
                ));
            }

            let card = ack.agent_card;
            self.registry
                .upsert_peer(card.clone())
                .map_err(|e| AgentError::discovery(endpoint, e))?;

            if card.endpoint != endpoint.trim_end_matches('/') {
                debug!(advertised = %card.endpoint, "Peer advertises a different endpoint");
            }
            info!(peer_id = %card.agent_id, capabilities = ?card.capabilities, "Discovered peer");
            Ok(card)
        }
        .instrument(span)
        .await
    }

    /// Send one task to the agent at `endpoint`
    ///
    /// A response with `status=error` is returned as-is; only transport failures and
    /// protocol violations are raised.
    pub async fn send_task(
        &self,
        endpoint: &str,
        task_type: &str,
        parameters: Parameters,
    ) -> AgentResult<TaskResponse> {
        let target = self
            .registry
            .peers()
            .into_iter()
            .find(|peer| peer.endpoint == endpoint.trim_end_matches('/'))
            .map(|peer| peer.agent_id)
            .unwrap_or_else(|| endpoint.to_string());

        let request = TaskRequest::new(&self.own_card.agent_id, target, task_type, parameters);
        self.dispatch(endpoint, request).await
    }

    /// Send one task to a known peer by id
    pub async fn send_task_to(
        &self,
        agent_id: &str,
        task_type: &str,
        parameters: Parameters,
    ) -> AgentResult<TaskResponse> {
        let peer = self.registry.lookup(agent_id)?;
        self.send_task_to_peer(&peer, task_type, parameters).await
    }

    pub async fn send_task_to_peer(
        &self,
        peer: &AgentCard,
        task_type: &str,
        parameters: Parameters,
    ) -> AgentResult<TaskResponse> {
        let request = TaskRequest::new(
            &self.own_card.agent_id,
            &peer.agent_id,
            task_type,
            parameters,
        );
        self.dispatch(&peer.endpoint, request).await
    }

    /// Post a prepared request and verify the response answers it
    pub async fn dispatch(&self, endpoint: &str, request: TaskRequest) -> AgentResult<TaskResponse> {
        let started = Instant::now();
        debug!(
            task_id = %request.task_id,
            task_type = %request.task_type,
            target_agent = %request.target_agent,
            endpoint = %endpoint,
            "Sending task"
        );

        let response = self
            .bounded(
                endpoint,
                self.transport.post_task(endpoint, &request, self.timeout),
            )
            .await?;

        response
            .validate_for(&request.task_id)
            .map_err(AgentError::protocol_violation)?;

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match response.outcome() {
            TaskOutcome::Error(message) => warn!(
                task_id = %request.task_id,
                responding_agent = %response.responding_agent,
                error = %message,
                elapsed_ms,
                "Peer reported task failure"
            ),
            _ => info!(
                task_id = %request.task_id,
                responding_agent = %response.responding_agent,
                status = %response.status,
                elapsed_ms,
                "Task response received"
            ),
        }

        Ok(response)
    }

    /// Read a peer's card without storing it
    pub async fn fetch_card(&self, endpoint: &str) -> AgentResult<AgentCard> {
        let card = self
            .bounded(endpoint, self.transport.fetch_card(endpoint, self.timeout))
            .await?;
        card.validate()?;
        Ok(card)
    }

    pub async fn check_health(&self, endpoint: &str) -> AgentResult<HealthReport> {
        Ok(self
            .bounded(endpoint, self.transport.check_health(endpoint, self.timeout))
            .await?)
    }
}
