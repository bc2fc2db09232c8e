//! Agent runtime assembly
//!
//! Wires one agent's registry, task processor, protocol server and outbound client
//! from its configuration. All state is owned by the runtime and handed to the
//! server and client explicitly.

use crate::agent::client::AgentClient;
use crate::agent::handlers::CompletionSettings;
use crate::agent::processor::TaskProcessor;
use crate::agent::registry::AgentRegistry;
use crate::config::AgentConfig;
use crate::error::{AgentError, AgentResult};
use crate::llm::provider::LlmProvider;
use crate::protocol::AgentCard;
use crate::transport::http::{serve, ServerState};
use crate::transport::{HttpTransport, PeerTransport};
use futures::future::join_all;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{info, warn};

pub use crate::transport::http::ServerHandle;

/// One agent: server role, client role and the registry they share
pub struct AgentRuntime<T: PeerTransport = HttpTransport> {
    config: AgentConfig,
    registry: AgentRegistry,
    processor: Arc<TaskProcessor>,
    client: AgentClient<T>,
}

impl AgentRuntime<HttpTransport> {
    /// Build a runtime that talks to peers over HTTP
    pub fn new(config: AgentConfig, provider: Arc<dyn LlmProvider>) -> AgentResult<Self> {
        Self::with_transport(config, provider, HttpTransport::new()?)
    }
}

impl<T: PeerTransport> AgentRuntime<T> {
    pub fn with_transport(
        config: AgentConfig,
        provider: Arc<dyn LlmProvider>,
        transport: T,
    ) -> AgentResult<Self> {
        config.validate()?;

        let card = config.card();
        let registry = AgentRegistry::with_self(card.clone())?;
        let processor = TaskProcessor::with_builtin_handlers(
            &card,
            provider,
            CompletionSettings::from(&config.llm),
        )?;
        let client = AgentClient::new(
            registry.clone(),
            transport,
            config.network.request_timeout(),
        )?;

        info!(
            agent_id = %card.agent_id,
            capabilities = ?card.capabilities,
            task_types = ?processor.task_types(),
            "Agent runtime initialized"
        );

        Ok(Self {
            config,
            registry,
            processor: Arc::new(processor),
            client,
        })
    }

    pub fn card(&self) -> &AgentCard {
        self.client.own_card()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn processor(&self) -> &Arc<TaskProcessor> {
        &self.processor
    }

    pub fn client(&self) -> &AgentClient<T> {
        &self.client
    }

    /// Serve the protocol routes on the configured bind address
    pub fn start(&self) -> AgentResult<ServerHandle> {
        let addr = self.config.bind_address()?;
        self.start_on(addr)
    }

    /// Serve the protocol routes on `addr`
    pub fn start_on(&self, addr: SocketAddr) -> AgentResult<ServerHandle> {
        let state = ServerState::new(
            self.card().clone(),
            self.registry.clone(),
            self.processor.clone(),
        );
        serve(state, addr)
    }

    /// Discover every peer listed under `[network] peers`, concurrently
    ///
    /// Failures are logged and returned; successful exchanges are already stored.
    pub async fn discover_configured_peers(&self) -> Vec<(String, AgentResult<AgentCard>)> {
        let peers = &self.config.network.peers;
        let outcomes = join_all(peers.iter().map(|endpoint| self.client.discover(endpoint))).await;

        peers
            .iter()
            .cloned()
            .zip(outcomes)
            .inspect(|(endpoint, outcome)| {
                if let Err(e) = outcome {
                    warn!(endpoint = %endpoint, error = %e, "Startup discovery failed");
                }
            })
            .collect()
    }
}

/// Fail fast when the completion backend is unusable
pub async fn check_provider(provider: &dyn LlmProvider) -> AgentResult<()> {
    provider.health_check().await.map_err(|e| {
        AgentError::configuration(format!("LLM provider '{}' unavailable: {e}", provider.name()))
    })
}
