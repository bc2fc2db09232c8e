//! Discovery fan-out
//!
//! `discover_peers` is a star: one client exchanges cards with every endpoint.
//! `discover_full_mesh` has every client exchange cards with every other client,
//! O(n²) calls, which the demo mesh uses so each agent knows all the others.
//! Both issue their calls concurrently; the registry serializes the writes.

use crate::agent::client::AgentClient;
use crate::error::AgentError;
use crate::protocol::AgentCard;
use crate::transport::PeerTransport;
use futures::future::join_all;
use tracing::{info, warn};

/// What a discovery fan-out achieved
#[derive(Debug, Default)]
pub struct DiscoveryReport {
    pub discovered: Vec<AgentCard>,
    /// Endpoint and cause of every failed exchange
    pub failures: Vec<(String, AgentError)>,
}

impl DiscoveryReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    fn absorb(&mut self, endpoint: String, outcome: Result<AgentCard, AgentError>) {
        match outcome {
            Ok(card) => self.discovered.push(card),
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "Discovery failed");
                self.failures.push((endpoint, e));
            }
        }
    }
}

/// Exchange cards between `client` and every endpoint
pub async fn discover_peers<T: PeerTransport>(
    client: &AgentClient<T>,
    endpoints: &[String],
) -> DiscoveryReport {
    let outcomes = join_all(endpoints.iter().map(|endpoint| client.discover(endpoint))).await;

    let mut report = DiscoveryReport::default();
    for (endpoint, outcome) in endpoints.iter().cloned().zip(outcomes) {
        report.absorb(endpoint, outcome);
    }

    info!(
        agent_id = %client.own_card().agent_id,
        discovered = report.discovered.len(),
        failed = report.failures.len(),
        "Discovery fan-out finished"
    );
    report
}

/// Every client discovers every other client's advertised endpoint
pub async fn discover_full_mesh<T: PeerTransport>(clients: &[&AgentClient<T>]) -> DiscoveryReport {
    let exchanges = clients.iter().flat_map(|client| {
        clients
            .iter()
            .filter(move |peer| peer.own_card().agent_id != client.own_card().agent_id)
            .map(move |peer| {
                let endpoint = peer.own_card().endpoint.clone();
                async move {
                    let outcome = client.discover(&endpoint).await;
                    (endpoint, outcome)
                }
            })
    });
    let outcomes = join_all(exchanges).await;

    let mut report = DiscoveryReport::default();
    for (endpoint, outcome) in outcomes {
        report.absorb(endpoint, outcome);
    }

    info!(
        agents = clients.len(),
        exchanges = report.discovered.len() + report.failures.len(),
        failed = report.failures.len(),
        "Full-mesh discovery finished"
    );
    report
}
