//! AgentCard registry
//!
//! Holds this agent's own card and the cards of discovered peers, keyed by
//! `agent_id`. The registry is cheap to clone and shared by the HTTP server, the
//! outbound client and any concurrent discovery tasks. Every mutation is one
//! write-locked step, so a peer entry is either fully replaced or untouched.

use crate::error::{AgentError, AgentResult};
use crate::protocol::card::{AgentCard, CardError};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct RegistryState {
    own: Option<AgentCard>,
    peers: HashMap<String, AgentCard>,
}

/// Thread-safe registry of the agent's own card and its discovered peers
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    state: Arc<RwLock<RegistryState>>,
}

impl AgentRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding `card` as this agent's identity
    pub fn with_self(card: AgentCard) -> AgentResult<Self> {
        let registry = Self::new();
        registry.register_self(card)?;
        Ok(registry)
    }

    /// Store this agent's own card; allowed once per registry
    pub fn register_self(&self, card: AgentCard) -> AgentResult<()> {
        card.validate()
            .map_err(|e| AgentError::configuration(format!("own agent card: {e}")))?;

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = &state.own {
            return Err(AgentError::configuration(format!(
                "agent identity already registered as '{}'",
                existing.agent_id
            )));
        }

        info!(agent_id = %card.agent_id, endpoint = %card.endpoint, "Registered own agent card");
        state.own = Some(card);
        Ok(())
    }

    /// This agent's own card, if registered
    pub fn self_card(&self) -> Option<AgentCard> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .own
            .clone()
    }

    /// Validate and insert or replace a peer card, returning the previous entry
    pub fn upsert_peer(&self, card: AgentCard) -> AgentResult<Option<AgentCard>> {
        if let Err(e) = card.validate() {
            warn!(agent_id = %card.agent_id, error = %e, "Rejected invalid peer card");
            return Err(e.into());
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state
            .own
            .as_ref()
            .is_some_and(|own| own.agent_id == card.agent_id)
        {
            return Err(CardError::SelfIdentity(card.agent_id).into());
        }

        let agent_id = card.agent_id.clone();
        let previous = state.peers.insert(agent_id.clone(), card);

        match &previous {
            None => info!(agent_id = %agent_id, "Registered new peer"),
            Some(old) => {
                let changed = state.peers.get(&agent_id) != Some(old);
                debug!(agent_id = %agent_id, changed, "Updated peer card");
            }
        }

        Ok(previous)
    }

    /// Get a peer card by id
    pub fn lookup(&self, agent_id: &str) -> AgentResult<AgentCard> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .peers
            .get(agent_id)
            .cloned()
            .ok_or_else(|| AgentError::agent_not_found(agent_id))
    }

    /// Peers advertising `capability` (case-insensitive), ordered by agent_id
    pub fn find_by_capability(&self, capability: &str) -> Vec<AgentCard> {
        let mut matches: Vec<AgentCard> = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .peers
            .values()
            .filter(|card| card.has_capability(capability))
            .cloned()
            .collect();

        matches.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        matches
    }

    /// All known peers, ordered by agent_id
    pub fn peers(&self) -> Vec<AgentCard> {
        let mut peers: Vec<AgentCard> = self
            .state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .peers
            .values()
            .cloned()
            .collect();

        peers.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        peers
    }

    pub fn peer_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .peers
            .len()
    }
}
