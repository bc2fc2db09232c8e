//! AgentCard: identity and capability advertisement
//!
//! An agent builds its own card once at startup from static configuration and hands
//! copies of it to peers during discovery. Peers never mutate a card they receive; they
//! validate it and store it in their registry.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use url::Url;

/// Protocol identifier advertised when a card does not name one
pub const DEFAULT_PROTOCOL: &str = "A2A-v1";

/// Self-description of an agent
///
/// # Examples
/// ```
/// use a2a_mesh::protocol::AgentCard;
///
/// let card = AgentCard::new(
///     "researcher-001",
///     "Research Agent",
///     "http://localhost:8001",
///     vec!["research".to_string()],
/// );
/// assert!(card.validate().is_ok());
/// assert!(card.has_capability("Research"));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentCard {
    /// Globally unique, immutable agent identifier
    pub agent_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Semantic version string
    #[serde(default)]
    pub version: String,
    /// Capability tags, e.g. "research", "analysis", "reporting"
    pub capabilities: Vec<String>,
    #[serde(default = "default_protocols")]
    pub communication_protocols: Vec<String>,
    /// Base URL of the agent's protocol endpoints, no trailing path
    pub endpoint: String,
    /// Opaque credential descriptor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

fn default_protocols() -> Vec<String> {
    vec![DEFAULT_PROTOCOL.to_string()]
}

/// Reasons a card is rejected at the boundary
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CardError {
    #[error("agent_id '{0}' must match pattern [a-zA-Z0-9._-]+")]
    InvalidAgentId(String),
    #[error("agent '{0}' has an empty name")]
    EmptyName(String),
    #[error("agent '{0}' advertises no capabilities")]
    NoCapabilities(String),
    #[error("agent '{0}' advertises a blank capability tag")]
    BlankCapability(String),
    #[error("endpoint '{endpoint}' is not a valid base URL: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("peer card reuses this agent's own id '{0}'")]
    SelfIdentity(String),
}

impl AgentCard {
    /// Create a card with the required fields; the rest take their defaults
    pub fn new(
        agent_id: impl Into<String>,
        name: impl Into<String>,
        endpoint: impl Into<String>,
        capabilities: Vec<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            name: name.into(),
            description: String::new(),
            version: "1.0.0".to_string(),
            capabilities,
            communication_protocols: default_protocols(),
            endpoint: endpoint.into(),
            authentication: None,
            metadata: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_authentication(mut self, authentication: Value) -> Self {
        self.authentication = Some(authentication);
        self
    }

    pub fn with_metadata(mut self, metadata: Map<String, Value>) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Check every card invariant
    pub fn validate(&self) -> Result<(), CardError> {
        validate_agent_id(&self.agent_id)?;

        if self.name.trim().is_empty() {
            return Err(CardError::EmptyName(self.agent_id.clone()));
        }

        if self.capabilities.is_empty() {
            return Err(CardError::NoCapabilities(self.agent_id.clone()));
        }
        if self.capabilities.iter().any(|c| c.trim().is_empty()) {
            return Err(CardError::BlankCapability(self.agent_id.clone()));
        }

        validate_endpoint(&self.endpoint)
    }

    /// Check if the card advertises a capability (case-insensitive)
    pub fn has_capability(&self, capability: &str) -> bool {
        let wanted = capability.to_lowercase();
        self.capabilities.iter().any(|c| c.to_lowercase() == wanted)
    }
}

/// Validate an agent identifier against `[a-zA-Z0-9._-]+`
pub fn validate_agent_id(agent_id: &str) -> Result<(), CardError> {
    let valid_chars = agent_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if agent_id.is_empty() || !valid_chars {
        return Err(CardError::InvalidAgentId(agent_id.to_string()));
    }

    Ok(())
}

/// Validate that an endpoint is an http(s) base URL without path, query or fragment
pub fn validate_endpoint(endpoint: &str) -> Result<(), CardError> {
    let invalid = |reason: &str| CardError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        reason: reason.to_string(),
    };

    let url = Url::parse(endpoint).map_err(|e| invalid(&e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid("scheme must be http or https"));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host"));
    }
    if url.path() != "/" || endpoint.ends_with('/') {
        return Err(invalid("base URL must not carry a path"));
    }
    if url.query().is_some() || url.fragment().is_some() {
        return Err(invalid("base URL must not carry a query or fragment"));
    }

    Ok(())
}
