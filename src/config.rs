//! TOML configuration for agents, orchestrators and the local demo mesh
//!
//! Secrets are never stored in the files: the `[llm]` section names the environment
//! variable holding the API key and it is resolved at runtime.

use crate::protocol::card::{validate_agent_id as validate_card_id, validate_endpoint, AgentCard};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default file written by a completed pipeline run
pub const DEFAULT_RESULTS_PATH: &str = "a2a_workflow_results.json";

/// Configuration of one agent runtime
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentConfig {
    pub agent: AgentSection,
    pub llm: LlmSection,
    #[serde(default)]
    pub network: NetworkSection,
}

/// Static identity the agent's own card is built from
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentSection {
    /// Agent identifier (must match [a-zA-Z0-9._-]+)
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_version")]
    pub version: String,
    pub capabilities: Vec<String>,
    /// Public base URL advertised to peers
    pub endpoint: String,
    /// Local listen address; defaults to all interfaces on the endpoint's port
    pub bind_addr: Option<SocketAddr>,
    pub authentication: Option<Value>,
    pub metadata: Option<Map<String, Value>>,
}

fn default_version() -> String {
    "1.0.0".to_string()
}

/// Which completion API the provider talks to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ProviderKind {
    #[serde(rename = "openai")]
    OpenAi,
    #[serde(rename = "azure-openai")]
    AzureOpenAi,
}

/// LLM section
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSection {
    pub provider: ProviderKind,
    /// Model name, or the deployment name for Azure OpenAI
    pub model: String,
    /// Environment variable containing the API key
    pub api_key_env: String,
    pub base_url: Option<String>,
    /// Required for Azure OpenAI
    pub api_version: Option<String>,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// Optional temperature (0.0 to 2.0)
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_system_prompt() -> String {
    "You are a helpful AI agent.".to_string()
}

fn default_llm_timeout_secs() -> u64 {
    60
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: None,
            api_version: None,
            system_prompt: default_system_prompt(),
            temperature: None,
            max_tokens: None,
            timeout_secs: default_llm_timeout_secs(),
        }
    }
}

/// Outbound call settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkSection {
    /// Upper bound of every outbound discovery or task call
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Peer base URLs to discover at startup
    #[serde(default)]
    pub peers: Vec<String>,
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for NetworkSection {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_request_timeout_ms(),
            peers: Vec::new(),
        }
    }
}

impl NetworkSection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "network.request_timeout_ms must be greater than zero".to_string(),
            ));
        }
        for peer in &self.peers {
            validate_endpoint(peer).map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
        }
        Ok(())
    }
}

/// Configuration of a pipeline orchestrator
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestratorConfig {
    pub orchestrator: OrchestratorSection,
    #[serde(default)]
    pub network: NetworkSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrchestratorSection {
    #[serde(default = "default_orchestrator_id")]
    pub id: String,
    #[serde(default = "default_orchestrator_name")]
    pub name: String,
    /// Endpoint advertised in the orchestrator's card during discovery
    #[serde(default = "default_orchestrator_endpoint")]
    pub endpoint: String,
    pub results_path: Option<PathBuf>,
}

fn default_orchestrator_id() -> String {
    "orchestrator".to_string()
}

fn default_orchestrator_name() -> String {
    "Workflow Orchestrator".to_string()
}

fn default_orchestrator_endpoint() -> String {
    "http://localhost:8000".to_string()
}

impl OrchestratorSection {
    /// Card the orchestrator presents to peers; it advertises coordination only
    pub fn to_card(&self) -> AgentCard {
        AgentCard::new(
            &self.id,
            &self.name,
            &self.endpoint,
            vec!["orchestration".to_string()],
        )
        .with_description("Coordinates multi-agent workflows")
    }
}

/// Configuration of the single-process demo mesh
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DemoConfig {
    #[serde(default)]
    pub demo: DemoSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub network: NetworkSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DemoSection {
    #[serde(default = "default_demo_host")]
    pub host: String,
    /// Port of the first agent; the others take the following ports
    #[serde(default = "default_base_port")]
    pub base_port: u16,
    #[serde(default = "default_results_path")]
    pub results_path: PathBuf,
}

fn default_demo_host() -> String {
    "127.0.0.1".to_string()
}

fn default_base_port() -> u16 {
    8001
}

fn default_results_path() -> PathBuf {
    PathBuf::from(DEFAULT_RESULTS_PATH)
}

impl Default for DemoSection {
    fn default() -> Self {
        Self {
            host: default_demo_host(),
            base_port: default_base_port(),
            results_path: default_results_path(),
        }
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid agent ID format: {0}")]
    InvalidAgentId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Any of the three configuration kinds, told apart by their top-level table
#[derive(Debug, Clone, PartialEq)]
pub enum LoadedConfig {
    Agent(AgentConfig),
    Orchestrator(OrchestratorConfig),
    Demo(DemoConfig),
}

impl LoadedConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let table: toml::Table = toml::from_str(&content)?;

        if table.contains_key("agent") {
            AgentConfig::load_from_str(&content).map(Self::Agent)
        } else if table.contains_key("orchestrator") {
            OrchestratorConfig::load_from_str(&content).map(Self::Orchestrator)
        } else if table.contains_key("demo") {
            DemoConfig::load_from_str(&content).map(Self::Demo)
        } else {
            Err(ConfigError::InvalidConfig(
                "expected an [agent], [orchestrator] or [demo] section".to_string(),
            ))
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            LoadedConfig::Agent(_) => "agent",
            LoadedConfig::Orchestrator(_) => "orchestrator",
            LoadedConfig::Demo(_) => "demo",
        }
    }
}

impl AgentConfig {
    /// Load and validate an agent configuration file
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content)
    }

    pub fn load_from_str(content: &str) -> Result<Self, ConfigError> {
        let config: AgentConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_agent_id(&self.agent.id)?;
        self.card()
            .validate()
            .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
        self.llm.validate()?;
        self.network.validate()
    }

    /// Build the agent's own card from the static identity
    pub fn card(&self) -> AgentCard {
        let section = &self.agent;
        let mut card = AgentCard::new(
            &section.id,
            &section.name,
            &section.endpoint,
            section.capabilities.clone(),
        )
        .with_description(&section.description)
        .with_version(&section.version);

        if let Some(authentication) = &section.authentication {
            card = card.with_authentication(authentication.clone());
        }
        if let Some(metadata) = &section.metadata {
            card = card.with_metadata(metadata.clone());
        }
        card
    }

    /// Listen address: explicit `bind_addr`, else all interfaces on the endpoint's port
    pub fn bind_address(&self) -> Result<SocketAddr, ConfigError> {
        if let Some(addr) = self.agent.bind_addr {
            return Ok(addr);
        }

        let url = url::Url::parse(&self.agent.endpoint)
            .map_err(|e| ConfigError::InvalidConfig(format!("agent.endpoint: {e}")))?;
        let port = url.port_or_known_default().ok_or_else(|| {
            ConfigError::InvalidConfig("agent.endpoint has no usable port".to_string())
        })?;

        Ok(SocketAddr::from(([0, 0, 0, 0], port)))
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[agent]
id = "researcher-001"
name = "Research Agent"
description = "Conducts research on given topics"
capabilities = ["research", "information_gathering"]
endpoint = "http://localhost:8001"

[llm]
provider = "openai"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

impl LlmSection {
    /// Get the API key from the configured environment variable
    pub fn api_key(&self) -> Result<String, ConfigError> {
        std::env::var(&self.api_key_env)
            .map_err(|_| ConfigError::EnvVarNotFound(self.api_key_env.clone()))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "llm.model must not be empty".to_string(),
            ));
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(ConfigError::InvalidConfig(format!(
                    "llm.temperature {temperature} is outside 0.0..=2.0"
                )));
            }
        }
        if self.provider == ProviderKind::AzureOpenAi
            && (self.base_url.is_none() || self.api_version.is_none())
        {
            return Err(ConfigError::InvalidConfig(
                "azure-openai requires llm.base_url and llm.api_version".to_string(),
            ));
        }
        Ok(())
    }
}

impl OrchestratorConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content)
    }

    pub fn load_from_str(content: &str) -> Result<Self, ConfigError> {
        let config: OrchestratorConfig = toml::from_str(content)?;
        validate_agent_id(&config.orchestrator.id)?;
        validate_endpoint(&config.orchestrator.endpoint)
            .map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
        config.network.validate()?;
        Ok(config)
    }
}

impl DemoConfig {
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::load_from_str(&content)
    }

    pub fn load_from_str(content: &str) -> Result<Self, ConfigError> {
        let config: DemoConfig = toml::from_str(content)?;
        if config.demo.base_port > u16::MAX - 2 {
            return Err(ConfigError::InvalidConfig(
                "demo.base_port leaves no room for three agents".to_string(),
            ));
        }
        config.llm.validate()?;
        config.network.validate()?;
        Ok(config)
    }

    fn endpoint(&self, port: u16) -> String {
        format!("http://{}:{port}", self.demo.host)
    }

    /// Researcher, analyst and reporter on three consecutive ports from `base_port`
    pub fn agent_configs(&self) -> Vec<AgentConfig> {
        let agents = [
            (
                "researcher-001",
                "Research Agent",
                "Conducts research on given topics",
                ["research", "fact-finding", "web-search"],
            ),
            (
                "analyst-001",
                "Analysis Agent",
                "Analyzes research data and provides insights",
                ["analysis", "insights", "data-processing"],
            ),
            (
                "reporter-001",
                "Report Agent",
                "Creates reports from analysis data",
                ["reporting", "document-generation", "summarization"],
            ),
        ];

        agents
            .into_iter()
            .enumerate()
            .map(|(offset, (id, name, description, capabilities))| AgentConfig {
                agent: AgentSection {
                    id: id.to_string(),
                    name: name.to_string(),
                    description: description.to_string(),
                    version: default_version(),
                    capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
                    endpoint: self.endpoint(self.demo.base_port + offset as u16),
                    bind_addr: None,
                    authentication: None,
                    metadata: None,
                },
                llm: self.llm.clone(),
                network: self.network.clone(),
            })
            .collect()
    }

    /// Orchestrator identity advertised on the port below the first agent
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            orchestrator: OrchestratorSection {
                id: default_orchestrator_id(),
                name: default_orchestrator_name(),
                endpoint: self.endpoint(self.demo.base_port.saturating_sub(1)),
                results_path: Some(self.demo.results_path.clone()),
            },
            network: NetworkSection {
                peers: self
                    .agent_configs()
                    .into_iter()
                    .map(|agent| agent.agent.endpoint)
                    .collect(),
                ..self.network.clone()
            },
        }
    }
}

fn validate_agent_id(agent_id: &str) -> Result<(), ConfigError> {
    validate_card_id(agent_id).map_err(|e| ConfigError::InvalidAgentId(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_config() {
        let toml_content = r#"
[agent]
id = "analyst-001"
name = "Analysis Agent"
description = "Analyzes research data and provides insights"
version = "1.2.0"
capabilities = ["analysis", "insights"]
endpoint = "http://localhost:8002"
bind_addr = "127.0.0.1:9002"

[agent.metadata]
team = "insights"

[llm]
provider = "azure-openai"
model = "gpt-4o"
api_key_env = "AZURE_OPENAI_API_KEY"
base_url = "https://example.openai.azure.com"
api_version = "2024-02-15-preview"
temperature = 0.7
max_tokens = 800

[network]
request_timeout_ms = 5000
peers = ["http://localhost:8001", "http://localhost:8003"]
"#;

        let config = AgentConfig::load_from_str(toml_content).unwrap();
        assert_eq!(config.agent.id, "analyst-001");
        assert_eq!(config.llm.provider, ProviderKind::AzureOpenAi);
        assert_eq!(config.llm.temperature, Some(0.7));
        assert_eq!(config.network.peers.len(), 2);
        assert_eq!(config.network.request_timeout(), Duration::from_millis(5000));
        assert_eq!(
            config.bind_address().unwrap(),
            "127.0.0.1:9002".parse::<SocketAddr>().unwrap()
        );

        let card = config.card();
        assert_eq!(card.version, "1.2.0");
        assert_eq!(card.metadata.unwrap()["team"], "insights");
    }

    #[test]
    fn test_minimal_agent_config_defaults() {
        let config = AgentConfig::test_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.version, "1.0.0");
        assert_eq!(config.llm.timeout_secs, 60);
        assert_eq!(config.network.request_timeout_ms, 30_000);
        assert!(config.network.peers.is_empty());
        assert_eq!(
            config.bind_address().unwrap(),
            "0.0.0.0:8001".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_invalid_agent_id() {
        let mut config = AgentConfig::test_config();
        config.agent.id = "invalid@agent".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidAgentId(_))
        ));
    }

    #[test]
    fn test_endpoint_with_path_rejected() {
        let mut config = AgentConfig::test_config();
        config.agent.endpoint = "http://localhost:8001/agent".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_empty_capabilities_rejected() {
        let mut config = AgentConfig::test_config();
        config.agent.capabilities.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_azure_requires_base_url_and_version() {
        let mut config = AgentConfig::test_config();
        config.llm.provider = ProviderKind::AzureOpenAi;
        assert!(config.validate().is_err());

        config.llm.base_url = Some("https://example.openai.azure.com".to_string());
        config.llm.api_version = Some("2024-02-15-preview".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_temperature_range() {
        let mut config = AgentConfig::test_config();
        config.llm.temperature = Some(2.5);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bad_peer_rejected() {
        let mut config = AgentConfig::test_config();
        config.network.peers.push("localhost:8002".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_orchestrator_defaults() {
        let config = OrchestratorConfig::load_from_str(
            r#"
[orchestrator]
results_path = "out.json"

[network]
peers = ["http://a", "http://b", "http://c"]
"#,
        )
        .unwrap();

        assert_eq!(config.orchestrator.id, "orchestrator");
        assert_eq!(config.orchestrator.endpoint, "http://localhost:8000");
        assert_eq!(config.orchestrator.results_path, Some(PathBuf::from("out.json")));
        assert!(config.orchestrator.to_card().validate().is_ok());
    }

    #[test]
    fn test_demo_defaults() {
        let config = DemoConfig::load_from_str("[demo]\n").unwrap();
        assert_eq!(config.demo.host, "127.0.0.1");
        assert_eq!(config.demo.base_port, 8001);
        assert_eq!(config.demo.results_path, PathBuf::from(DEFAULT_RESULTS_PATH));
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn test_demo_mesh_layout() {
        let demo = DemoConfig::default();
        let agents = demo.agent_configs();

        assert_eq!(agents.len(), 3);
        assert_eq!(agents[0].agent.endpoint, "http://127.0.0.1:8001");
        assert_eq!(agents[2].agent.endpoint, "http://127.0.0.1:8003");
        assert_eq!(agents[1].agent.capabilities[0], "analysis");
        for agent in &agents {
            assert!(agent.validate().is_ok());
        }

        let orchestrator = demo.orchestrator_config();
        assert_eq!(orchestrator.orchestrator.endpoint, "http://127.0.0.1:8000");
        assert_eq!(orchestrator.network.peers.len(), 3);
        assert_eq!(
            orchestrator.orchestrator.results_path.as_deref(),
            Some(Path::new(DEFAULT_RESULTS_PATH))
        );
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let result = DemoConfig::load_from_str(
            r#"
[llm]
provider = "anthropic"
model = "x"
api_key_env = "X"
"#,
        );
        assert!(matches!(result, Err(ConfigError::TomlParse(_))));
    }

    #[test]
    fn test_missing_env_var() {
        let mut llm = LlmSection::default();
        llm.api_key_env = "A2A_MESH_TEST_KEY_THAT_DOES_NOT_EXIST".to_string();
        assert!(matches!(llm.api_key(), Err(ConfigError::EnvVarNotFound(_))));
    }
}
