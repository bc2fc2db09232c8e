//! Test helpers and utilities for integration tests

use a2a_mesh::config::{AgentConfig, AgentSection, LlmSection, NetworkSection};
use a2a_mesh::protocol::{AgentCard, Parameters};
use serde_json::Value;
use std::net::{SocketAddr, TcpListener};

/// Card for a peer on localhost
#[allow(dead_code)]
pub fn card(agent_id: &str, port: u16, capabilities: &[&str]) -> AgentCard {
    AgentCard::new(
        agent_id,
        agent_id,
        format!("http://localhost:{port}"),
        capabilities.iter().map(|c| c.to_string()).collect(),
    )
}

#[allow(dead_code)]
pub fn params(value: Value) -> Parameters {
    value.as_object().cloned().expect("params must be a JSON object")
}

/// A port nothing is listening on at the time of the call
#[allow(dead_code)]
pub fn free_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .and_then(|listener| listener.local_addr())
        .map(|addr| addr.port())
        .expect("ephemeral port")
}

/// Agent configuration advertising and binding `127.0.0.1:{port}`
#[allow(dead_code)]
pub fn agent_config(agent_id: &str, port: u16, capabilities: &[&str]) -> AgentConfig {
    AgentConfig {
        agent: AgentSection {
            id: agent_id.to_string(),
            name: format!("{agent_id} agent"),
            description: format!("Test agent {agent_id}"),
            version: "1.0.0".to_string(),
            capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
            endpoint: format!("http://127.0.0.1:{port}"),
            bind_addr: Some(SocketAddr::from(([127, 0, 0, 1], port))),
            authentication: None,
            metadata: None,
        },
        llm: LlmSection::default(),
        network: NetworkSection {
            request_timeout_ms: 5_000,
            peers: Vec::new(),
        },
    }
}
