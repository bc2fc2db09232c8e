//! Configuration loading and validation tests
//!
//! Tests focus on the observable outcome of loading a file: which configuration kind
//! it yields, which defaults apply and which mistakes are rejected.

use a2a_mesh::config::{
    AgentConfig, ConfigError, DemoConfig, LoadedConfig, OrchestratorConfig, ProviderKind,
};
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    writeln!(temp_file, "{content}").unwrap();
    temp_file
}

const AGENT_TOML: &str = r#"
[agent]
id = "researcher-001"
name = "Research Agent"
description = "Conducts research on given topics"
capabilities = ["research", "fact-finding", "web-search"]
endpoint = "http://localhost:8001"

[llm]
provider = "openai"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"

[network]
peers = ["http://localhost:8002", "http://localhost:8003"]
"#;

#[test]
fn test_agent_config_loads_from_file() {
    let temp_file = write_config(AGENT_TOML);

    let config = AgentConfig::load_from_file(temp_file.path()).unwrap();

    assert_eq!(config.agent.id, "researcher-001");
    assert_eq!(config.agent.version, "1.0.0");
    assert_eq!(config.llm.provider, ProviderKind::OpenAi);
    assert_eq!(config.network.request_timeout_ms, 30_000);
    assert_eq!(config.network.peers.len(), 2);
    assert_eq!(
        config.bind_address().unwrap(),
        "0.0.0.0:8001".parse::<std::net::SocketAddr>().unwrap()
    );

    let card = config.card();
    assert_eq!(card.communication_protocols, vec!["A2A-v1"]);
    assert!(card.has_capability("research"));
}

#[test]
fn test_loaded_config_detects_kind() {
    let agent = write_config(AGENT_TOML);
    let orchestrator = write_config(
        r#"
[orchestrator]
results_path = "out/results.json"

[network]
request_timeout_ms = 5000
peers = ["http://localhost:8001"]
"#,
    );
    let demo = write_config(
        r#"
[demo]
base_port = 9101
"#,
    );

    let loaded = LoadedConfig::load_from_file(agent.path()).unwrap();
    assert_eq!(loaded.kind(), "agent");

    match LoadedConfig::load_from_file(orchestrator.path()).unwrap() {
        LoadedConfig::Orchestrator(config) => {
            assert_eq!(config.orchestrator.id, "orchestrator");
            assert_eq!(
                config.orchestrator.results_path,
                Some(PathBuf::from("out/results.json"))
            );
            assert_eq!(config.network.request_timeout_ms, 5000);
        }
        other => panic!("Expected orchestrator config, got {}", other.kind()),
    }

    match LoadedConfig::load_from_file(demo.path()).unwrap() {
        LoadedConfig::Demo(config) => {
            let agents = config.agent_configs();
            assert_eq!(agents[2].agent.endpoint, "http://127.0.0.1:9103");
        }
        other => panic!("Expected demo config, got {}", other.kind()),
    }
}

#[test]
fn test_unknown_top_level_section_rejected() {
    let temp_file = write_config(
        r#"
[server]
port = 8080
"#,
    );

    let err = LoadedConfig::load_from_file(temp_file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidConfig(_)));
}

#[test]
fn test_missing_file_is_read_error() {
    let err = AgentConfig::load_from_file(std::path::Path::new("/nonexistent/a2a.toml"))
        .unwrap_err();
    assert!(matches!(err, ConfigError::FileRead(_)));
}

#[test]
fn test_malformed_toml_is_parse_error() {
    let temp_file = write_config("[agent\nid = ");

    let err = AgentConfig::load_from_file(temp_file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::TomlParse(_)));
}

#[test]
fn test_invalid_agent_id_rejected() {
    let content = AGENT_TOML.replace("researcher-001", "researcher 001");

    let err = AgentConfig::load_from_str(&content).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidAgentId(_)));
}

#[test]
fn test_invalid_endpoints_rejected() {
    let bad_endpoint = AGENT_TOML.replace(
        "endpoint = \"http://localhost:8001\"",
        "endpoint = \"localhost:8001\"",
    );
    assert!(matches!(
        AgentConfig::load_from_str(&bad_endpoint),
        Err(ConfigError::InvalidConfig(_))
    ));

    let bad_peer = AGENT_TOML.replace("http://localhost:8003", "ftp://localhost:8003");
    assert!(matches!(
        AgentConfig::load_from_str(&bad_peer),
        Err(ConfigError::InvalidConfig(_))
    ));
}

#[test]
fn test_azure_requires_base_url_and_api_version() {
    let content = AGENT_TOML.replace("provider = \"openai\"", "provider = \"azure-openai\"");

    let err = AgentConfig::load_from_str(&content).unwrap_err();
    assert!(err.to_string().contains("azure-openai"));
}

#[test]
fn test_zero_timeout_rejected() {
    let err = OrchestratorConfig::load_from_str(
        r#"
[orchestrator]

[network]
request_timeout_ms = 0
"#,
    )
    .unwrap_err();

    assert!(matches!(err, ConfigError::InvalidConfig(_)));
}

#[test]
fn test_demo_base_port_needs_room_for_three_agents() {
    let err = DemoConfig::load_from_str(
        r#"
[demo]
base_port = 65534
"#,
    )
    .unwrap_err();

    assert!(matches!(err, ConfigError::InvalidConfig(_)));
}

#[test]
fn test_shipped_configs_load() {
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("config");
    let expected = [
        ("researcher.toml", "agent"),
        ("analyst.toml", "agent"),
        ("reporter.toml", "agent"),
        ("orchestrator.toml", "orchestrator"),
        ("demo.toml", "demo"),
    ];

    for (file, kind) in expected {
        let loaded = LoadedConfig::load_from_file(&dir.join(file))
            .unwrap_or_else(|e| panic!("{file}: {e}"));
        assert_eq!(loaded.kind(), kind, "{file}");
    }
}
