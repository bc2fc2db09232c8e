//! Error taxonomy for the agent protocol
//!
//! Transport, configuration and protocol errors propagate to the immediate caller.
//! Handler-domain failures never appear here: they are carried inside a
//! `TaskResponse` with `status=error` (see `agent::processor`).

use crate::config::ConfigError;
use crate::protocol::card::CardError;
use regex::Regex;
use std::sync::OnceLock;
use thiserror::Error;

/// Maximum length of an error message put on the wire
const MAX_WIRE_ERROR_LEN: usize = 500;

/// Failures of a single outbound HTTP exchange
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransportError {
    #[error("request to {url} timed out after {timeout_ms}ms")]
    Timeout { url: String, timeout_ms: u64 },

    #[error("could not reach {url}: {message}")]
    Unreachable { url: String, message: String },

    #[error("{url} answered HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("malformed response from {url}: {message}")]
    MalformedBody { url: String, message: String },
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}

/// Main error type for agent protocol operations
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Invalid agent card: {0}")]
    InvalidCard(#[from] CardError),

    #[error("Agent not found: {agent_id}")]
    AgentNotFound { agent_id: String },

    #[error("No known agent advertises capability '{capability}'")]
    MissingCapability { capability: String },

    #[error("Discovery with {endpoint} failed: {source}")]
    Discovery {
        endpoint: String,
        source: Box<AgentError>,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Protocol violation: {message}")]
    ProtocolViolation { message: String },
}

impl From<ConfigError> for AgentError {
    fn from(error: ConfigError) -> Self {
        Self::Configuration {
            message: error.to_string(),
        }
    }
}

impl AgentError {
    /// Create configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create agent not found error
    pub fn agent_not_found<S: Into<String>>(agent_id: S) -> Self {
        Self::AgentNotFound {
            agent_id: agent_id.into(),
        }
    }

    /// Create missing capability error
    pub fn missing_capability<S: Into<String>>(capability: S) -> Self {
        Self::MissingCapability {
            capability: capability.into(),
        }
    }

    /// Create protocol violation error
    pub fn protocol_violation<S: Into<String>>(message: S) -> Self {
        Self::ProtocolViolation {
            message: message.into(),
        }
    }

    /// Wrap the cause of a failed discovery exchange
    pub fn discovery<S: Into<String>>(endpoint: S, cause: AgentError) -> Self {
        Self::Discovery {
            endpoint: endpoint.into(),
            source: Box::new(cause),
        }
    }

    /// True for failures of the outbound call itself, including discovery transport
    pub fn is_transport(&self) -> bool {
        match self {
            AgentError::Transport(_) => true,
            AgentError::Discovery { source, .. } => source.is_transport(),
            _ => false,
        }
    }
}

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;

fn secret_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").expect("static regex is valid")
    })
}

fn sensitive_path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
            .expect("static regex is valid")
    })
}

/// Sanitize an error message before it leaves the agent in a task response
pub fn sanitize_error_message(message: &str) -> String {
    let sanitized = secret_pattern().replace_all(message, "${1}=***");
    let mut sanitized = sensitive_path_pattern()
        .replace_all(&sanitized, "/***REDACTED***/")
        .to_string();

    if sanitized.len() > MAX_WIRE_ERROR_LEN {
        let truncate_suffix = "...[truncated]";
        let mut cut = MAX_WIRE_ERROR_LEN - truncate_suffix.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str(truncate_suffix);
    }

    sanitized
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_constructors_and_display() {
        assert_eq!(
            AgentError::agent_not_found("analyst-001").to_string(),
            "Agent not found: analyst-001"
        );
        assert_eq!(
            AgentError::missing_capability("reporting").to_string(),
            "No known agent advertises capability 'reporting'"
        );
        assert_eq!(
            AgentError::protocol_violation("task_id mismatch").to_string(),
            "Protocol violation: task_id mismatch"
        );
        assert_eq!(
            AgentError::configuration("missing endpoint").to_string(),
            "Configuration error: missing endpoint"
        );
    }

    #[test]
    fn test_discovery_error_keeps_cause() {
        let cause = AgentError::Transport(TransportError::Unreachable {
            url: "http://a/discover".to_string(),
            message: "connection refused".to_string(),
        });
        let error = AgentError::discovery("http://a", cause);

        assert!(error.to_string().contains("http://a"));
        assert!(error.to_string().contains("connection refused"));
        assert!(error.source().is_some());
        assert!(error.is_transport());
    }

    #[test]
    fn test_invalid_card_discovery_is_not_transport() {
        let error = AgentError::discovery(
            "http://a",
            AgentError::InvalidCard(CardError::NoCapabilities("a".to_string())),
        );
        assert!(!error.is_transport());
    }

    #[test]
    fn test_timeout_detection() {
        let error = TransportError::Timeout {
            url: "http://a/task".to_string(),
            timeout_ms: 250,
        };
        assert!(error.is_timeout());
        assert!(error.to_string().contains("250ms"));
    }

    #[test]
    fn test_error_message_sanitization() {
        let sanitized =
            sanitize_error_message("Failed to authenticate: password=secret123 token=abc456");

        assert!(!sanitized.contains("secret123"));
        assert!(!sanitized.contains("abc456"));
        assert!(sanitized.contains("password=***"));
        assert!(sanitized.contains("token=***"));
    }

    #[test]
    fn test_sanitize_with_colons() {
        let sanitized = sanitize_error_message("api_key: sk-live-123 rejected");
        assert!(!sanitized.contains("sk-live-123"));
    }

    #[test]
    fn test_file_path_redaction() {
        let sanitized =
            sanitize_error_message("Failed to read /home/user/.ssh/id_rsa and /etc/secrets/api.key");

        assert!(sanitized.contains("/***REDACTED***/"));
        assert!(!sanitized.contains("/home/user/.ssh/id_rsa"));
    }

    #[test]
    fn test_plain_messages_untouched() {
        assert_eq!(sanitize_error_message("rate limited"), "rate limited");
        assert_eq!(sanitize_error_message(""), "");
    }

    #[test]
    fn test_long_message_truncation() {
        let sanitized = sanitize_error_message(&"x".repeat(600));
        assert!(sanitized.len() <= MAX_WIRE_ERROR_LEN);
        assert!(sanitized.ends_with("...[truncated]"));

        let exact = sanitize_error_message(&"x".repeat(MAX_WIRE_ERROR_LEN));
        assert_eq!(exact.len(), MAX_WIRE_ERROR_LEN);
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let sanitized = sanitize_error_message(&"é".repeat(400));
        assert!(sanitized.len() <= MAX_WIRE_ERROR_LEN);
        assert!(sanitized.ends_with("...[truncated]"));
    }
}
