//! A2A Mesh - agent-to-agent protocol over HTTP
//!
//! Independent agents advertise their capabilities in an `AgentCard`, discover each
//! other by exchanging cards, and exchange correlated task requests and responses.
//! An orchestrator composes several agents into a sequential pipeline.
//!
//! # Overview
//!
//! - `protocol`: wire types (`AgentCard`, `TaskRequest`, `TaskResponse`, envelopes)
//! - `agent`: registry, capability handlers, task processor, client and runtime
//! - `transport`: the `PeerTransport` seam with its reqwest client and warp server
//! - `orchestrator`: declarative pipelines, run state machine, results document
//! - `llm`: the completion capability consumed by the built-in handlers
//!
//! # Quick Start
//!
//! ```rust
//! use a2a_mesh::protocol::{TaskRequest, TaskResponse};
//! use serde_json::json;
//!
//! let params = json!({"topic": "OpenTelemetry"}).as_object().cloned().unwrap();
//! let request = TaskRequest::new("orchestrator", "researcher-001", "research", params);
//!
//! let result = json!({"research_data": "..."}).as_object().cloned().unwrap();
//! let response = TaskResponse::success(&request.task_id, "researcher-001", result);
//!
//! // Callers reject responses that do not answer their request
//! assert!(response.validate_for(&request.task_id).is_ok());
//! assert!(response.validate_for("some-other-task").is_err());
//! ```

pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod observability;
pub mod orchestrator;
pub mod protocol;
pub mod testing;
pub mod transport;

pub use agent::{AgentClient, AgentRegistry, AgentRuntime, TaskProcessor};
pub use config::*;
pub use error::{AgentError, AgentResult, TransportError};
pub use orchestrator::{Orchestrator, PipelineDefinition, PipelineError, PipelineRun};
pub use protocol::*;
