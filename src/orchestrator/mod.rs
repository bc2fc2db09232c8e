//! Pipeline orchestration over discovered agents
//!
//! The orchestrator owns no capability. It resolves one agent per pipeline step from
//! its registry, then sends the steps strictly in order, feeding each result through
//! the next step's transform. The first step that does not succeed ends the run.

pub mod discovery;
pub mod executor;
pub mod pipeline;
pub mod results;
pub mod run;

pub use discovery::{discover_full_mesh, discover_peers, DiscoveryReport};
pub use executor::Orchestrator;
pub use pipeline::{PipelineDefinition, PipelineStep, StepTransform};
pub use results::ResultsWriter;
pub use run::{FailureCause, PipelineFailure, PipelineRun, PipelineState, StepRecord};

use crate::error::AgentError;
use crate::protocol::Parameters;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Result of a completed run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineOutput {
    pub run_id: String,
    /// Result mapping of the last step
    pub final_result: Parameters,
    /// Every step's record, including the last
    pub steps: Vec<StepRecord>,
}

/// Pipeline-level errors
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid pipeline definition: {0}")]
    InvalidDefinition(String),

    #[error(transparent)]
    Agent(#[from] AgentError),

    #[error("Pipeline {0}")]
    Failed(PipelineFailure),

    #[error("Pipeline run not finished (state {0})")]
    NotFinished(String),

    #[error("Failed to write results to {path}: {message}")]
    Results { path: PathBuf, message: String },
}

impl PipelineError {
    /// The failing step, for runs that reached a step
    pub fn failure(&self) -> Option<&PipelineFailure> {
        match self {
            PipelineError::Failed(failure) => Some(failure),
            _ => None,
        }
    }
}
