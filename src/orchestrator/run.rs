//! State of one pipeline run

use super::{PipelineError, PipelineOutput};
use crate::error::AgentError;
use crate::protocol::{new_task_id, now_timestamp, Parameters};
use serde::Serialize;
use std::fmt;

/// Where a run is in its lifecycle
///
/// `Running` carries the index and phase name of the step in flight, so the
/// reference pipeline moves through `researching`, `analyzing` and `reporting`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PipelineState {
    NotStarted,
    Running { step: usize, phase: String },
    Completed,
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Completed | PipelineState::Failed)
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::NotStarted => write!(f, "not_started"),
            PipelineState::Running { phase, .. } => write!(f, "{phase}"),
            PipelineState::Completed => write!(f, "completed"),
            PipelineState::Failed => write!(f, "failed"),
        }
    }
}

/// Why a run ended in `Failed`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureCause {
    /// No known agent advertises the step's capability; nothing was sent
    MissingCapability(String),
    /// Transport failure, timeout or protocol violation of the step's call
    Transport(String),
    /// The agent answered `status=error` with this message
    Reported(String),
    /// The agent answered `status=in_progress`
    NotFinal,
    Cancelled,
}

impl FailureCause {
    pub(crate) fn from_agent_error(error: &AgentError) -> Self {
        match error {
            AgentError::MissingCapability { capability } => {
                FailureCause::MissingCapability(capability.clone())
            }
            other => FailureCause::Transport(other.to_string()),
        }
    }
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::MissingCapability(capability) => {
                write!(f, "no known agent advertises capability '{capability}'")
            }
            FailureCause::Transport(message) | FailureCause::Reported(message) => {
                write!(f, "{message}")
            }
            FailureCause::NotFinal => write!(f, "agent answered in_progress"),
            FailureCause::Cancelled => write!(f, "run cancelled"),
        }
    }
}

/// The first failure of a run, with the identity of the failing step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineFailure {
    pub step: usize,
    pub phase: String,
    pub capability: String,
    /// Agent the step was routed to, if one was resolved
    pub agent_id: Option<String>,
    pub cause: FailureCause,
}

impl fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "step {} '{}' ({}) failed: {}",
            self.step + 1,
            self.phase,
            self.capability,
            self.cause
        )
    }
}

/// Outcome of one successful step
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub phase: String,
    pub capability: String,
    pub agent_id: String,
    pub endpoint: String,
    pub task_id: String,
    pub result: Parameters,
    pub completed_at: String,
}

/// One end-to-end execution of a pipeline, owned by the run that created it
#[derive(Debug, Clone, Serialize)]
pub struct PipelineRun {
    pub run_id: String,
    pub pipeline: String,
    pub seed: Parameters,
    pub state: PipelineState,
    pub steps: Vec<StepRecord>,
    pub failure: Option<PipelineFailure>,
    pub started_at: String,
    pub finished_at: Option<String>,
}

impl PipelineRun {
    pub(crate) fn new(pipeline: impl Into<String>, seed: Parameters) -> Self {
        Self {
            run_id: new_task_id(),
            pipeline: pipeline.into(),
            seed,
            state: PipelineState::NotStarted,
            steps: Vec::new(),
            failure: None,
            started_at: now_timestamp(),
            finished_at: None,
        }
    }

    pub(crate) fn begin_step(&mut self, step: usize, phase: &str) {
        debug_assert!(!self.state.is_terminal());
        self.state = PipelineState::Running {
            step,
            phase: phase.to_string(),
        };
    }

    pub(crate) fn record_step(&mut self, record: StepRecord) {
        self.steps.push(record);
    }

    pub(crate) fn fail(&mut self, failure: PipelineFailure) {
        self.state = PipelineState::Failed;
        self.failure = Some(failure);
        self.finished_at = Some(now_timestamp());
    }

    pub(crate) fn complete(&mut self) {
        self.state = PipelineState::Completed;
        self.finished_at = Some(now_timestamp());
    }

    pub fn is_completed(&self) -> bool {
        self.state == PipelineState::Completed
    }

    /// Result of the last step, once the run has completed
    pub fn final_result(&self) -> Option<&Parameters> {
        if self.is_completed() {
            self.steps.last().map(|step| &step.result)
        } else {
            None
        }
    }

    /// Distinct agent ids that completed a step, in step order
    pub fn agents_used(&self) -> Vec<String> {
        let mut agents: Vec<String> = Vec::new();
        for step in &self.steps {
            if !agents.contains(&step.agent_id) {
                agents.push(step.agent_id.clone());
            }
        }
        agents
    }

    /// Convert a terminal run into its output or the error that ended it
    pub fn into_output(self) -> Result<PipelineOutput, PipelineError> {
        match self.state {
            PipelineState::Completed => {
                let final_result = self
                    .steps
                    .last()
                    .map(|step| step.result.clone())
                    .unwrap_or_default();
                Ok(PipelineOutput {
                    run_id: self.run_id,
                    final_result,
                    steps: self.steps,
                })
            }
            _ => match self.failure {
                Some(PipelineFailure {
                    cause: FailureCause::MissingCapability(capability),
                    ..
                }) => Err(AgentError::missing_capability(capability).into()),
                Some(failure) => Err(PipelineError::Failed(failure)),
                None => Err(PipelineError::NotFinished(self.state.to_string())),
            },
        }
    }
}
