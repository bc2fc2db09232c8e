//! Declarative pipeline definitions
//!
//! A pipeline is an ordered list of steps. Each step names the capability that owns
//! it and a transform that turns the previous step's result (the seed, for the first
//! step) into this step's task parameters.

use super::PipelineError;
use crate::agent::handlers::BuiltinCapability;
use crate::protocol::Parameters;
use std::fmt;
use std::sync::Arc;

/// Maps the previous result mapping into the next step's parameters
#[derive(Clone)]
pub struct StepTransform(Arc<dyn Fn(&Parameters) -> Parameters + Send + Sync>);

impl StepTransform {
    pub fn new<F>(transform: F) -> Self
    where
        F: Fn(&Parameters) -> Parameters + Send + Sync + 'static,
    {
        Self(Arc::new(transform))
    }

    /// The previous result becomes the next input verbatim
    pub fn pass_through() -> Self {
        Self::new(Parameters::clone)
    }

    pub fn apply(&self, previous: &Parameters) -> Parameters {
        (self.0)(previous)
    }
}

impl Default for StepTransform {
    fn default() -> Self {
        Self::pass_through()
    }
}

impl fmt::Debug for StepTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StepTransform")
    }
}

/// One stage of a pipeline
#[derive(Debug, Clone)]
pub struct PipelineStep {
    /// Name of the run state while this step is in flight, e.g. "researching"
    pub phase: String,
    pub capability: String,
    pub task_type: String,
    pub transform: StepTransform,
}

impl PipelineStep {
    pub fn new(
        phase: impl Into<String>,
        capability: impl Into<String>,
        task_type: impl Into<String>,
    ) -> Self {
        Self {
            phase: phase.into(),
            capability: capability.into(),
            task_type: task_type.into(),
            transform: StepTransform::pass_through(),
        }
    }

    /// Step invoking one of the built-in capabilities with its primary task type
    pub fn builtin(phase: impl Into<String>, capability: BuiltinCapability) -> Self {
        Self::new(phase, capability.tag(), capability.primary_task_type())
    }

    pub fn with_transform(mut self, transform: StepTransform) -> Self {
        self.transform = transform;
        self
    }
}

/// A named, non-empty, ordered list of steps
#[derive(Debug, Clone)]
pub struct PipelineDefinition {
    name: String,
    steps: Vec<PipelineStep>,
}

impl PipelineDefinition {
    pub fn new(name: impl Into<String>, steps: Vec<PipelineStep>) -> Result<Self, PipelineError> {
        let name = name.into();
        if steps.is_empty() {
            return Err(PipelineError::InvalidDefinition(format!(
                "pipeline '{name}' has no steps"
            )));
        }
        if let Some(step) = steps
            .iter()
            .find(|step| step.capability.trim().is_empty() || step.task_type.trim().is_empty())
        {
            return Err(PipelineError::InvalidDefinition(format!(
                "step '{}' of pipeline '{name}' needs a capability and a task type",
                step.phase
            )));
        }

        Ok(Self { name, steps })
    }

    /// research → analyze → report, passing each result through unchanged
    pub fn research_analyze_report() -> Self {
        Self {
            name: "research-analyze-report".to_string(),
            steps: vec![
                PipelineStep::builtin("researching", BuiltinCapability::Research),
                PipelineStep::builtin("analyzing", BuiltinCapability::Analysis),
                PipelineStep::builtin("reporting", BuiltinCapability::Reporting),
            ],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[PipelineStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Never true for a constructed definition
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Capabilities the pipeline needs, in step order
    pub fn capabilities(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.capability.as_str()).collect()
    }
}
