//! Capability handlers
//!
//! A handler turns the `parameters` of a task request into a result mapping or a
//! domain error. Handlers are registered into the `TaskProcessor` once at startup and
//! selected by `task_type`; they never see transport concerns.

use crate::config::LlmSection;
use crate::llm::provider::{CompletionRequest, LlmError, LlmProvider};
use crate::protocol::messages::Parameters;
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Domain failures of a capability handler, reported as `status=error`
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("Unknown task type: {0}")]
    UnknownTaskType(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Completion failed: {0}")]
    Completion(#[from] LlmError),

    #[error("Completion returned no content")]
    EmptyCompletion,

    #[error("Handler aborted: {0}")]
    Aborted(String),
}

impl HandlerError {
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput(message.into())
    }
}

/// Request-scoped facts a handler may stamp into its result
#[derive(Debug, Clone)]
pub struct HandlerContext {
    /// Id of the agent running the handler
    pub agent_id: String,
    pub task_id: String,
    pub requesting_agent: String,
}

/// A named function an agent can perform
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    /// Capability tag advertised in the agent card
    fn capability(&self) -> &str;

    /// Task types dispatched to this handler
    fn task_types(&self) -> Vec<String>;

    async fn handle(
        &self,
        context: &HandlerContext,
        parameters: &Parameters,
    ) -> Result<Parameters, HandlerError>;
}

/// The LLM-backed capabilities every agent binary knows how to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinCapability {
    Research,
    Analysis,
    Reporting,
}

impl BuiltinCapability {
    pub const ALL: [BuiltinCapability; 3] = [
        BuiltinCapability::Research,
        BuiltinCapability::Analysis,
        BuiltinCapability::Reporting,
    ];

    /// Resolve a capability tag (case-insensitive)
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|capability| capability.tag().eq_ignore_ascii_case(tag))
    }

    pub fn tag(&self) -> &'static str {
        match self {
            BuiltinCapability::Research => "research",
            BuiltinCapability::Analysis => "analysis",
            BuiltinCapability::Reporting => "reporting",
        }
    }

    pub fn task_types(&self) -> &'static [&'static str] {
        match self {
            BuiltinCapability::Research => &["research"],
            BuiltinCapability::Analysis => &["analyze", "analysis"],
            BuiltinCapability::Reporting => &["report", "reporting"],
        }
    }

    /// Task type a requester sends to invoke this capability
    pub fn primary_task_type(&self) -> &'static str {
        self.task_types()[0]
    }

    /// Build the completion prompt, returning the prompt and the input it was built from
    fn build_prompt(&self, parameters: &Parameters) -> Result<(String, String), HandlerError> {
        match self {
            BuiltinCapability::Research => {
                let topic = required_text(parameters, &["topic"])?;
                if topic.trim().is_empty() {
                    return Err(HandlerError::invalid_input("'topic' must not be empty"));
                }
                Ok((
                    format!("Research the topic: {topic}. Provide 3 key facts with sources."),
                    topic,
                ))
            }
            BuiltinCapability::Analysis => {
                let research = required_text(parameters, &["research_data"])?;
                Ok((
                    format!("Analyze this research data and provide key insights: {research}"),
                    research,
                ))
            }
            BuiltinCapability::Reporting => {
                let analysis = required_text(parameters, &["analysis_result", "analysis_data"])?;
                Ok((
                    format!("Create a brief executive report from this analysis: {analysis}"),
                    analysis,
                ))
            }
        }
    }

    fn shape_result(&self, agent_id: &str, input: String, completion: String) -> Parameters {
        let mut result = Parameters::new();
        match self {
            BuiltinCapability::Research => {
                result.insert("research_data".to_string(), Value::from(completion));
                result.insert("topic".to_string(), Value::from(input));
            }
            BuiltinCapability::Analysis => {
                result.insert("analysis_result".to_string(), Value::from(completion));
                result.insert(
                    "source_data_length".to_string(),
                    Value::from(input.chars().count()),
                );
            }
            BuiltinCapability::Reporting => {
                let length = completion.chars().count();
                result.insert("final_report".to_string(), Value::from(completion));
                result.insert("report_length".to_string(), Value::from(length));
            }
        }
        result.insert("agent_id".to_string(), Value::from(agent_id));
        result
    }
}

impl fmt::Display for BuiltinCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// First present string parameter among `keys`
fn required_text(parameters: &Parameters, keys: &[&str]) -> Result<String, HandlerError> {
    for key in keys {
        match parameters.get(*key) {
            Some(Value::String(text)) => return Ok(text.clone()),
            Some(Value::Null) | None => continue,
            Some(other) => {
                return Err(HandlerError::invalid_input(format!(
                    "'{key}' must be a string, got {other}"
                )))
            }
        }
    }
    Err(HandlerError::invalid_input(format!(
        "missing required parameter '{}'",
        keys[0]
    )))
}

/// Model settings shared by the LLM-backed handlers
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSettings {
    pub model: String,
    pub system_prompt: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl From<&LlmSection> for CompletionSettings {
    fn from(section: &LlmSection) -> Self {
        Self {
            model: section.model.clone(),
            system_prompt: section.system_prompt.clone(),
            temperature: section.temperature,
            max_tokens: section.max_tokens,
        }
    }
}

/// Runs a built-in capability against the completion provider
pub struct LlmCapabilityHandler {
    capability: BuiltinCapability,
    provider: Arc<dyn LlmProvider>,
    settings: CompletionSettings,
}

impl LlmCapabilityHandler {
    pub fn new(
        capability: BuiltinCapability,
        provider: Arc<dyn LlmProvider>,
        settings: CompletionSettings,
    ) -> Self {
        Self {
            capability,
            provider,
            settings,
        }
    }

    fn completion_request(&self, prompt: String) -> CompletionRequest {
        let mut request =
            CompletionRequest::prompt(&self.settings.model, &self.settings.system_prompt, prompt);
        request.temperature = self.settings.temperature;
        request.max_tokens = self.settings.max_tokens;
        request
    }
}

#[async_trait]
impl CapabilityHandler for LlmCapabilityHandler {
    fn capability(&self) -> &str {
        self.capability.tag()
    }

    fn task_types(&self) -> Vec<String> {
        self.capability
            .task_types()
            .iter()
            .map(|t| t.to_string())
            .collect()
    }

    async fn handle(
        &self,
        context: &HandlerContext,
        parameters: &Parameters,
    ) -> Result<Parameters, HandlerError> {
        let (prompt, input) = self.capability.build_prompt(parameters)?;
        debug!(
            capability = %self.capability,
            task_id = %context.task_id,
            prompt_chars = prompt.chars().count(),
            "Requesting completion"
        );

        let response = self
            .provider
            .complete(self.completion_request(prompt))
            .await?;
        let completion = response
            .content
            .filter(|c| !c.is_empty())
            .ok_or(HandlerError::EmptyCompletion)?;

        Ok(self
            .capability
            .shape_result(&context.agent_id, input, completion))
    }
}
