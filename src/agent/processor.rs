//! Inbound task processing
//!
//! The `TaskProcessor` owns the task-type → handler table built once at startup and
//! turns every well-formed `TaskRequest` into exactly one `TaskResponse`. Handler
//! failures of any kind, including an unknown task type or a panicking handler, are
//! reported as `status=error` and never as a transport fault.

use crate::agent::handlers::{
    BuiltinCapability, CapabilityHandler, CompletionSettings, HandlerContext, HandlerError,
    LlmCapabilityHandler,
};
use crate::error::{sanitize_error_message, AgentError, AgentResult};
use crate::llm::provider::LlmProvider;
use crate::observability::task_span;
use crate::protocol::card::AgentCard;
use crate::protocol::messages::{Parameters, TaskRequest, TaskResponse};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn, Instrument};

/// Dispatches task requests to registered capability handlers
pub struct TaskProcessor {
    agent_id: String,
    handlers: HashMap<String, Arc<dyn CapabilityHandler>>,
}

impl TaskProcessor {
    /// Create a processor with no handlers
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            handlers: HashMap::new(),
        }
    }

    /// Register the built-in LLM handler for every capability tag on `card` that names one
    pub fn with_builtin_handlers(
        card: &AgentCard,
        provider: Arc<dyn LlmProvider>,
        settings: CompletionSettings,
    ) -> AgentResult<Self> {
        let mut processor = Self::new(&card.agent_id);

        for tag in &card.capabilities {
            match BuiltinCapability::from_tag(tag) {
                Some(capability) => processor.register(Arc::new(LlmCapabilityHandler::new(
                    capability,
                    provider.clone(),
                    settings.clone(),
                )))?,
                None => info!(capability = %tag, "Capability advertised without a local handler"),
            }
        }

        Ok(processor)
    }

    /// Map every task type the handler declares to it
    pub fn register(&mut self, handler: Arc<dyn CapabilityHandler>) -> AgentResult<()> {
        for task_type in handler.task_types() {
            let key = task_type.to_lowercase();
            if let Some(existing) = self.handlers.get(&key) {
                return Err(AgentError::configuration(format!(
                    "task type '{key}' already handled by capability '{}'",
                    existing.capability()
                )));
            }
            self.handlers.insert(key, handler.clone());
        }

        info!(
            agent_id = %self.agent_id,
            capability = handler.capability(),
            "Registered capability handler"
        );
        Ok(())
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    /// Task types this processor accepts, sorted
    pub fn task_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.handlers.keys().cloned().collect();
        types.sort();
        types
    }

    /// Process one request: received → processing → succeeded | failed
    pub async fn handle(&self, request: TaskRequest) -> TaskResponse {
        let span = task_span!(
            task_id = %request.task_id,
            task_type = %request.task_type,
            requesting_agent = %request.requesting_agent,
            agent_id = %self.agent_id
        );

        async move {
            let started = Instant::now();
            let task_id = request.task_id.clone();

            let response = match self.run_handler(request).await {
                Ok(result) => TaskResponse::success(&task_id, &self.agent_id, result),
                Err(e) => {
                    warn!(error = %e, "Task handler failed");
                    let message = sanitize_error_message(&e.to_string());
                    TaskResponse::failure(&task_id, &self.agent_id, message)
                }
            };

            info!(
                status = %response.status,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Task processed"
            );
            response
        }
        .instrument(span)
        .await
    }

    async fn run_handler(
        &self,
        request: TaskRequest,
    ) -> Result<Parameters, HandlerError> {
        let handler = self
            .handlers
            .get(&request.task_type.to_lowercase())
            .cloned()
            .ok_or_else(|| HandlerError::UnknownTaskType(request.task_type.clone()))?;

        let context = HandlerContext {
            agent_id: self.agent_id.clone(),
            task_id: request.task_id,
            requesting_agent: request.requesting_agent,
        };
        let parameters = request.parameters;

        // Isolated so a panicking handler still yields a response
        let outcome = tokio::spawn(
            async move { handler.handle(&context, &parameters).await }.in_current_span(),
        )
        .await;

        match outcome {
            Ok(result) => result,
            Err(join_error) => {
                error!(error = %join_error, "Capability handler aborted");
                Err(HandlerError::Aborted(join_error.to_string()))
            }
        }
    }
}
