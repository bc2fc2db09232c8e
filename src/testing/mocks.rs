//! Mock implementations for testing
//!
//! `MockLlmProvider` stands in for a model backend and `MockTransport` for a set of
//! remote peers, so the processor, client and orchestrator can be exercised without
//! network access or API keys.

use crate::error::TransportError;
use crate::llm::provider::{
    CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, TokenUsage,
};
use crate::protocol::{
    AgentCard, DiscoveryAck, HealthReport, Parameters, TaskRequest, TaskResponse,
};
use crate::transport::PeerTransport;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// What the mock model answers with
#[derive(Debug, Clone)]
enum MockCompletion {
    /// Cycle through canned responses
    Canned(Vec<String>),
    /// Answer with the last user prompt
    Echo,
    Fail(LlmError),
}

/// Mock LLM provider for testing
#[derive(Debug, Clone)]
pub struct MockLlmProvider {
    completion: MockCompletion,
    delay: Option<Duration>,
    current_response: Arc<Mutex<usize>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockLlmProvider {
    fn with_completion(completion: MockCompletion) -> Self {
        Self {
            completion,
            delay: None,
            current_response: Arc::new(Mutex::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn new(responses: Vec<String>) -> Self {
        Self::with_completion(MockCompletion::Canned(responses))
    }

    pub fn single_response(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Provider whose completion is the prompt it was given
    pub fn echo() -> Self {
        Self::with_completion(MockCompletion::Echo)
    }

    pub fn with_failure() -> Self {
        Self::failing_with(LlmError::RequestFailed("Mock LLM failure".to_string()))
    }

    pub fn failing_with(error: LlmError) -> Self {
        Self::with_completion(MockCompletion::Fail(error))
    }

    /// Sleep before answering each completion
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// User prompts received so far, in order
    pub async fn prompts(&self) -> Vec<String> {
        self.prompts.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.prompts.lock().await.len()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let prompt = request.last_user_prompt().unwrap_or_default().to_string();
        self.prompts.lock().await.push(prompt.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let content = match &self.completion {
            MockCompletion::Fail(error) => return Err(error.clone()),
            MockCompletion::Echo => prompt,
            MockCompletion::Canned(responses) if responses.is_empty() => {
                "Mock response".to_string()
            }
            MockCompletion::Canned(responses) => {
                let mut current = self.current_response.lock().await;
                let content = responses[*current % responses.len()].clone();
                *current += 1;
                content
            }
        };

        Ok(CompletionResponse {
            content: Some(content),
            model: "mock-model".to_string(),
            usage: TokenUsage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            },
            finish_reason: FinishReason::Stop,
            metadata: HashMap::new(),
        })
    }

    async fn health_check(&self) -> Result<(), LlmError> {
        match &self.completion {
            MockCompletion::Fail(error) => Err(error.clone()),
            _ => Ok(()),
        }
    }
}

/// How a mock peer answers
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Task succeeds with this result
    Success(Parameters),
    /// Task succeeds with the request parameters as its result
    Echo,
    /// Task answered with `status=error`
    Failure(String),
    InProgress,
    /// Task answered with a task id the requester never sent
    WrongTaskId,
    /// Every call to the peer fails at the transport level
    Transport(TransportError),
    /// Every call to the peer never completes
    Hang,
}

/// A call observed by the mock transport
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    FetchCard,
    Discover(AgentCard),
    Task(TaskRequest),
    Health,
}

#[derive(Debug, Clone)]
struct MockPeer {
    card: AgentCard,
    reply: MockReply,
}

/// In-memory peers addressed by endpoint
#[derive(Debug, Default)]
pub struct MockTransport {
    peers: Mutex<HashMap<String, MockPeer>>,
    calls: Mutex<Vec<(String, MockCall)>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a peer reachable at `card.endpoint`
    pub fn with_peer(mut self, card: AgentCard, reply: MockReply) -> Self {
        self.peers
            .get_mut()
            .insert(card.endpoint.clone(), MockPeer { card, reply });
        self
    }

    pub async fn add_peer(&self, card: AgentCard, reply: MockReply) {
        self.peers
            .lock()
            .await
            .insert(card.endpoint.clone(), MockPeer { card, reply });
    }

    /// Change how an already added peer answers
    pub async fn set_reply(&self, endpoint: &str, reply: MockReply) {
        if let Some(peer) = self.peers.lock().await.get_mut(endpoint) {
            peer.reply = reply;
        }
    }

    pub async fn calls(&self) -> Vec<(String, MockCall)> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    /// Task requests delivered to `endpoint`, in order
    pub async fn received_tasks(&self, endpoint: &str) -> Vec<TaskRequest> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|(target, _)| target == endpoint)
            .filter_map(|(_, call)| match call {
                MockCall::Task(request) => Some(request.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn task_count(&self, endpoint: &str) -> usize {
        self.received_tasks(endpoint).await.len()
    }

    /// Record the call and resolve the peer, applying transport-level replies
    async fn reach(&self, endpoint: &str, call: MockCall) -> Result<MockPeer, TransportError> {
        self.calls.lock().await.push((endpoint.to_string(), call));

        let peer = self.peers.lock().await.get(endpoint).cloned().ok_or_else(|| {
            TransportError::Unreachable {
                url: endpoint.to_string(),
                message: "connection refused".to_string(),
            }
        })?;

        if let MockReply::Transport(error) = &peer.reply {
            return Err(error.clone());
        }
        if matches!(peer.reply, MockReply::Hang) {
            std::future::pending::<()>().await;
        }
        Ok(peer)
    }
}

#[async_trait]
impl PeerTransport for MockTransport {
    async fn fetch_card(
        &self,
        endpoint: &str,
        _timeout: Duration,
    ) -> Result<AgentCard, TransportError> {
        Ok(self.reach(endpoint, MockCall::FetchCard).await?.card)
    }

    async fn exchange_cards(
        &self,
        endpoint: &str,
        own_card: &AgentCard,
        _timeout: Duration,
    ) -> Result<DiscoveryAck, TransportError> {
        let peer = self
            .reach(endpoint, MockCall::Discover(own_card.clone()))
            .await?;
        Ok(DiscoveryAck::new(peer.card))
    }

    async fn post_task(
        &self,
        endpoint: &str,
        request: &TaskRequest,
        _timeout: Duration,
    ) -> Result<TaskResponse, TransportError> {
        let peer = self
            .reach(endpoint, MockCall::Task(request.clone()))
            .await?;
        let agent_id = &peer.card.agent_id;

        Ok(match peer.reply {
            MockReply::Success(result) => TaskResponse::success(&request.task_id, agent_id, result),
            MockReply::Echo => {
                TaskResponse::success(&request.task_id, agent_id, request.parameters.clone())
            }
            MockReply::Failure(message) => {
                TaskResponse::failure(&request.task_id, agent_id, message)
            }
            MockReply::InProgress => TaskResponse::in_progress(&request.task_id, agent_id),
            MockReply::WrongTaskId => TaskResponse::success(
                format!("not-{}", request.task_id),
                agent_id,
                Parameters::new(),
            ),
            MockReply::Transport(error) => return Err(error),
            MockReply::Hang => return std::future::pending().await,
        })
    }

    async fn check_health(
        &self,
        endpoint: &str,
        _timeout: Duration,
    ) -> Result<HealthReport, TransportError> {
        let peer = self.reach(endpoint, MockCall::Health).await?;
        Ok(HealthReport::healthy(peer.card.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn card(id: &str, port: u16) -> AgentCard {
        AgentCard::new(
            id,
            id,
            format!("http://localhost:{port}"),
            vec!["research".to_string()],
        )
    }

    #[tokio::test]
    async fn test_mock_llm_provider_cycles_responses() {
        let provider = MockLlmProvider::new(vec!["one".to_string(), "two".to_string()]);
        let request = CompletionRequest::prompt("m", "sys", "hi");

        let first = provider.complete(request.clone()).await.unwrap();
        let second = provider.complete(request.clone()).await.unwrap();
        let third = provider.complete(request).await.unwrap();

        assert_eq!(first.content.as_deref(), Some("one"));
        assert_eq!(second.content.as_deref(), Some("two"));
        assert_eq!(third.content.as_deref(), Some("one"));
        assert_eq!(provider.call_count().await, 3);
    }

    #[tokio::test]
    async fn test_mock_llm_provider_echo_and_failure() {
        let echo = MockLlmProvider::echo();
        let response = echo
            .complete(CompletionRequest::prompt("m", "sys", "repeat me"))
            .await
            .unwrap();
        assert_eq!(response.content.as_deref(), Some("repeat me"));

        let failing = MockLlmProvider::with_failure();
        assert!(failing
            .complete(CompletionRequest::prompt("m", "sys", "x"))
            .await
            .is_err());
        assert!(failing.health_check().await.is_err());
        assert_eq!(failing.prompts().await, vec!["x"]);
    }

    #[tokio::test]
    async fn test_mock_transport_replies() {
        let peer = card("a", 9001);
        let transport = MockTransport::new()
            .with_peer(peer.clone(), MockReply::Success(json!({"k": 1}).as_object().cloned().unwrap()));

        let request = TaskRequest::new("o", "a", "research", Parameters::new());
        let response = transport
            .post_task(&peer.endpoint, &request, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(response.task_id, request.task_id);
        assert_eq!(response.result.unwrap()["k"], 1);

        transport
            .set_reply(&peer.endpoint, MockReply::Failure("rate limited".to_string()))
            .await;
        let response = transport
            .post_task(&peer.endpoint, &request, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(response.error.as_deref(), Some("rate limited"));

        assert_eq!(transport.task_count(&peer.endpoint).await, 2);
    }

    #[tokio::test]
    async fn test_mock_transport_unknown_endpoint_is_unreachable() {
        let transport = MockTransport::new();
        let err = transport
            .fetch_card("http://localhost:1", Duration::from_secs(1))
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Unreachable { .. }));
        assert_eq!(transport.call_count().await, 1);
    }
}
