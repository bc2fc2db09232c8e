//! Task protocol messages
//!
//! Wire shapes of the request/response pair exchanged for one unit of work, plus the
//! small envelopes used by discovery, health and error replies. Field names are
//! normative for interoperability with other implementations of the protocol.

use crate::protocol::card::AgentCard;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use uuid::Uuid;

/// Structured key/value payload carried by requests and successful responses
pub type Parameters = Map<String, Value>;

/// Status value acknowledging a successful discovery exchange
pub const DISCOVERED_STATUS: &str = "discovered";

/// Status value reported by a live agent on its health endpoint
pub const HEALTHY_STATUS: &str = "healthy";

/// Current time as an RFC 3339 timestamp
pub fn now_timestamp() -> String {
    Utc::now().to_rfc3339()
}

/// Generate a fresh requester-side task identifier
pub fn new_task_id() -> String {
    Uuid::new_v4().to_string()
}

/// A unit of work routed to one target agent
///
/// # Examples
/// ```
/// use a2a_mesh::protocol::TaskRequest;
/// use serde_json::json;
///
/// let params = json!({"topic": "OpenTelemetry"}).as_object().cloned().unwrap();
/// let request = TaskRequest::new("orchestrator", "researcher-001", "research", params);
///
/// let wire = serde_json::to_string(&request).unwrap();
/// let parsed: TaskRequest = serde_json::from_str(&wire).unwrap();
/// assert_eq!(parsed, request);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskRequest {
    /// Unique per request, generated by the requester
    pub task_id: String,
    pub requesting_agent: String,
    /// Informational only; the transport already addresses the endpoint
    pub target_agent: String,
    /// Selects the handler on the receiving agent
    pub task_type: String,
    #[serde(default)]
    pub parameters: Parameters,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

impl TaskRequest {
    /// Build a request with a fresh task id and the current timestamp
    pub fn new(
        requesting_agent: impl Into<String>,
        target_agent: impl Into<String>,
        task_type: impl Into<String>,
        parameters: Parameters,
    ) -> Self {
        Self {
            task_id: new_task_id(),
            requesting_agent: requesting_agent.into(),
            target_agent: target_agent.into(),
            task_type: task_type.into(),
            parameters,
            timestamp: now_timestamp(),
            callback_url: None,
        }
    }
}

/// Status vocabulary of a task response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Success,
    Error,
    /// Non-terminal; never emitted by the synchronous handling path
    InProgress,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskStatus::InProgress)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Success => "success",
            TaskStatus::Error => "error",
            TaskStatus::InProgress => "in_progress",
        };
        write!(f, "{s}")
    }
}

/// The result of processing a task request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskResponse {
    /// Echoes the request's task id
    pub task_id: String,
    pub responding_agent: String,
    pub status: TaskStatus,
    /// Present iff status is success
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Parameters>,
    /// Present iff status is error
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
}

/// Borrowed view of a response's outcome
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TaskOutcome<'a> {
    Success(&'a Parameters),
    Error(&'a str),
    InProgress,
}

impl TaskResponse {
    /// Successful response carrying a result mapping
    pub fn success(
        task_id: impl Into<String>,
        responding_agent: impl Into<String>,
        result: Parameters,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            responding_agent: responding_agent.into(),
            status: TaskStatus::Success,
            result: Some(result),
            error: None,
            timestamp: now_timestamp(),
        }
    }

    /// Failed response carrying a human-readable message
    pub fn failure(
        task_id: impl Into<String>,
        responding_agent: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            responding_agent: responding_agent.into(),
            status: TaskStatus::Error,
            result: None,
            error: Some(error.into()),
            timestamp: now_timestamp(),
        }
    }

    /// Non-terminal acknowledgement for asynchronous extensions
    pub fn in_progress(task_id: impl Into<String>, responding_agent: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            responding_agent: responding_agent.into(),
            status: TaskStatus::InProgress,
            result: None,
            error: None,
            timestamp: now_timestamp(),
        }
    }

    /// Check the response against the request it answers
    ///
    /// Returns a description of the broken invariant, if any.
    pub fn validate_for(&self, request_task_id: &str) -> Result<(), String> {
        if self.task_id != request_task_id {
            return Err(format!(
                "task_id mismatch: sent '{request_task_id}', received '{}'",
                self.task_id
            ));
        }

        match (self.status, self.result.is_some(), self.error.is_some()) {
            (TaskStatus::Success, true, false) => Ok(()),
            (TaskStatus::Error, false, true) if self.error.as_deref() == Some("") => {
                Err("status 'error' with an empty error message".to_string())
            }
            (TaskStatus::Error, false, true) => Ok(()),
            (TaskStatus::InProgress, _, _) => Ok(()),
            (status, has_result, has_error) => Err(format!(
                "status '{status}' with result present={has_result}, error present={has_error}"
            )),
        }
    }

    pub fn outcome(&self) -> TaskOutcome<'_> {
        match (self.status, &self.result, &self.error) {
            (TaskStatus::Success, Some(result), _) => TaskOutcome::Success(result),
            (TaskStatus::Error, _, Some(error)) => TaskOutcome::Error(error),
            (TaskStatus::Error, _, None) => TaskOutcome::Error(""),
            _ => TaskOutcome::InProgress,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Success
    }
}

/// Reply to a discovery request: the responder's own card
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiscoveryAck {
    pub status: String,
    pub agent_card: AgentCard,
}

impl DiscoveryAck {
    pub fn new(agent_card: AgentCard) -> Self {
        Self {
            status: DISCOVERED_STATUS.to_string(),
            agent_card,
        }
    }
}

/// Liveness report served on the health endpoint
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HealthReport {
    pub status: String,
    /// Agent display name
    pub agent: String,
}

impl HealthReport {
    pub fn healthy(agent: impl Into<String>) -> Self {
        Self {
            status: HEALTHY_STATUS.to_string(),
            agent: agent.into(),
        }
    }
}

/// Body of every non-200 reply
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub status: String,
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Parameters {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::Success).unwrap(),
            "\"success\""
        );
        assert_eq!(
            serde_json::to_string(&TaskStatus::Error).unwrap(),
            "\"error\""
        );
        assert_eq!(
            serde_json::to_string(&TaskStatus::InProgress).unwrap(),
            "\"in_progress\""
        );
        assert_eq!(TaskStatus::InProgress.to_string(), "in_progress");
    }

    #[test]
    fn test_task_ids_are_unique() {
        let a = TaskRequest::new("o", "a", "research", Parameters::new());
        let b = TaskRequest::new("o", "a", "research", Parameters::new());
        assert_ne!(a.task_id, b.task_id);
    }

    #[test]
    fn test_request_round_trip() {
        let request = TaskRequest::new(
            "orchestrator",
            "researcher-001",
            "research",
            params(json!({"topic": "X", "depth": 3, "tags": ["a", "b"]})),
        );

        let wire = serde_json::to_string(&request).unwrap();
        let parsed: TaskRequest = serde_json::from_str(&wire).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_response_round_trip_each_status() {
        let responses = vec![
            TaskResponse::success("t-1", "a", params(json!({"research_data": "facts"}))),
            TaskResponse::failure("t-2", "b", "rate limited"),
            TaskResponse::in_progress("t-3", "c"),
        ];

        for response in responses {
            let wire = serde_json::to_string(&response).unwrap();
            let parsed: TaskResponse = serde_json::from_str(&wire).unwrap();
            assert_eq!(parsed, response);
        }
    }

    #[test]
    fn test_success_response_omits_error_field() {
        let value =
            serde_json::to_value(TaskResponse::success("t", "a", Parameters::new())).unwrap();
        assert!(value.get("error").is_none());
        assert_eq!(value["status"], "success");
        assert_eq!(value["result"], json!({}));
    }

    #[test]
    fn test_response_accepts_explicit_nulls() {
        let payload = json!({
            "task_id": "t-1",
            "responding_agent": "analyst-001",
            "status": "error",
            "result": null,
            "error": "Unknown task type: summarize",
            "timestamp": "2024-01-01T12:00:00"
        });

        let response: TaskResponse = serde_json::from_value(payload).unwrap();
        assert!(response.validate_for("t-1").is_ok());
        assert_eq!(
            response.outcome(),
            TaskOutcome::Error("Unknown task type: summarize")
        );
    }

    #[test]
    fn test_validate_detects_task_id_mismatch() {
        let response = TaskResponse::success("other", "a", Parameters::new());
        let err = response.validate_for("mine").unwrap_err();
        assert!(err.contains("mismatch"));
    }

    #[test]
    fn test_validate_detects_single_of_violations() {
        let mut both = TaskResponse::success("t", "a", Parameters::new());
        both.error = Some("boom".to_string());
        assert!(both.validate_for("t").is_err());

        let mut neither = TaskResponse::failure("t", "a", "boom");
        neither.error = None;
        assert!(neither.validate_for("t").is_err());

        let mut wrong_side = TaskResponse::success("t", "a", Parameters::new());
        wrong_side.status = TaskStatus::Error;
        assert!(wrong_side.validate_for("t").is_err());

        let empty_error = TaskResponse::failure("t", "a", "");
        assert!(empty_error.validate_for("t").is_err());
    }

    #[test]
    fn test_float_parameters_survive_the_wire() {
        let request = TaskRequest::new(
            "orchestrator",
            "analyst-001",
            "analyze",
            params(json!({"score": 3.3027505448916398e-56, "ratio": 0.1})),
        );

        let wire = serde_json::to_string(&request).unwrap();
        let parsed: TaskRequest = serde_json::from_str(&wire).unwrap();
        assert_eq!(parsed.parameters["score"].as_f64(), Some(3.3027505448916398e-56));
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_in_progress_is_not_terminal() {
        let response = TaskResponse::in_progress("t", "a");
        assert!(response.validate_for("t").is_ok());
        assert!(!response.status.is_terminal());
        assert_eq!(response.outcome(), TaskOutcome::InProgress);
    }

    #[test]
    fn test_discovery_ack_shape() {
        let card = AgentCard::new("a", "A", "http://a", vec!["research".to_string()]);
        let value = serde_json::to_value(DiscoveryAck::new(card)).unwrap();
        assert_eq!(value["status"], "discovered");
        assert_eq!(value["agent_card"]["agent_id"], "a");
    }

    #[test]
    fn test_health_report_shape() {
        let value = serde_json::to_value(HealthReport::healthy("Research Agent")).unwrap();
        assert_eq!(value, json!({"status": "healthy", "agent": "Research Agent"}));
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn json_value() -> impl Strategy<Value = Value> {
            let leaf = prop_oneof![
                Just(Value::Null),
                any::<bool>().prop_map(Value::from),
                any::<i64>().prop_map(Value::from),
                any::<u64>().prop_map(Value::from),
                any::<f64>()
                    .prop_filter("finite", |x| x.is_finite())
                    .prop_map(Value::from),
                ".*".prop_map(Value::from),
            ];
            leaf.prop_recursive(3, 32, 4, |inner| {
                prop_oneof![
                    prop::collection::vec(inner.clone(), 0..4).prop_map(Value::from),
                    prop::collection::hash_map(".*", inner, 0..4)
                        .prop_map(|m| Value::Object(m.into_iter().collect())),
                ]
            })
        }

        fn parameters() -> impl Strategy<Value = Parameters> {
            prop::collection::hash_map("[a-z_]{1,12}", json_value(), 0..5)
                .prop_map(|m| m.into_iter().collect())
        }

        fn status() -> impl Strategy<Value = TaskStatus> {
            prop_oneof![
                Just(TaskStatus::Success),
                Just(TaskStatus::Error),
                Just(TaskStatus::InProgress),
            ]
        }

        proptest! {
            #[test]
            fn request_survives_the_wire(parameters in parameters(), task_type in "[a-z]{1,10}") {
                let request = TaskRequest::new("orchestrator", "researcher-001", task_type, parameters);

                let wire = serde_json::to_string(&request).unwrap();
                let parsed: TaskRequest = serde_json::from_str(&wire).unwrap();
                prop_assert_eq!(parsed, request);
            }

            #[test]
            fn response_survives_the_wire(
                status in status(),
                result in prop::option::of(parameters()),
                error in prop::option::of(".*"),
            ) {
                let mut response = TaskResponse::in_progress("t-1", "analyst-001");
                response.status = status;
                response.result = result;
                response.error = error;

                let wire = serde_json::to_string(&response).unwrap();
                let parsed: TaskResponse = serde_json::from_str(&wire).unwrap();
                prop_assert_eq!(parsed, response);
            }

            #[test]
            fn validate_accepts_exactly_single_of_responses(
                status in status(),
                result in prop::option::of(parameters()),
                error in prop::option::of(".{0,8}"),
            ) {
                let expected = match status {
                    TaskStatus::Success => result.is_some() && error.is_none(),
                    TaskStatus::Error => {
                        result.is_none() && error.as_deref().is_some_and(|e| !e.is_empty())
                    }
                    TaskStatus::InProgress => true,
                };

                let mut response = TaskResponse::in_progress("t-1", "analyst-001");
                response.status = status;
                response.result = result;
                response.error = error;

                prop_assert_eq!(response.validate_for("t-1").is_ok(), expected);
            }
        }
    }
}
