//! warp routes for the agent protocol
//!
//! | Route | Reply |
//! |---|---|
//! | `GET /agent-card` | own `AgentCard` |
//! | `POST /discover` | `DiscoveryAck`, 400 on malformed or invalid card |
//! | `POST /task` | `TaskResponse`, always 200 once the body parses |
//! | `GET /health` | `HealthReport` |
//!
//! Every non-200 reply carries an `ErrorBody`.

use crate::agent::processor::TaskProcessor;
use crate::agent::registry::AgentRegistry;
use crate::error::{AgentError, AgentResult};
use crate::observability::discovery_span;
use crate::protocol::card::AgentCard;
use crate::protocol::messages::{DiscoveryAck, ErrorBody, HealthReport, TaskRequest};
use bytes::{Buf, Bytes, BytesMut};
use futures::{Stream, StreamExt};
use serde::Serialize;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use warp::http::StatusCode;
use warp::reply::Response;
use warp::{Filter, Rejection, Reply};

/// Largest accepted request body
pub const MAX_BODY_BYTES: u64 = 1024 * 1024;

#[derive(Debug)]
struct BodyTooLarge;

impl warp::reject::Reject for BodyTooLarge {}

#[derive(Debug)]
struct BodyUnreadable(String);

impl warp::reject::Reject for BodyUnreadable {}

/// Everything the route handlers need, shared across connections
#[derive(Clone)]
pub struct ServerState {
    own_card: Arc<AgentCard>,
    registry: AgentRegistry,
    processor: Arc<TaskProcessor>,
}

impl ServerState {
    pub fn new(own_card: AgentCard, registry: AgentRegistry, processor: Arc<TaskProcessor>) -> Self {
        Self {
            own_card: Arc::new(own_card),
            registry,
            processor,
        }
    }
}

fn with_state(state: ServerState) -> impl Filter<Extract = (ServerState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Request body capped at `MAX_BODY_BYTES`
///
/// A declared `Content-Length` over the cap is refused up front; chunked bodies are
/// counted as they arrive.
fn bounded_body() -> impl Filter<Extract = (Bytes,), Error = Rejection> + Clone {
    warp::header::optional::<u64>("content-length")
        .and_then(|declared: Option<u64>| async move {
            match declared {
                Some(len) if len > MAX_BODY_BYTES => Err(warp::reject::custom(BodyTooLarge)),
                _ => Ok(()),
            }
        })
        .untuple_one()
        .and(warp::body::stream())
        .and_then(read_bounded_body)
}

async fn read_bounded_body<S, B>(stream: S) -> Result<Bytes, Rejection>
where
    S: Stream<Item = Result<B, warp::Error>>,
    B: Buf,
{
    futures::pin_mut!(stream);
    let mut body = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let mut chunk =
            chunk.map_err(|e| warp::reject::custom(BodyUnreadable(e.to_string())))?;
        if (body.len() + chunk.remaining()) as u64 > MAX_BODY_BYTES {
            return Err(warp::reject::custom(BodyTooLarge));
        }
        while chunk.has_remaining() {
            let bytes = chunk.chunk();
            let len = bytes.len();
            body.extend_from_slice(bytes);
            chunk.advance(len);
        }
    }
    Ok(body.freeze())
}

fn json_reply<T: Serialize>(body: &T, status: StatusCode) -> Response {
    warp::reply::with_status(warp::reply::json(body), status).into_response()
}

fn error_reply(message: impl Into<String>, status: StatusCode) -> Response {
    json_reply(&ErrorBody::new(message), status)
}

/// Build the protocol routes for one agent
pub fn routes(state: ServerState) -> impl Filter<Extract = (impl Reply,), Error = Infallible> + Clone {
    let card = warp::path("agent-card")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(get_card);

    let discover = warp::path("discover")
        .and(warp::path::end())
        .and(warp::post())
        .and(bounded_body())
        .and(with_state(state.clone()))
        .and_then(discover);

    let task = warp::path("task")
        .and(warp::path::end())
        .and(warp::post())
        .and(bounded_body())
        .and(with_state(state.clone()))
        .and_then(handle_task);

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state))
        .and_then(health);

    card.or(discover)
        .or(task)
        .or(health)
        .recover(handle_rejection)
}

async fn get_card(state: ServerState) -> Result<Response, Infallible> {
    Ok(json_reply(state.own_card.as_ref(), StatusCode::OK))
}

async fn discover(body: Bytes, state: ServerState) -> Result<Response, Infallible> {
    let card: AgentCard = match serde_json::from_slice(&body) {
        Ok(card) => card,
        Err(e) => {
            warn!(error = %e, "Malformed discovery request");
            return Ok(error_reply(
                format!("malformed agent card: {e}"),
                StatusCode::BAD_REQUEST,
            ));
        }
    };

    let span = discovery_span!(peer_id = %card.agent_id, peer_endpoint = %card.endpoint, inbound = true);
    let reply = span.in_scope(|| match state.registry.upsert_peer(card) {
        Ok(previous) => {
            debug!(known_before = previous.is_some(), "Peer discovered us");
            json_reply(
                &DiscoveryAck::new(state.own_card.as_ref().clone()),
                StatusCode::OK,
            )
        }
        Err(e) => error_reply(e.to_string(), StatusCode::BAD_REQUEST),
    });

    Ok(reply)
}

async fn handle_task(body: Bytes, state: ServerState) -> Result<Response, Infallible> {
    let request: TaskRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Malformed task request");
            return Ok(error_reply(
                format!("malformed task request: {e}"),
                StatusCode::BAD_REQUEST,
            ));
        }
    };

    let response = state.processor.handle(request).await;
    Ok(json_reply(&response, StatusCode::OK))
}

async fn health(state: ServerState) -> Result<Response, Infallible> {
    Ok(json_reply(
        &HealthReport::healthy(&state.own_card.name),
        StatusCode::OK,
    ))
}

async fn handle_rejection(rejection: Rejection) -> Result<Response, Infallible> {
    let (status, message) = if rejection.find::<BodyTooLarge>().is_some() {
        (
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("request body exceeds {MAX_BODY_BYTES} bytes"),
        )
    } else if let Some(BodyUnreadable(reason)) = rejection.find::<BodyUnreadable>() {
        (
            StatusCode::BAD_REQUEST,
            format!("unreadable request body: {reason}"),
        )
    } else if rejection.find::<warp::reject::MethodNotAllowed>().is_some() {
        (
            StatusCode::METHOD_NOT_ALLOWED,
            "method not allowed".to_string(),
        )
    } else if rejection.is_not_found() {
        (StatusCode::NOT_FOUND, "unknown route".to_string())
    } else {
        warn!(rejection = ?rejection, "Unhandled rejection");
        (StatusCode::BAD_REQUEST, "bad request".to_string())
    };

    Ok(error_reply(message, status))
}

/// A running protocol server; dropping the handle also stops it
pub struct ServerHandle {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ServerHandle {
    /// Address the server actually bound, useful with port 0
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop accepting connections and wait for in-flight requests to finish
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!(error = %e, "Protocol server task ended abnormally");
        }
        info!(addr = %self.local_addr, "Protocol server stopped");
    }
}

/// Bind `addr` and serve the protocol routes until the handle is shut down
pub fn serve(state: ServerState, addr: SocketAddr) -> AgentResult<ServerHandle> {
    let (tx, rx) = oneshot::channel::<()>();
    let (local_addr, server) = warp::serve(routes(state))
        .try_bind_with_graceful_shutdown(addr, async move {
            rx.await.ok();
        })
        .map_err(|e| AgentError::configuration(format!("failed to bind {addr}: {e}")))?;

    info!(addr = %local_addr, "Protocol server listening");
    let task = tokio::spawn(server);

    Ok(ServerHandle {
        local_addr,
        shutdown: Some(tx),
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::messages::{TaskResponse, TaskStatus};
    use crate::testing::mocks::MockLlmProvider;
    use crate::agent::handlers::CompletionSettings;
    use crate::config::LlmSection;
    use serde_json::{json, Value};

    fn state() -> ServerState {
        let card = AgentCard::new(
            "analyst-001",
            "Analysis Agent",
            "http://localhost:8002",
            vec!["analysis".to_string()],
        );
        let registry = AgentRegistry::with_self(card.clone()).unwrap();
        let processor = TaskProcessor::with_builtin_handlers(
            &card,
            Arc::new(MockLlmProvider::single_response("insight")),
            CompletionSettings::from(&LlmSection::default()),
        )
        .unwrap();
        ServerState::new(card, registry, Arc::new(processor))
    }

    #[tokio::test]
    async fn test_get_card() {
        let reply = warp::test::request()
            .method("GET")
            .path("/agent-card")
            .reply(&routes(state()))
            .await;

        assert_eq!(reply.status(), 200);
        let card: AgentCard = serde_json::from_slice(reply.body()).unwrap();
        assert_eq!(card.agent_id, "analyst-001");
    }

    #[tokio::test]
    async fn test_health() {
        let reply = warp::test::request()
            .path("/health")
            .reply(&routes(state()))
            .await;

        assert_eq!(reply.status(), 200);
        let body: Value = serde_json::from_slice(reply.body()).unwrap();
        assert_eq!(body, json!({"status": "healthy", "agent": "Analysis Agent"}));
    }

    #[tokio::test]
    async fn test_task_round_trip() {
        let request = TaskRequest::new(
            "orchestrator",
            "analyst-001",
            "analyze",
            json!({"research_data": "facts"}).as_object().cloned().unwrap(),
        );

        let reply = warp::test::request()
            .method("POST")
            .path("/task")
            .json(&request)
            .reply(&routes(state()))
            .await;

        assert_eq!(reply.status(), 200);
        let response: TaskResponse = serde_json::from_slice(reply.body()).unwrap();
        assert_eq!(response.task_id, request.task_id);
        assert_eq!(response.status, TaskStatus::Success);
    }

    #[tokio::test]
    async fn test_unknown_route_and_wrong_method() {
        let filter = routes(state());

        let missing = warp::test::request().path("/nope").reply(&filter).await;
        assert_eq!(missing.status(), 404);
        let body: ErrorBody = serde_json::from_slice(missing.body()).unwrap();
        assert_eq!(body.status, "error");

        let wrong_method = warp::test::request()
            .method("GET")
            .path("/task")
            .reply(&filter)
            .await;
        assert_eq!(wrong_method.status(), 405);
    }

    #[tokio::test]
    async fn test_bounded_body_counts_streamed_chunks() {
        let half = vec![b'x'; MAX_BODY_BYTES as usize / 2];

        let fits = futures::stream::iter(vec![
            Ok::<_, warp::Error>(Bytes::from(half.clone())),
            Ok(Bytes::from(half.clone())),
        ]);
        let body = read_bounded_body(fits).await.unwrap();
        assert_eq!(body.len() as u64, MAX_BODY_BYTES);

        let too_big = futures::stream::iter(vec![
            Ok::<_, warp::Error>(Bytes::from(half.clone())),
            Ok(Bytes::from(half)),
            Ok(Bytes::from_static(b"x")),
        ]);
        let rejection = read_bounded_body(too_big).await.unwrap_err();
        assert!(rejection.find::<BodyTooLarge>().is_some());
    }
}
