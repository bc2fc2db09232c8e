//! HTTP binding of the agent protocol
//!
//! `server` exposes the four protocol routes with warp; `client` implements
//! `PeerTransport` with reqwest.

pub mod client;
pub mod server;

pub use client::HttpTransport;
pub use server::{routes, serve, ServerHandle, ServerState, MAX_BODY_BYTES};

pub const AGENT_CARD_PATH: &str = "/agent-card";
pub const DISCOVER_PATH: &str = "/discover";
pub const TASK_PATH: &str = "/task";
pub const HEALTH_PATH: &str = "/health";

/// Join a peer base endpoint and a route path
pub fn endpoint_url(endpoint: &str, path: &str) -> String {
    format!("{}{path}", endpoint.trim_end_matches('/'))
}
