//! Protocol types for agent-to-agent communication
//!
//! This module implements the AgentCard schema and the task request/response
//! messages exchanged between agents, independent of the transport carrying them.

pub mod card;
pub mod messages;

pub use card::*;
pub use messages::*;
