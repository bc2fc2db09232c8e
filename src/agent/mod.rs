//! Agent runtime for the A2A protocol
//!
//! The registry holds identities, the processor and handlers implement the server
//! role, and the client implements the outbound role. `runtime` wires them together.

pub mod client;
pub mod handlers;
pub mod processor;
pub mod registry;
pub mod runtime;

pub use client::AgentClient;
pub use handlers::{
    BuiltinCapability, CapabilityHandler, CompletionSettings, HandlerContext, HandlerError,
    LlmCapabilityHandler,
};
pub use processor::TaskProcessor;
pub use registry::AgentRegistry;
pub use runtime::{check_provider, AgentRuntime, ServerHandle};
