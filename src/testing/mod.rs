//! Testing utilities and mock implementations
//!
//! Mocks for the two external seams of an agent: the LLM backend and the peer
//! transport. Nothing here needs a network or an API key.

pub mod mocks;

pub use mocks::*;
