//! Observability: structured logging
//!
//! Per-process logging setup plus span macros giving task handling, discovery
//! and pipeline runs their structured context.

pub mod logging;

pub use logging::{init_default_logging, init_logging, parse_level, LogFormat};

// Span macros for structured logging
pub use logging::{discovery_span, pipeline_span, task_span};
