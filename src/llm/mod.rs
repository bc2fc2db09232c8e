//! LLM provider abstraction layer
//!
//! The completion capability consumed by the built-in capability handlers.

pub mod provider;
pub mod providers;

pub use provider::*;
pub use providers::*;

use crate::config::LlmSection;
use std::sync::Arc;

/// Build the provider described by an `[llm]` section
pub fn build_provider(section: &LlmSection) -> Result<Arc<dyn LlmProvider>, LlmError> {
    let config = OpenAiConfig::from_section(section)?;
    Ok(Arc::new(OpenAiProvider::new(config)?))
}
