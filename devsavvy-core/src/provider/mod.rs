//! LLM provider abstraction layer.
//!
//! This module defines a common interface for LLM backends to provide
//! streaming chat completions and model discovery.

mod types;
pub mod ollama;

// Re-export common types
pub use types::{
    ChatRequest,
    ChatResponse,
    Message,
    ModelInfo,
    Provider,
    ProviderError,
    Result,
};

// Re-export provider implementations
pub use ollama::OllamaProvider;
