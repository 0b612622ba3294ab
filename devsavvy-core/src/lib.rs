//! devsavvy-core - Chat engine for DevSavvy
//!
//! Provides the pieces behind the DevSavvy assistant:
//! - LLM provider abstraction (Ollama)
//! - Chat engine with attached files as numbered, citable sources
//! - Conversation history, canvas boards and document templates
//! - Configuration management
//! - Unix socket server for front-ends
//!
//! File processing lives in `devsavvy-files` and is re-exported where the
//! engine exposes it.

pub mod canvas;
pub mod chat;
pub mod config;
pub mod detection;
pub mod history;
pub mod provider;
pub mod server;
pub mod templates;

pub use canvas::{Canvas, CanvasError, CanvasState, NodeKind, Position};
pub use chat::{ChatManager, ChatReply};
pub use config::{ChatConfig, Config, ConfigError, LlmConfig, StorageConfig};
pub use detection::{check_ollama_silent, detect_ollama, DetectionError, OllamaInfo};
pub use history::{Conversation, ConversationStore, ConversationSummary, HistoryError};
pub use server::Server;
pub use templates::{DocumentTemplate, TemplateError, TemplateLibrary};

// Provider exports
pub use provider::{
    ChatRequest, ChatResponse, Message, ModelInfo, OllamaProvider, Provider, ProviderError,
};
