//! devsavvy - Local-first AI chat workspace
//!
//! This is the convenience wrapper crate that re-exports the engine and the
//! file pipeline so applications need a single dependency.
//!
//! # Quick Start
//!
//! ```no_run
//! use devsavvy::prelude::*;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let mut manager = ChatManager::new(Config::load_or_default());
//! manager.attach_path("notes.md").await?;
//!
//! let reply = manager.query("What do my notes say about deadlines?").await?;
//! println!("{}", reply.content);
//! # Ok(())
//! # }
//! ```

// Re-export core
pub use devsavvy_core::*;

/// File processing: detection, extraction, context building and citations.
pub use devsavvy_files as files;

/// Prelude module for convenient imports
pub mod prelude {
    pub use devsavvy_core::canvas::{CanvasState, NodeKind, Position};
    pub use devsavvy_core::history::{Conversation, ConversationStore};
    pub use devsavvy_core::templates::TemplateLibrary;
    pub use devsavvy_core::{ChatManager, ChatReply, Config, OllamaProvider, Provider};
    pub use devsavvy_files::{Citation, FileKind, FileProcessor, ProcessedFile};
}
