//! devsavvy-files - File-context pipeline
//!
//! Turns uploaded files into prompt context and maps model replies back to
//! the files they cite:
//! - Type detection from MIME type and file name
//! - Text extraction (plain text, HTML, PDF, DOCX, spreadsheets)
//! - Numbered `[Source N]` context blocks and source-only prompts
//! - Citation scanning for reply highlighting

mod citations;
mod context;
mod error;
mod extract;
mod kind;
pub mod patterns;
mod processor;

pub use citations::{cited_indices, extract_citations, Citation};
pub use context::{build_context, build_prompt, source_refs, SourceRef, SOURCE_ONLY_INSTRUCTION};
pub use error::{FileError, Result};
pub use extract::{decode_text, extract_text};
pub use kind::{mime_for_name, FileKind};
pub use processor::{FileProcessor, ProcessedFile, ProcessorOptions};
