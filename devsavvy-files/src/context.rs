//! Prompt context assembly.
//!
//! Extracted files are stitched into one block where each file is tagged
//! with a 1-based source number. The numbering is what the model cites back
//! as `[Source N]`, so the Nth file passed in is always source N.

use crate::processor::ProcessedFile;
use serde::{Deserialize, Serialize};

/// Instruction prepended to the prompt in source-only mode.
pub const SOURCE_ONLY_INSTRUCTION: &str = "Answer using ONLY the information contained in the \
provided files. If the files do not contain the answer, say that you cannot find it in the \
provided sources instead of using outside knowledge. Cite every claim as [Source N].";

const CONTEXT_HEADER: &str = "The user has provided the following files as context:";
const CONTEXT_FOOTER: &str = "Cite the files you rely on as [Source N].";

/// A numbered reference to one context file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// 1-based source number as it appears in the prompt.
    pub index: usize,
    pub name: String,
}

/// Lists the sources in prompt order.
pub fn source_refs(files: &[ProcessedFile]) -> Vec<SourceRef> {
    files
        .iter()
        .enumerate()
        .map(|(i, file)| SourceRef {
            index: i + 1,
            name: file.name.clone(),
        })
        .collect()
}

/// Builds the context block for `files`. Returns an empty string for no files.
pub fn build_context(files: &[ProcessedFile]) -> String {
    if files.is_empty() {
        return String::new();
    }

    let blocks: Vec<String> = files
        .iter()
        .enumerate()
        .map(|(i, file)| format!("[Source {}: {}]\n{}", i + 1, file.name, body(file)))
        .collect();

    format!("{}\n\n{}\n\n{}", CONTEXT_HEADER, blocks.join("\n\n"), CONTEXT_FOOTER)
}

fn body(file: &ProcessedFile) -> String {
    if file.is_image() {
        return "(image attached)".to_string();
    }
    if file.text.trim().is_empty() {
        return "(no extractable text)".to_string();
    }
    if file.truncated {
        return format!("{}\n(truncated)", file.text);
    }
    file.text.clone()
}

/// Builds the final user prompt from a message and its context files.
///
/// Layout is `[instruction]`, `[context]`, then the message, separated by
/// blank lines. Source-only mode adds the instruction even without files.
pub fn build_prompt(message: &str, files: &[ProcessedFile], source_only: bool) -> String {
    let mut parts = Vec::with_capacity(3);

    if source_only {
        parts.push(SOURCE_ONLY_INSTRUCTION.to_string());
    }

    let context = build_context(files);
    if !context.is_empty() {
        parts.push(context);
    }

    parts.push(message.to_string());
    parts.join("\n\n")
}
