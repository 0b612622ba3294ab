//! Turns uploaded files into prompt-ready [`ProcessedFile`]s.
//!
//! The processor detects the file type, runs the matching extractor,
//! normalises whitespace and caps the text length so a single large upload
//! cannot crowd the rest of the prompt out of the model's context window.

use crate::error::{FileError, Result};
use crate::extract::extract_text;
use crate::kind::{mime_for_name, FileKind};
use crate::patterns;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

static EXCESS_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

/// Limits and filters applied while processing files.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessorOptions {
    /// Uploads larger than this are rejected outright.
    pub max_file_bytes: usize,
    /// Extracted text is truncated to this many characters.
    pub max_file_chars: usize,
    /// Path components to skip when collecting a directory.
    pub exclude_patterns: Vec<String>,
    /// Extension allow-list for directory collection; empty accepts all supported files.
    pub extensions: Vec<String>,
}

impl Default for ProcessorOptions {
    fn default() -> Self {
        Self {
            max_file_bytes: 20 * 1024 * 1024,
            max_file_chars: 20_000,
            exclude_patterns: patterns::default_exclude_patterns(),
            extensions: Vec::new(),
        }
    }
}

/// A file whose content has been extracted for use as prompt context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedFile {
    /// Hex SHA-256 of the raw bytes.
    pub id: String,
    pub name: String,
    pub mime: String,
    pub kind: FileKind,
    /// Size of the raw upload in bytes.
    pub size: usize,
    pub text: String,
    /// True when `text` was cut to the configured limit.
    pub truncated: bool,
    /// Base64 payload for images, forwarded to multimodal models.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_base64: Option<String>,
}

impl ProcessedFile {
    pub fn is_image(&self) -> bool {
        self.kind == FileKind::Image
    }
}

/// Routes files to the extractor for their type.
#[derive(Debug, Clone, Default)]
pub struct FileProcessor {
    options: ProcessorOptions,
}

impl FileProcessor {
    pub fn new(options: ProcessorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ProcessorOptions {
        &self.options
    }

    /// Processes an in-memory upload.
    ///
    /// `mime` is the type reported by the uploader, if any; detection falls
    /// back to the file name when it is missing or generic.
    pub fn process(&self, name: &str, mime: Option<&str>, bytes: &[u8]) -> Result<ProcessedFile> {
        if bytes.len() > self.options.max_file_bytes {
            return Err(FileError::TooLarge {
                name: name.to_string(),
                size: bytes.len(),
                limit: self.options.max_file_bytes,
            });
        }

        let kind = FileKind::detect(mime, name);
        let mime = match mime {
            Some(m) if FileKind::from_mime(m).is_some() => m.to_string(),
            _ => mime_for_name(name).to_string(),
        };

        let raw = extract_text(name, kind, bytes)?;
        let (text, truncated) = truncate_chars(&normalize(&raw), self.options.max_file_chars);
        if truncated {
            debug!(name, limit = self.options.max_file_chars, "Truncated extracted text");
        }

        let image_base64 = (kind == FileKind::Image).then(|| STANDARD.encode(bytes));

        Ok(ProcessedFile {
            id: format!("{:x}", Sha256::digest(bytes)),
            name: name.to_string(),
            mime,
            kind,
            size: bytes.len(),
            text,
            truncated,
            image_base64,
        })
    }

    /// Reads and processes a file from disk.
    pub async fn process_path(&self, path: impl AsRef<Path>) -> Result<ProcessedFile> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| FileError::io(path, e))?;

        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unnamed");

        self.process(name, None, &bytes)
    }

    /// Recursively processes every supported file below `dir`.
    ///
    /// Files that fail to read or extract are skipped with a warning so one
    /// bad file does not sink a whole directory.
    pub async fn collect_directory(&self, dir: impl AsRef<Path>) -> Result<Vec<ProcessedFile>> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(FileError::io(
                dir,
                std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            ));
        }

        let exclude = &self.options.exclude_patterns;
        let mut paths: Vec<_> = WalkDir::new(dir)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| {
                entry.depth() == 0 || !patterns::should_exclude(Path::new(entry.file_name()), exclude)
            })
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| patterns::is_collectable(path, &self.options.extensions))
            .collect();
        paths.sort();

        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            match self.process_path(&path).await {
                Ok(file) => files.push(file),
                Err(e) => warn!(path = %path.display(), "Skipping file: {}", e),
            }
        }

        info!(dir = %dir.display(), count = files.len(), "Collected directory");
        Ok(files)
    }
}

/// Normalises line endings and trims noise left behind by extractors.
pub(crate) fn normalize(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let trimmed_lines = unified
        .lines()
        .map(str::trim_end)
        .collect::<Vec<_>>()
        .join("\n");

    EXCESS_BLANK_LINES
        .replace_all(trimmed_lines.trim(), "\n\n")
        .into_owned()
}

/// Cuts `text` to at most `max_chars` characters, never inside a code point.
pub(crate) fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => (text[..byte_idx].to_string(), true),
        None => (text.to_string(), false),
    }
}
