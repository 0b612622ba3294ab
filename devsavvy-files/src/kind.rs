//! File type detection.
//!
//! Uploads usually arrive with a MIME type from the browser, but it is often
//! missing or generic (`application/octet-stream`), so detection falls back
//! to the file extension.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Broad category of a file, used to pick a text extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Text,
    Markdown,
    Code,
    Json,
    Csv,
    Html,
    Pdf,
    Docx,
    Spreadsheet,
    Image,
    Unsupported,
}

const CODE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "jsx", "ts", "tsx", "go", "java", "kt", "c", "h", "cpp", "hpp", "cc",
    "cs", "rb", "php", "swift", "scala", "sh", "bash", "zsh", "sql", "css", "scss", "vue",
    "svelte", "lua", "r", "toml", "yaml", "yml", "xml", "ini", "dockerfile", "makefile",
];

impl FileKind {
    /// Detects the kind of a file from its MIME type and name.
    ///
    /// A recognised MIME type wins; otherwise the extension decides.
    pub fn detect(mime: Option<&str>, file_name: &str) -> Self {
        if let Some(kind) = mime.and_then(Self::from_mime) {
            return kind;
        }
        Self::from_name(file_name)
    }

    /// Maps a MIME type to a kind. Returns `None` for generic or unknown types.
    pub fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        let kind = match mime.as_str() {
            "application/pdf" => Self::Pdf,
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => Self::Docx,
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            | "application/vnd.ms-excel"
            | "application/vnd.oasis.opendocument.spreadsheet" => Self::Spreadsheet,
            "application/json" | "application/ld+json" => Self::Json,
            "text/csv" => Self::Csv,
            "text/html" | "application/xhtml+xml" => Self::Html,
            "text/markdown" | "text/x-markdown" => Self::Markdown,
            "application/javascript"
            | "application/typescript"
            | "application/x-sh"
            | "application/xml"
            | "application/toml"
            | "application/x-yaml" => Self::Code,
            m if m.starts_with("image/") => Self::Image,
            m if m.starts_with("text/x-") => Self::Code,
            m if m.starts_with("text/") => Self::Text,
            _ => return None,
        };

        Some(kind)
    }

    /// Maps a file name to a kind by extension (case-insensitive).
    pub fn from_name(file_name: &str) -> Self {
        let path = Path::new(file_name);
        let ext = match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => ext.to_ascii_lowercase(),
            None => {
                let stem = file_name.to_ascii_lowercase();
                return if stem == "dockerfile" || stem == "makefile" {
                    Self::Code
                } else {
                    Self::Unsupported
                };
            }
        };

        match ext.as_str() {
            "txt" | "log" | "text" => Self::Text,
            "md" | "markdown" | "mdx" => Self::Markdown,
            "json" | "jsonl" => Self::Json,
            "csv" | "tsv" => Self::Csv,
            "html" | "htm" | "xhtml" => Self::Html,
            "pdf" => Self::Pdf,
            "docx" => Self::Docx,
            "xlsx" | "xls" | "xlsm" | "ods" => Self::Spreadsheet,
            "png" | "jpg" | "jpeg" | "gif" | "webp" | "bmp" => Self::Image,
            e if CODE_EXTENSIONS.contains(&e) => Self::Code,
            _ => Self::Unsupported,
        }
    }

    /// Whether the extracted content is plain UTF-8 text.
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            Self::Text | Self::Markdown | Self::Code | Self::Json | Self::Csv
        )
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Code => "code",
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Html => "html",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Spreadsheet => "spreadsheet",
            Self::Image => "image",
            Self::Unsupported => "unsupported",
        }
    }
}

/// Best-effort MIME type for a file name.
pub fn mime_for_name(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "txt" | "log" => "text/plain",
        "md" | "markdown" => "text/markdown",
        "json" => "application/json",
        "csv" => "text/csv",
        "html" | "htm" => "text/html",
        "pdf" => "application/pdf",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "xls" => "application/vnd.ms-excel",
        "ods" => "application/vnd.oasis.opendocument.spreadsheet",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "js" => "application/javascript",
        "ts" => "application/typescript",
        "xml" => "application/xml",
        _ => match FileKind::from_name(file_name) {
            FileKind::Code => "text/plain",
            _ => "application/octet-stream",
        },
    }
}
