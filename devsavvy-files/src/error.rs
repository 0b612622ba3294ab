use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning an uploaded file into prompt text.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Unsupported file type for {name} ({mime})")]
    Unsupported { name: String, mime: String },

    #[error("{name} is {size} bytes, larger than the {limit} byte limit")]
    TooLarge { name: String, size: usize, limit: usize },

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("DOCX extraction failed: {0}")]
    Docx(String),

    #[error("Spreadsheet extraction failed: {0}")]
    Spreadsheet(String),

    #[error("HTML conversion failed: {0}")]
    Html(String),
}

pub type Result<T> = std::result::Result<T, FileError>;

impl FileError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<zip::result::ZipError> for FileError {
    fn from(err: zip::result::ZipError) -> Self {
        Self::Docx(err.to_string())
    }
}

impl From<quick_xml::Error> for FileError {
    fn from(err: quick_xml::Error) -> Self {
        Self::Docx(err.to_string())
    }
}

impl From<calamine::Error> for FileError {
    fn from(err: calamine::Error) -> Self {
        Self::Spreadsheet(err.to_string())
    }
}
