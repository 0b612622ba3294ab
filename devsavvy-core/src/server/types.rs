use devsavvy_files::Citation;
use serde::{Deserialize, Serialize};

/// A message in conversation history.
///
/// Kept separate from `provider::Message` so the wire format does not change
/// when the provider types do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestType {
    /// Answer `content` using `files` as numbered sources.
    Chat,
    /// Return the context block built from `files`.
    Extract,
    /// List models available on the Ollama server.
    Models,
    /// Report the configured model and server.
    Stats,
}

/// Request from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    #[serde(rename = "type")]
    pub request_type: RequestType,

    #[serde(default)]
    pub content: String,

    /// Paths of files to use as context.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,

    /// Overrides the configured source-only setting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_only: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<HistoryMessage>>,
}

impl Request {
    pub fn new(request_type: RequestType, content: impl Into<String>) -> Self {
        Self {
            request_type,
            content: content.into(),
            files: Vec::new(),
            source_only: None,
            history: None,
        }
    }

    pub fn with_files(mut self, files: Vec<String>) -> Self {
        self.files = files;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkType {
    Chunk,
    Done,
    Error,
}

/// Streaming response chunk sent to client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    #[serde(rename = "type")]
    pub chunk_type: ChunkType,
    pub content: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<Citation>>,
}

impl StreamChunk {
    pub fn chunk(content: impl Into<String>) -> Self {
        Self {
            chunk_type: ChunkType::Chunk,
            content: content.into(),
            error: None,
            citations: None,
        }
    }

    pub fn done(content: impl Into<String>) -> Self {
        Self {
            chunk_type: ChunkType::Done,
            content: content.into(),
            error: None,
            citations: None,
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self {
            chunk_type: ChunkType::Error,
            content: String::new(),
            error: Some(error.into()),
            citations: None,
        }
    }

    pub fn with_citations(mut self, citations: Vec<Citation>) -> Self {
        self.citations = Some(citations);
        self
    }

    /// `done` and `error` end the response.
    pub fn is_final(&self) -> bool {
        self.chunk_type != ChunkType::Chunk
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request: Request = serde_json::from_str(
            r#"{"type":"chat","content":"hi","files":["a.md"],"history":[{"role":"assistant","content":"x"}]}"#,
        )
        .unwrap();
        assert_eq!(request.request_type, RequestType::Chat);
        assert_eq!(request.files, vec!["a.md"]);
        assert_eq!(request.source_only, None);
        assert_eq!(request.history.unwrap()[0].role, "assistant");

        let stats: Request = serde_json::from_str(r#"{"type":"stats"}"#).unwrap();
        assert_eq!(stats.request_type, RequestType::Stats);
        assert!(stats.content.is_empty());
    }

    #[test]
    fn test_chunk_wire_format() {
        let json = serde_json::to_string(&StreamChunk::chunk("he")).unwrap();
        assert_eq!(json, r#"{"type":"chunk","content":"he"}"#);

        let json = serde_json::to_string(&StreamChunk::error("boom")).unwrap();
        assert_eq!(json, r#"{"type":"error","content":"","error":"boom"}"#);

        let done = StreamChunk::done("ok").with_citations(Vec::new());
        assert!(done.is_final());
        assert!(serde_json::to_string(&done).unwrap().contains(r#""citations":[]"#));
    }
}
