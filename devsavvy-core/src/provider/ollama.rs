//! Ollama provider implementation.
//!
//! This module provides an Ollama HTTP API client that implements the Provider trait.

use super::types::*;
use async_trait::async_trait;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Ollama HTTP API provider.
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    base_url: String,
    http_client: reqwest::Client,
}

impl OllamaProvider {
    /// Creates a new Ollama provider for the server at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: &crate::Config) -> Self {
        Self::new(&config.llm.base_url)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn to_ollama_request(request: ChatRequest) -> OllamaChatRequest {
        let mut options = HashMap::new();
        options.insert("temperature".to_string(), serde_json::json!(request.temperature));
        if let Some(num_ctx) = request.context_length {
            options.insert("num_ctx".to_string(), serde_json::json!(num_ctx));
        }

        OllamaChatRequest {
            model: request.model,
            messages: request
                .messages
                .into_iter()
                .map(|m| OllamaMessage {
                    role: m.role,
                    content: m.content,
                    images: m.images,
                })
                .collect(),
            options: Some(options),
            stream: true,
        }
    }
}

impl Default for OllamaProvider {
    fn default() -> Self {
        Self::from_config(&crate::Config::default())
    }
}

#[async_trait]
impl Provider for OllamaProvider {
    async fn chat<'a>(
        &'a self,
        request: ChatRequest,
        mut callback: Box<dyn FnMut(ChatResponse) + Send + 'a>,
    ) -> Result<()> {
        let url = format!("{}/api/chat", self.base_url);
        debug!(model = %request.model, messages = request.messages.len(), "Sending chat request");

        let response = self
            .http_client
            .post(&url)
            .json(&Self::to_ollama_request(request))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(ProviderError::Api(error_text));
        }

        let mut stream = response.bytes_stream();
        let mut buffer = Vec::new();

        while let Some(chunk_result) = stream.next().await {
            let chunk = chunk_result?;
            buffer.extend_from_slice(&chunk);

            while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
                let line = buffer.drain(..=newline_pos).collect::<Vec<_>>();
                handle_line(&line[..line.len() - 1], &mut callback)?;
            }
        }

        // The final object may arrive without a trailing newline
        handle_line(&buffer, &mut callback)?;

        Ok(())
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>> {
        let url = format!("{}/api/tags", self.base_url);
        let response = self.http_client.get(&url).send().await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(ProviderError::Api(error_text));
        }

        let tags = response.json::<TagsResponse>().await?;
        Ok(tags.models)
    }

    async fn version(&self) -> Result<String> {
        let url = format!("{}/api/version", self.base_url);
        let response = self.http_client.get(&url).send().await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(ProviderError::Api(error_text));
        }

        let version = response.json::<VersionResponse>().await?;
        Ok(version.version)
    }
}

/// Parses one NDJSON line of a chat stream and forwards it.
fn handle_line(line: &[u8], callback: &mut dyn FnMut(ChatResponse)) -> Result<()> {
    let line_str = String::from_utf8_lossy(line);
    let line_str = line_str.trim();
    if line_str.is_empty() {
        return Ok(());
    }

    match serde_json::from_str::<StreamLine>(line_str) {
        Ok(StreamLine::Error { error }) => Err(ProviderError::Api(error)),
        Ok(StreamLine::Chunk(chunk)) => {
            callback(ChatResponse {
                model: chunk.model,
                content: chunk.message.map(|m| m.content).unwrap_or_default(),
                done: chunk.done,
            });
            Ok(())
        }
        Err(e) => {
            warn!("Skipping malformed stream line: {}", e);
            Ok(())
        }
    }
}

// Ollama-specific request/response types (internal)

#[derive(Debug, Clone, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<HashMap<String, serde_json::Value>>,
    stream: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    images: Option<Vec<String>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum StreamLine {
    Error { error: String },
    Chunk(OllamaChatResponse),
}

#[derive(Debug, Clone, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Debug, Clone, Deserialize)]
struct VersionResponse {
    version: String,
}
