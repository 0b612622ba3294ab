//! Chat conversation management with file-context augmentation.
//!
//! This module provides the conversation orchestration for DevSavvy:
//! multi-turn chats with streaming responses, attached files injected as
//! numbered sources, and citation tracking on the replies.
//!
//! # Query Flow
//!
//! ```text
//! attachments ─┐
//!              ├─ build_prompt ─→ [system, history…, user] ─→ LLM ─→ reply
//! message ─────┘                                                    │
//!                                                 extract_citations ┘
//! ```
//!
//! # Demo Mode
//!
//! When the Ollama server cannot be reached and `chat.demo_fallback` is set,
//! the manager answers with a canned reply explaining how to start the
//! server instead of failing. The fallback only applies when the request
//! fails before any content arrived. Demo replies are not recorded in history.

use crate::config::Config;
use crate::history::Conversation;
use crate::provider::{ChatRequest, Message, OllamaProvider, Provider, ProviderError};
use anyhow::{Context, Result};
use devsavvy_files::{
    build_prompt, extract_citations, source_refs, Citation, FileProcessor, ProcessedFile,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Final result of a query.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    pub content: String,
    /// Sources cited in `content`, resolved against the attachments.
    pub citations: Vec<Citation>,
    /// True when the reply was produced by demo mode.
    pub demo: bool,
}

/// Manages a conversation with attached context files.
///
/// # Examples
///
/// ```no_run
/// use devsavvy_core::{ChatManager, Config};
///
/// # async fn example() -> anyhow::Result<()> {
/// let mut manager = ChatManager::new(Config::load_or_default());
/// manager.attach_path("docs/report.pdf").await?;
/// manager.set_source_only(true);
///
/// let reply = manager.query("Summarize the report").await?;
/// println!("{}", reply.content);
/// for citation in reply.citations {
///     println!("cited [Source {}] {:?}", citation.index, citation.name);
/// }
/// # Ok(())
/// # }
/// ```
pub struct ChatManager {
    config: Config,
    provider: Arc<dyn Provider>,
    processor: FileProcessor,
    attachments: Vec<ProcessedFile>,
    conversation: Conversation,
    source_only: bool,
}

impl ChatManager {
    /// Creates a chat manager talking to the Ollama server from `config`.
    pub fn new(config: Config) -> Self {
        let provider: Arc<dyn Provider> = Arc::new(OllamaProvider::from_config(&config));
        let processor = FileProcessor::new(config.files.clone());
        let conversation = Conversation::new(&config.llm.model);
        let source_only = config.chat.source_only;

        Self {
            config,
            provider,
            processor,
            attachments: Vec::new(),
            conversation,
            source_only,
        }
    }

    /// Replace the LLM provider.
    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        self.provider = provider;
        self
    }

    /// Continue a previously saved conversation.
    pub fn with_conversation(mut self, conversation: Conversation) -> Self {
        self.conversation = conversation;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn source_only(&self) -> bool {
        self.source_only
    }

    pub fn set_source_only(&mut self, enabled: bool) {
        self.source_only = enabled;
    }

    pub fn attachments(&self) -> &[ProcessedFile] {
        &self.attachments
    }

    /// Adds a processed file as context. Returns `false` if identical content
    /// is already attached.
    pub fn attach(&mut self, file: ProcessedFile) -> bool {
        if self.attachments.iter().any(|f| f.id == file.id) {
            debug!(name = %file.name, "File already attached");
            return false;
        }

        info!(name = %file.name, kind = ?file.kind, chars = file.text.len(), "Attached file");
        self.attachments.push(file);
        true
    }

    /// Reads, extracts and attaches a file from disk.
    pub async fn attach_path(&mut self, path: impl AsRef<Path>) -> Result<bool> {
        let path = path.as_ref();
        let file = self
            .processor
            .process_path(path)
            .await
            .with_context(|| format!("Failed to process {}", path.display()))?;
        Ok(self.attach(file))
    }

    /// Attaches every supported file below `dir`. Returns how many were added.
    pub async fn attach_directory(&mut self, dir: impl AsRef<Path>) -> Result<usize> {
        let dir = dir.as_ref();
        let files = self
            .processor
            .collect_directory(dir)
            .await
            .with_context(|| format!("Failed to collect {}", dir.display()))?;

        let mut added = 0;
        for file in files {
            if self.attach(file) {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Removes the attachment at 1-based source `index`.
    pub fn detach(&mut self, index: usize) -> Option<ProcessedFile> {
        if index == 0 || index > self.attachments.len() {
            return None;
        }
        Some(self.attachments.remove(index - 1))
    }

    pub fn clear_attachments(&mut self) {
        self.attachments.clear();
    }

    /// The conversation so far.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Starts a fresh conversation, keeping attachments.
    pub fn clear_history(&mut self) {
        self.conversation = Conversation::new(&self.config.llm.model);
    }

    /// Sends a query and returns the complete reply.
    pub async fn query(&mut self, user_message: &str) -> Result<ChatReply> {
        self.query_stream(user_message, |_| {}).await
    }

    /// Sends a query and streams the reply through `on_chunk`.
    ///
    /// `on_chunk` receives incremental content, not the accumulated reply.
    pub async fn query_stream<F>(&mut self, user_message: &str, mut on_chunk: F) -> Result<ChatReply>
    where
        F: FnMut(&str) + Send,
    {
        let request = self.build_request(user_message);
        debug!(messages = request.messages.len(), "Sending request to provider");

        let mut content = String::new();
        let result = self
            .provider
            .chat(
                request,
                Box::new(|response| {
                    if !response.content.is_empty() {
                        on_chunk(&response.content);
                        content.push_str(&response.content);
                    }
                }),
            )
            .await;

        match result {
            Ok(()) => {}
            // Once content has streamed, a demo reply would splice onto a real answer.
            Err(ProviderError::Request(e))
                if self.config.chat.demo_fallback && content.is_empty() =>
            {
                warn!("Ollama unreachable, answering in demo mode: {}", e);
                let content = self.demo_reply();
                on_chunk(&content);
                return Ok(ChatReply {
                    content,
                    citations: Vec::new(),
                    demo: true,
                });
            }
            Err(e) => return Err(e).context("Failed to get LLM response"),
        }

        let citations = extract_citations(&content, &source_refs(&self.attachments));
        self.conversation.push(Message::user(user_message));
        self.conversation.push(Message::assistant(&content));

        Ok(ChatReply {
            content,
            citations,
            demo: false,
        })
    }

    /// Assembles system prompt, recent history and the context-augmented message.
    fn build_request(&self, user_message: &str) -> ChatRequest {
        let prompt = build_prompt(user_message, &self.attachments, self.source_only);
        let images: Vec<String> = self
            .attachments
            .iter()
            .filter_map(|f| f.image_base64.clone())
            .collect();

        let history = &self.conversation.messages;
        let skip = history.len().saturating_sub(self.config.chat.max_history);

        let mut messages = Vec::with_capacity(history.len() - skip + 2);
        messages.push(Message::system(&self.config.system_prompt));
        messages.extend(history[skip..].iter().cloned());
        messages.push(Message::user(prompt).with_images(images));

        ChatRequest::new(&self.config.llm.model, messages)
            .with_temperature(self.config.llm.temperature)
            .with_context_length(self.config.llm.context_length)
    }

    fn demo_reply(&self) -> String {
        let mut reply = format!(
            "**Demo mode**: the Ollama server at {} could not be reached, so this is a \
             placeholder reply.\n\nStart it with `ollama serve` and make sure the model is \
             available with `ollama pull {}`.",
            self.config.llm.base_url, self.config.llm.model
        );

        if !self.attachments.is_empty() {
            reply.push_str("\n\nFiles ready to use as context once the server is up:");
            for source in source_refs(&self.attachments) {
                reply.push_str(&format!("\n- [Source {}] {}", source.index, source.name));
            }
        }

        reply
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatResponse, ModelInfo};
    use async_trait::async_trait;
    use devsavvy_files::SOURCE_ONLY_INSTRUCTION;
    use std::sync::Mutex;

    /// Replies with fixed chunks and records every request.
    struct ScriptedProvider {
        chunks: Vec<String>,
        requests: Mutex<Vec<ChatRequest>>,
    }

    impl ScriptedProvider {
        fn new(chunks: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                chunks: chunks.iter().map(|c| c.to_string()).collect(),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn last_request(&self) -> ChatRequest {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl Provider for ScriptedProvider {
        async fn chat<'a>(
            &'a self,
            request: ChatRequest,
            mut callback: Box<dyn FnMut(ChatResponse) + Send + 'a>,
        ) -> crate::provider::Result<()> {
            let model = request.model.clone();
            self.requests.lock().unwrap().push(request);
            for chunk in &self.chunks {
                callback(ChatResponse {
                    model: model.clone(),
                    content: chunk.clone(),
                    done: false,
                });
            }
            callback(ChatResponse {
                model,
                content: String::new(),
                done: true,
            });
            Ok(())
        }

        async fn list_models(&self) -> crate::provider::Result<Vec<ModelInfo>> {
            Ok(Vec::new())
        }

        async fn version(&self) -> crate::provider::Result<String> {
            Ok("test".to_string())
        }
    }

    /// Streams one chunk, then fails the way a dropped connection does.
    struct DroppingProvider;

    #[async_trait]
    impl Provider for DroppingProvider {
        async fn chat<'a>(
            &'a self,
            request: ChatRequest,
            mut callback: Box<dyn FnMut(ChatResponse) + Send + 'a>,
        ) -> crate::provider::Result<()> {
            callback(ChatResponse {
                model: request.model,
                content: "Partial answer ".to_string(),
                done: false,
            });
            let err = reqwest::get("http://127.0.0.1:9").await.unwrap_err();
            Err(ProviderError::Request(err))
        }

        async fn list_models(&self) -> crate::provider::Result<Vec<ModelInfo>> {
            Ok(Vec::new())
        }

        async fn version(&self) -> crate::provider::Result<String> {
            Ok("test".to_string())
        }
    }

    fn manager_with(provider: Arc<ScriptedProvider>) -> ChatManager {
        ChatManager::new(Config::default()).with_provider(provider)
    }

    fn text_file(name: &str, text: &str) -> ProcessedFile {
        FileProcessor::default()
            .process(name, None, text.as_bytes())
            .unwrap()
    }

    #[tokio::test]
    async fn test_query_streams_and_records_history() {
        let provider = ScriptedProvider::new(&["Hel", "lo"]);
        let mut manager = manager_with(provider.clone());

        let mut streamed = Vec::new();
        let reply = manager
            .query_stream("hi", |chunk| streamed.push(chunk.to_string()))
            .await
            .unwrap();

        assert_eq!(reply.content, "Hello");
        assert!(!reply.demo);
        assert_eq!(streamed, vec!["Hel", "lo"]);

        let messages = &manager.conversation().messages;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0], Message::user("hi"));
        assert_eq!(messages[1], Message::assistant("Hello"));

        let request = provider.last_request();
        assert_eq!(request.messages[0].role, "system");
        assert_eq!(request.messages.last().unwrap().content, "hi");
    }

    #[tokio::test]
    async fn test_attachments_become_sources_and_citations() {
        let provider = ScriptedProvider::new(&["Alpha is first [Source 1]. See also [Source 3]."]);
        let mut manager = manager_with(provider.clone());
        manager.attach(text_file("a.txt", "alpha"));
        manager.attach(text_file("b.txt", "beta"));
        manager.set_source_only(true);

        let reply = manager.query("What is alpha?").await.unwrap();

        let prompt = provider.last_request().messages.last().unwrap().content.clone();
        assert!(prompt.starts_with(SOURCE_ONLY_INSTRUCTION));
        assert!(prompt.contains("[Source 1: a.txt]\nalpha"));
        assert!(prompt.contains("[Source 2: b.txt]\nbeta"));
        assert!(prompt.ends_with("What is alpha?"));

        assert_eq!(reply.citations.len(), 2);
        assert_eq!(reply.citations[0].name.as_deref(), Some("a.txt"));
        assert!(!reply.citations[1].is_known());

        // History keeps the raw message, not the expanded prompt
        assert_eq!(manager.conversation().messages[0].content, "What is alpha?");
    }

    #[tokio::test]
    async fn test_images_are_forwarded() {
        let provider = ScriptedProvider::new(&["a chart"]);
        let mut manager = manager_with(provider.clone());
        let image = FileProcessor::default().process("chart.png", None, &[1, 2, 3]).unwrap();
        manager.attach(image);

        manager.query("describe").await.unwrap();

        let user = provider.last_request().messages.last().cloned().unwrap();
        assert_eq!(user.images, Some(vec!["AQID".to_string()]));
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let provider = ScriptedProvider::new(&["ok"]);
        let mut config = Config::default();
        config.chat.max_history = 2;
        let mut manager = ChatManager::new(config).with_provider(provider.clone());

        for i in 0..3 {
            manager.query(&format!("q{}", i)).await.unwrap();
        }

        // system + 2 history messages + current user message
        let request = provider.last_request();
        assert_eq!(request.messages.len(), 4);
        assert_eq!(request.messages[1].content, "q1");
        assert_eq!(manager.conversation().messages.len(), 6);
    }

    #[test]
    fn test_attach_deduplicates_and_detach() {
        let mut manager = manager_with(ScriptedProvider::new(&[]));
        assert!(manager.attach(text_file("a.txt", "same")));
        assert!(!manager.attach(text_file("copy.txt", "same")));
        assert!(manager.attach(text_file("b.txt", "other")));
        assert_eq!(manager.attachments().len(), 2);

        assert!(manager.detach(0).is_none());
        assert!(manager.detach(3).is_none());
        let removed = manager.detach(1).unwrap();
        assert_eq!(removed.name, "a.txt");
        assert_eq!(manager.attachments()[0].name, "b.txt");
    }

    #[tokio::test]
    async fn test_attach_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::write(&path, "remember").unwrap();

        let mut manager = manager_with(ScriptedProvider::new(&[]));
        assert!(manager.attach_path(&path).await.unwrap());
        assert!(!manager.attach_path(&path).await.unwrap());
        assert!(manager.attach_path(dir.path().join("missing.md")).await.is_err());
    }

    #[tokio::test]
    async fn test_demo_fallback_when_unreachable() {
        let mut config = Config::default();
        config.llm.base_url = "http://127.0.0.1:9".to_string();
        let mut manager = ChatManager::new(config);
        manager.attach(text_file("a.txt", "alpha"));

        let reply = manager.query("hi").await.unwrap();
        assert!(reply.demo);
        assert!(reply.content.contains("Demo mode"));
        assert!(reply.content.contains("[Source 1] a.txt"));
        assert!(manager.conversation().messages.is_empty());
    }

    #[tokio::test]
    async fn test_no_demo_fallback_after_partial_stream() {
        let mut manager = ChatManager::new(Config::default()).with_provider(Arc::new(DroppingProvider));
        assert!(manager.config().chat.demo_fallback);

        let mut streamed = String::new();
        let result = manager.query_stream("hi", |chunk| streamed.push_str(chunk)).await;

        assert!(result.is_err());
        assert_eq!(streamed, "Partial answer ");
        assert!(!streamed.contains("Demo mode"));
        assert!(manager.conversation().messages.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_without_fallback_errors() {
        let mut config = Config::default();
        config.llm.base_url = "http://127.0.0.1:9".to_string();
        config.chat.demo_fallback = false;
        let mut manager = ChatManager::new(config);

        assert!(manager.query("hi").await.is_err());
    }

    #[tokio::test]
    async fn test_clear_history_keeps_attachments() {
        let mut manager = manager_with(ScriptedProvider::new(&["ok"]));
        manager.attach(text_file("a.txt", "alpha"));
        manager.query("hi").await.unwrap();

        manager.clear_history();
        assert!(manager.conversation().messages.is_empty());
        assert_eq!(manager.attachments().len(), 1);
    }
}
