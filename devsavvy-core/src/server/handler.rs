use super::types::{HistoryMessage, Request, RequestType, StreamChunk};
use crate::chat::ChatManager;
use crate::config::Config;
use crate::history::Conversation;
use crate::provider::{Message, Provider};
use devsavvy_files::{build_context, FileProcessor, ProcessedFile};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub type ChunkSender = mpsc::UnboundedSender<StreamChunk>;

/// Handles different request types and sends responses via channel.
pub struct RequestHandler {
    config: Config,
    provider: Arc<dyn Provider>,
    processor: FileProcessor,
}

impl RequestHandler {
    pub fn new(config: Config, provider: Arc<dyn Provider>) -> Self {
        let processor = FileProcessor::new(config.files.clone());
        Self {
            config,
            provider,
            processor,
        }
    }

    /// Routes request to appropriate handler based on type.
    pub async fn handle(&self, request: Request, sender: ChunkSender) {
        debug!(request_type = ?request.request_type, files = request.files.len(), "Handling request");
        match request.request_type {
            RequestType::Chat => self.handle_chat(request, sender).await,
            RequestType::Extract => self.handle_extract(request, sender).await,
            RequestType::Models => self.handle_models(sender).await,
            RequestType::Stats => self.handle_stats(sender),
        }
    }

    async fn handle_chat(&self, request: Request, sender: ChunkSender) {
        let mut manager = ChatManager::new(self.config.clone())
            .with_provider(Arc::clone(&self.provider))
            .with_conversation(self.conversation_from(request.history));

        if let Some(source_only) = request.source_only {
            manager.set_source_only(source_only);
        }

        // Clients number sources by request position, so a dropped duplicate
        // would shift every later index.
        for path in &request.files {
            match manager.attach_path(path).await {
                Ok(true) => {}
                Ok(false) => {
                    warn!(path = %path, "Rejecting chat request with duplicate file");
                    let _ = sender.send(StreamChunk::error(format!(
                        "{} duplicates an earlier file in this request",
                        path
                    )));
                    return;
                }
                Err(e) => {
                    let _ = sender.send(StreamChunk::error(format!("{:#}", e)));
                    return;
                }
            }
        }

        let chunks = sender.clone();
        let result = manager
            .query_stream(&request.content, move |content| {
                let _ = chunks.send(StreamChunk::chunk(content));
            })
            .await;

        match result {
            Ok(reply) => {
                let _ = sender.send(StreamChunk::done(reply.content).with_citations(reply.citations));
            }
            Err(e) => {
                let _ = sender.send(StreamChunk::error(format!("{:#}", e)));
            }
        }
    }

    async fn handle_extract(&self, request: Request, sender: ChunkSender) {
        match self.process_files(&request.files).await {
            Ok(files) => {
                let _ = sender.send(StreamChunk::done(build_context(&files)));
            }
            Err(e) => {
                let _ = sender.send(StreamChunk::error(format!("Failed to extract: {}", e)));
            }
        }
    }

    async fn handle_models(&self, sender: ChunkSender) {
        match self.provider.list_models().await {
            Ok(models) => {
                let names: Vec<String> = models.into_iter().map(|m| m.name).collect();
                let _ = sender.send(StreamChunk::done(names.join("\n")));
            }
            Err(e) => {
                let _ = sender.send(StreamChunk::error(format!("Failed to list models: {}", e)));
            }
        }
    }

    fn handle_stats(&self, sender: ChunkSender) {
        let _ = sender.send(StreamChunk::done(format!(
            "Model: {} @ {}",
            self.config.llm.model, self.config.llm.base_url
        )));
    }

    async fn process_files(&self, paths: &[String]) -> devsavvy_files::Result<Vec<ProcessedFile>> {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            files.push(self.processor.process_path(path).await?);
        }
        Ok(files)
    }

    /// Rebuilds prior turns sent by the client. Unknown roles are dropped.
    fn conversation_from(&self, history: Option<Vec<HistoryMessage>>) -> Conversation {
        let mut conversation = Conversation::new(&self.config.llm.model);
        for msg in history.unwrap_or_default() {
            match msg.role.as_str() {
                "user" => conversation.push(Message::user(msg.content)),
                "assistant" => conversation.push(Message::assistant(msg.content)),
                other => warn!(role = other, "Ignoring history message with unknown role"),
            }
        }
        conversation
    }
}
