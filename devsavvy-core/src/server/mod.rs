//! Unix socket server so a front-end can drive the chat engine.
//!
//! The server is organized into separate concerns:
//! - `types`: Protocol types for requests and responses
//! - `handler`: Business logic for processing requests
//! - `transport`: Unix socket communication layer
//!
//! Each connection carries one NDJSON request and receives NDJSON
//! [`StreamChunk`]s until a `done` or `error` chunk.

mod handler;
mod transport;
mod types;

pub use transport::TransportError;
pub use types::{ChunkType, HistoryMessage, Request, RequestType, StreamChunk};

use crate::provider::{OllamaProvider, Provider};
use crate::{config::Config, detection};
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use tokio::net::UnixStream;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Main server coordinating transport and request handling.
pub struct Server {
    handler: Arc<handler::RequestHandler>,
    transport: transport::UnixSocketTransport,
}

impl Server {
    /// Creates a new server instance.
    ///
    /// This will check if Ollama is installed and running.
    /// If not, helpful installation/startup instructions will be printed.
    pub async fn new(config: Config) -> Result<Self, detection::DetectionError> {
        detection::detect_ollama(&config.llm.base_url).await?;

        let provider = Arc::new(OllamaProvider::from_config(&config));
        Ok(Self::with_provider(config, provider))
    }

    /// Creates a server around an existing provider without checking Ollama.
    pub fn with_provider(config: Config, provider: Arc<dyn Provider>) -> Self {
        let transport = transport::UnixSocketTransport::new(&config.storage.socket_path);
        let handler = Arc::new(handler::RequestHandler::new(config, provider));
        Self { handler, transport }
    }

    pub fn socket_path(&self) -> &Path {
        self.transport.socket_path()
    }

    /// Starts the server and listens for connections until Ctrl-C.
    pub async fn start(&self) -> transport::Result<()> {
        self.run_until(async {
            let _ = signal::ctrl_c().await;
        })
        .await
    }

    /// Serves connections until `shutdown` completes, then removes the socket.
    pub async fn run_until<F>(&self, shutdown: F) -> transport::Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = self.transport.bind().await?;
        info!(socket = %self.socket_path().display(), "Server listening");

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let handler = Arc::clone(&self.handler);
                        tokio::spawn(async move {
                            if let Err(e) = handle_connection(stream, handler).await {
                                error!("Connection error: {}", e);
                            }
                        });
                    }
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
                _ = &mut shutdown => {
                    info!("Shutting down");
                    self.transport.cleanup();
                    break;
                }
            }
        }

        Ok(())
    }
}

/// Handles a single client connection.
async fn handle_connection(stream: UnixStream, handler: Arc<handler::RequestHandler>) -> transport::Result<()> {
    let (reader, writer) = stream.into_split();

    let (sender, receiver) = mpsc::unbounded_channel();
    let request = match transport::read_request(reader).await {
        Ok(request) => request,
        Err(e) => {
            let _ = sender.send(StreamChunk::error(format!("Invalid request: {}", e)));
            drop(sender);
            transport::write_chunks(writer, receiver).await?;
            return Err(e);
        }
    };

    let handle_task = tokio::spawn(async move {
        handler.handle(request, sender).await;
    });

    let write_result = transport::write_chunks(writer, receiver).await;
    if let Err(e) = handle_task.await {
        error!("Request handler panicked: {}", e);
    }

    write_result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ChatRequest, ChatResponse, ModelInfo};
    use async_trait::async_trait;
    use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
    use tokio::sync::oneshot;

    struct EchoProvider;

    #[async_trait]
    impl Provider for EchoProvider {
        async fn chat<'a>(
            &'a self,
            request: ChatRequest,
            mut callback: Box<dyn FnMut(ChatResponse) + Send + 'a>,
        ) -> crate::provider::Result<()> {
            for part in ["See ", "[Source 1]", "."] {
                callback(ChatResponse {
                    model: request.model.clone(),
                    content: part.to_string(),
                    done: false,
                });
            }
            Ok(())
        }

        async fn list_models(&self) -> crate::provider::Result<Vec<ModelInfo>> {
            Ok(vec![
                ModelInfo {
                    name: "llama3.2:3b".to_string(),
                    size: 0,
                    modified_at: String::new(),
                },
                ModelInfo {
                    name: "llava".to_string(),
                    size: 0,
                    modified_at: String::new(),
                },
            ])
        }

        async fn version(&self) -> crate::provider::Result<String> {
            Ok("0.0.0".to_string())
        }
    }

    async fn roundtrip(socket: &Path, request: &str) -> Vec<StreamChunk> {
        let mut stream = UnixStream::connect(socket).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        stream.write_all(b"\n").await.unwrap();

        let mut chunks = Vec::new();
        let mut lines = BufReader::new(stream).lines();
        while let Some(line) = lines.next_line().await.unwrap() {
            chunks.push(serde_json::from_str(&line).unwrap());
        }
        chunks
    }

    #[tokio::test]
    async fn test_server_requests() {
        let dir = tempfile::tempdir().unwrap();
        let notes = dir.path().join("notes.md");
        std::fs::write(&notes, "# Notes\nRust is fast").unwrap();

        let mut config = Config::default();
        config.storage.socket_path = dir.path().join("test.sock").to_string_lossy().into_owned();

        let server = Arc::new(Server::with_provider(config, Arc::new(EchoProvider)));
        let socket = server.socket_path().to_path_buf();
        let (stop, stopped) = oneshot::channel::<()>();

        let running = {
            let server = Arc::clone(&server);
            tokio::spawn(async move {
                server
                    .run_until(async {
                        let _ = stopped.await;
                    })
                    .await
            })
        };

        while !socket.exists() {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }

        let chat = serde_json::json!({
            "type": "chat",
            "content": "What is Rust?",
            "files": [notes.to_string_lossy()],
        });
        let chunks = roundtrip(&socket, &chat.to_string()).await;
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0].chunk_type, ChunkType::Chunk);
        let done = chunks.last().unwrap();
        assert_eq!(done.chunk_type, ChunkType::Done);
        assert_eq!(done.content, "See [Source 1].");
        let citations = done.citations.as_ref().unwrap();
        assert_eq!(citations[0].name.as_deref(), Some("notes.md"));

        let chunks = roundtrip(&socket, r#"{"type":"models"}"#).await;
        assert_eq!(chunks[0].content, "llama3.2:3b\nllava");

        let extract = serde_json::json!({ "type": "extract", "files": [notes.to_string_lossy()] });
        let chunks = roundtrip(&socket, &extract.to_string()).await;
        assert!(chunks[0].content.contains("[Source 1: notes.md]"));
        assert!(chunks[0].content.contains("Rust is fast"));

        let missing = serde_json::json!({ "type": "extract", "files": ["/nonexistent/file.txt"] });
        let chunks = roundtrip(&socket, &missing.to_string()).await;
        assert_eq!(chunks[0].chunk_type, ChunkType::Error);

        let chunks = roundtrip(&socket, "garbage").await;
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_type, ChunkType::Error);

        stop.send(()).unwrap();
        running.await.unwrap().unwrap();
        assert!(!socket.exists());
    }
}
