use super::types::{Request, StreamChunk};
use futures::{SinkExt, StreamExt};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixListener;
use tokio::sync::mpsc;
use tokio_util::codec::{FramedRead, FramedWrite, LinesCodec, LinesCodecError};

/// Longest request line accepted from a client.
const MAX_REQUEST_BYTES: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Framing error: {0}")]
    Codec(#[from] LinesCodecError),

    #[error("Connection closed before a request was received")]
    Closed,
}

pub type Result<T> = std::result::Result<T, TransportError>;

/// Unix socket transport for IPC communication.
pub struct UnixSocketTransport {
    socket_path: PathBuf,
}

impl UnixSocketTransport {
    pub fn new(socket_path: impl Into<PathBuf>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Binds to the Unix socket, replacing a stale socket file.
    pub async fn bind(&self) -> Result<UnixListener> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.socket_path, perms)?;
        }

        Ok(listener)
    }

    /// Removes the socket file.
    pub fn cleanup(&self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

/// Reads the single request line of a connection.
pub async fn read_request<R>(reader: R) -> Result<Request>
where
    R: AsyncRead + Unpin,
{
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_REQUEST_BYTES));

    while let Some(line) = lines.next().await {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        return Ok(serde_json::from_str(&line)?);
    }

    Err(TransportError::Closed)
}

/// Writes stream chunks to the client until a final chunk or the channel closes.
pub async fn write_chunks<W>(writer: W, mut receiver: mpsc::UnboundedReceiver<StreamChunk>) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut lines = FramedWrite::new(writer, LinesCodec::new());

    while let Some(chunk) = receiver.recv().await {
        let is_final = chunk.is_final();
        lines.send(serde_json::to_string(&chunk)?).await?;
        if is_final {
            break;
        }
    }

    SinkExt::<String>::close(&mut lines).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::types::{ChunkType, RequestType};
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_read_request_skips_blank_lines() {
        let input: &[u8] = b"\n{\"type\":\"models\"}\n";
        let request = read_request(input).await.unwrap();
        assert_eq!(request.request_type, RequestType::Models);
    }

    #[tokio::test]
    async fn test_read_request_errors() {
        let empty: &[u8] = b"";
        assert!(matches!(read_request(empty).await, Err(TransportError::Closed)));

        let garbage: &[u8] = b"not json\n";
        assert!(matches!(read_request(garbage).await, Err(TransportError::Json(_))));
    }

    #[tokio::test]
    async fn test_write_chunks_stops_after_final() {
        let (client, server) = tokio::io::duplex(4096);
        let (sender, receiver) = mpsc::unbounded_channel();
        sender.send(StreamChunk::chunk("a")).unwrap();
        sender.send(StreamChunk::done("a")).unwrap();
        sender.send(StreamChunk::chunk("ignored")).unwrap();

        write_chunks(server, receiver).await.unwrap();

        let mut out = String::new();
        let mut client = client;
        client.read_to_string(&mut out).await.unwrap();

        let chunks: Vec<StreamChunk> = out.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].chunk_type, ChunkType::Done);
    }
}
