//! Conversation persistence.
//!
//! Each conversation is stored as `<id>.json` in the history directory.

use crate::provider::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};
use uuid::Uuid;

const TITLE_MAX_CHARS: usize = 60;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("No conversation matches '{0}'")]
    NotFound(String),

    #[error("'{0}' matches more than one conversation")]
    Ambiguous(String),
}

pub type Result<T> = std::result::Result<T, HistoryError>;

/// A saved chat conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: Uuid,
    pub title: String,
    pub model: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new(model: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            title: String::new(),
            model: model.into(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        }
    }

    /// Appends a message. The first user message names the conversation.
    pub fn push(&mut self, message: Message) {
        if self.title.is_empty() && message.role == "user" {
            self.title = derive_title(&message.content);
        }
        self.updated_at = Utc::now();
        self.messages.push(message);
    }

    pub fn summary(&self) -> ConversationSummary {
        ConversationSummary {
            id: self.id,
            title: self.title.clone(),
            updated_at: self.updated_at,
            message_count: self.messages.len(),
        }
    }
}

/// First line of `content`, shortened to a title.
fn derive_title(content: &str) -> String {
    let line = content.lines().find(|l| !l.trim().is_empty()).unwrap_or("").trim();
    if line.chars().count() <= TITLE_MAX_CHARS {
        return line.to_string();
    }
    let cut: String = line.chars().take(TITLE_MAX_CHARS - 1).collect();
    format!("{}…", cut.trim_end())
}

/// Listing entry for a stored conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: Uuid,
    pub title: String,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

/// Directory-backed conversation store.
#[derive(Debug, Clone)]
pub struct ConversationStore {
    dir: PathBuf,
}

impl ConversationStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &Uuid) -> PathBuf {
        self.dir.join(format!("{}.json", id))
    }

    /// Writes the conversation, replacing any earlier version.
    pub async fn save(&self, conversation: &Conversation) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(&conversation.id);
        let json = serde_json::to_string_pretty(conversation)?;
        fs::write(&path, json).await?;
        debug!(path = %path.display(), "Saved conversation");
        Ok(path)
    }

    /// Loads a conversation by full id or unique id prefix.
    pub async fn load(&self, id: &str) -> Result<Conversation> {
        let path = self.resolve(id).await?;
        let json = fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Lists stored conversations, most recently updated first.
    pub async fn list(&self) -> Result<Vec<ConversationSummary>> {
        let mut summaries = Vec::new();
        for path in self.json_files().await? {
            let parsed = fs::read_to_string(&path)
                .await
                .map_err(HistoryError::from)
                .and_then(|json| Ok(serde_json::from_str::<Conversation>(&json)?));

            match parsed {
                Ok(conversation) => summaries.push(conversation.summary()),
                Err(e) => warn!(path = %path.display(), "Skipping unreadable conversation: {}", e),
            }
        }

        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }

    /// Deletes a conversation by id or unique prefix.
    pub async fn delete(&self, id: &str) -> Result<()> {
        let path = self.resolve(id).await?;
        fs::remove_file(path).await?;
        Ok(())
    }

    async fn resolve(&self, id: &str) -> Result<PathBuf> {
        let id = id.trim();
        if id.is_empty() {
            return Err(HistoryError::NotFound(id.to_string()));
        }

        let matches: Vec<PathBuf> = self
            .json_files()
            .await?
            .into_iter()
            .filter(|p| {
                p.file_stem()
                    .and_then(|s| s.to_str())
                    .map(|stem| stem.starts_with(id))
                    .unwrap_or(false)
            })
            .collect();

        match matches.len() {
            0 => Err(HistoryError::NotFound(id.to_string())),
            1 => Ok(matches.into_iter().next().unwrap_or_default()),
            _ => Err(HistoryError::Ambiguous(id.to_string())),
        }
    }

    async fn json_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                files.push(path);
            }
        }

        Ok(files)
    }
}
