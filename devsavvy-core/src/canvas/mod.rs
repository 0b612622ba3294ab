//! Visual canvas state with undo/redo, named snapshots and share links.
//!
//! Every mutation goes through [`CanvasState`], which records the previous
//! board on a bounded undo stack. A new mutation clears the redo stack, so
//! history stays linear.

mod model;
mod share;

pub use model::{Canvas, CanvasEdge, CanvasNode, NodeKind, Position};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::path::Path;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_MAX_HISTORY: usize = 50;

#[derive(Debug, Error)]
pub enum CanvasError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Edge not found: {0}")]
    EdgeNotFound(String),

    #[error("Cannot connect node {0} to itself")]
    SelfLoop(String),

    #[error("Nodes {from} and {to} are already connected")]
    DuplicateEdge { from: String, to: String },

    #[error("Snapshot not found: {0}")]
    SnapshotNotFound(String),

    #[error("Invalid share link: {0}")]
    InvalidShareLink(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CanvasError>;

/// A named copy of the board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub canvas: Canvas,
}

/// The board plus its undo/redo history and snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanvasState {
    canvas: Canvas,
    #[serde(default)]
    past: VecDeque<Canvas>,
    #[serde(default)]
    future: Vec<Canvas>,
    #[serde(default)]
    snapshots: BTreeMap<String, Snapshot>,
    #[serde(default = "default_max_history")]
    max_history: usize,
}

fn default_max_history() -> usize {
    DEFAULT_MAX_HISTORY
}

impl Default for CanvasState {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_HISTORY)
    }
}

fn new_id(prefix: &str) -> String {
    format!("{}-{}", prefix, Uuid::now_v7().simple())
}

impl CanvasState {
    pub fn new(max_history: usize) -> Self {
        Self::from_canvas(Canvas::default(), max_history)
    }

    pub fn from_canvas(canvas: Canvas, max_history: usize) -> Self {
        Self {
            canvas,
            past: VecDeque::new(),
            future: Vec::new(),
            snapshots: BTreeMap::new(),
            max_history: max_history.max(1),
        }
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// Pushes the current board onto the undo stack before a mutation.
    fn record(&mut self) {
        self.past.push_back(self.canvas.clone());
        while self.past.len() > self.max_history {
            self.past.pop_front();
        }
        self.future.clear();
    }

    pub fn add_node(&mut self, kind: NodeKind, content: impl Into<String>, position: Position) -> String {
        self.record();
        let id = new_id("node");
        self.canvas.nodes.push(CanvasNode {
            id: id.clone(),
            kind,
            content: content.into(),
            position,
        });
        debug!(node = %id, "Added canvas node");
        id
    }

    pub fn update_content(&mut self, id: &str, content: impl Into<String>) -> Result<()> {
        self.require_node(id)?;
        self.record();
        if let Some(node) = self.canvas.node_mut(id) {
            node.content = content.into();
        }
        Ok(())
    }

    pub fn move_node(&mut self, id: &str, position: Position) -> Result<()> {
        self.require_node(id)?;
        self.record();
        if let Some(node) = self.canvas.node_mut(id) {
            node.position = position;
        }
        Ok(())
    }

    /// Removes a node together with every edge touching it.
    pub fn remove_node(&mut self, id: &str) -> Result<CanvasNode> {
        let index = self
            .canvas
            .nodes
            .iter()
            .position(|n| n.id == id)
            .ok_or_else(|| CanvasError::NodeNotFound(id.to_string()))?;

        self.record();
        self.canvas.edges.retain(|e| e.source != id && e.target != id);
        Ok(self.canvas.nodes.remove(index))
    }

    pub fn connect(&mut self, source: &str, target: &str, label: Option<String>) -> Result<String> {
        self.require_node(source)?;
        self.require_node(target)?;
        if source == target {
            return Err(CanvasError::SelfLoop(source.to_string()));
        }
        if self
            .canvas
            .edges
            .iter()
            .any(|e| e.source == source && e.target == target)
        {
            return Err(CanvasError::DuplicateEdge {
                from: source.to_string(),
                to: target.to_string(),
            });
        }

        self.record();
        let id = new_id("edge");
        self.canvas.edges.push(CanvasEdge {
            id: id.clone(),
            source: source.to_string(),
            target: target.to_string(),
            label,
        });
        Ok(id)
    }

    pub fn disconnect(&mut self, edge_id: &str) -> Result<CanvasEdge> {
        let index = self
            .canvas
            .edges
            .iter()
            .position(|e| e.id == edge_id)
            .ok_or_else(|| CanvasError::EdgeNotFound(edge_id.to_string()))?;

        self.record();
        Ok(self.canvas.edges.remove(index))
    }

    /// Empties the board. Clearing an empty board is not recorded.
    pub fn clear(&mut self) {
        if self.canvas.is_empty() {
            return;
        }
        self.record();
        self.canvas = Canvas::default();
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn undo(&mut self) -> bool {
        match self.past.pop_back() {
            Some(previous) => {
                let current = std::mem::replace(&mut self.canvas, previous);
                self.future.push(current);
                true
            }
            None => false,
        }
    }

    pub fn redo(&mut self) -> bool {
        match self.future.pop() {
            Some(next) => {
                let current = std::mem::replace(&mut self.canvas, next);
                self.past.push_back(current);
                true
            }
            None => false,
        }
    }

    /// Saves the current board under `name`, replacing a snapshot of the same name.
    pub fn save_snapshot(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.snapshots.insert(
            name.clone(),
            Snapshot {
                name,
                created_at: Utc::now(),
                canvas: self.canvas.clone(),
            },
        );
    }

    /// Replaces the board with a snapshot. The restore itself can be undone.
    pub fn restore_snapshot(&mut self, name: &str) -> Result<()> {
        let canvas = self
            .snapshots
            .get(name)
            .map(|s| s.canvas.clone())
            .ok_or_else(|| CanvasError::SnapshotNotFound(name.to_string()))?;

        self.record();
        self.canvas = canvas;
        Ok(())
    }

    pub fn delete_snapshot(&mut self, name: &str) -> bool {
        self.snapshots.remove(name).is_some()
    }

    /// Snapshots ordered by name.
    pub fn snapshots(&self) -> Vec<&Snapshot> {
        self.snapshots.values().collect()
    }

    /// Builds a link that carries the whole board in its fragment.
    pub fn share_link(&self, base_url: &str) -> Result<String> {
        share::encode(base_url, &self.canvas)
    }

    /// Opens a board from a share link with fresh history.
    pub fn from_share_link(link: &str) -> Result<Self> {
        Ok(Self::from_canvas(share::decode(link)?, DEFAULT_MAX_HISTORY))
    }

    /// Persists board, history and snapshots as JSON.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        Ok(())
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = tokio::fs::read_to_string(path).await?;
        let mut state: Self = serde_json::from_str(&json)?;
        state.max_history = state.max_history.max(1);
        while state.past.len() > state.max_history {
            state.past.pop_front();
        }
        Ok(state)
    }

    /// Loads the state at `path`, or starts an empty board if the file does not exist.
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        match Self::load(path).await {
            Err(CanvasError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            other => other,
        }
    }

    fn require_node(&self, id: &str) -> Result<()> {
        self.canvas
            .node(id)
            .map(|_| ())
            .ok_or_else(|| CanvasError::NodeNotFound(id.to_string()))
    }
}
