//! Workflow persistence.
//!
//! The engine does not care where graphs live. Storage is abstracted behind
//! [`WorkflowStore`]; this module ships an in-memory store for tests and
//! embedding and a directory store that keeps one JSON file per workflow.

use crate::definition::WorkflowSummary;
use crate::graph::WorkflowGraph;
use async_trait::async_trait;
use rootcause::Report;
use std::collections::HashMap;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use agentflow_core::WorkflowId;

/// Errors from workflow stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Reading or writing the backing storage failed.
    Io { path: String, reason: String },
    /// A stored workflow could not be decoded.
    Corrupt { path: String, reason: String },
    /// A workflow could not be encoded.
    Encode { workflow_id: WorkflowId, reason: String },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, reason } => write!(f, "storage I/O failed at '{path}': {reason}"),
            Self::Corrupt { path, reason } => {
                write!(f, "stored workflow '{path}' is corrupt: {reason}")
            }
            Self::Encode {
                workflow_id,
                reason,
            } => write!(f, "failed to encode workflow {workflow_id}: {reason}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Where workflow graphs are kept.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// Loads a workflow. A missing workflow is `Ok(None)`.
    async fn load(&self, id: WorkflowId) -> Result<Option<WorkflowGraph>, Report<StoreError>>;

    /// Saves a workflow, replacing any previous copy.
    async fn save(&self, graph: &WorkflowGraph) -> Result<(), Report<StoreError>>;

    /// Summaries of every stored workflow, ordered by id.
    async fn list(&self) -> Result<Vec<WorkflowSummary>, Report<StoreError>>;

    /// Deletes a workflow. Returns whether it existed.
    async fn delete(&self, id: WorkflowId) -> Result<bool, Report<StoreError>>;
}

/// Bumps the version if edits are pending, then saves.
///
/// Returns true if the version was bumped. On a failed save the bump is
/// kept so the next attempt does not bump again.
#[instrument(skip_all, fields(workflow_id = %graph.id))]
pub async fn persist(
    store: &dyn WorkflowStore,
    graph: &mut WorkflowGraph,
) -> Result<bool, Report<StoreError>> {
    let bumped = graph.prepare_save();
    store.save(graph).await?;
    debug!(version = graph.version, bumped, "workflow persisted");
    Ok(bumped)
}

/// Workflows held in memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    graphs: RwLock<HashMap<WorkflowId, WorkflowGraph>>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn load(&self, id: WorkflowId) -> Result<Option<WorkflowGraph>, Report<StoreError>> {
        Ok(self.graphs.read().await.get(&id).cloned())
    }

    async fn save(&self, graph: &WorkflowGraph) -> Result<(), Report<StoreError>> {
        self.graphs.write().await.insert(graph.id, graph.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<WorkflowSummary>, Report<StoreError>> {
        let graphs = self.graphs.read().await;
        let mut summaries: Vec<_> = graphs.values().map(WorkflowSummary::from).collect();
        summaries.sort_by_key(|s| s.id);
        Ok(summaries)
    }

    async fn delete(&self, id: WorkflowId) -> Result<bool, Report<StoreError>> {
        Ok(self.graphs.write().await.remove(&id).is_some())
    }
}

/// Workflows kept as `<id>.json` files in a directory.
///
/// The directory is created on first save. Files are written to a
/// temporary name and renamed into place.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
}

fn io_error(path: &Path, e: &std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        reason: e.to_string(),
    }
}

impl DirectoryStore {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: WorkflowId) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    async fn read_graph(path: &Path) -> Result<Option<WorkflowGraph>, Report<StoreError>> {
        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_error(path, &e).into()),
        };
        let graph = serde_json::from_str(&text).map_err(|e| StoreError::Corrupt {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Some(graph))
    }
}

#[async_trait]
impl WorkflowStore for DirectoryStore {
    #[instrument(skip(self))]
    async fn load(&self, id: WorkflowId) -> Result<Option<WorkflowGraph>, Report<StoreError>> {
        Self::read_graph(&self.path_for(id)).await
    }

    #[instrument(skip_all, fields(workflow_id = %graph.id))]
    async fn save(&self, graph: &WorkflowGraph) -> Result<(), Report<StoreError>> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| io_error(&self.root, &e))?;

        let content = serde_json::to_string_pretty(graph).map_err(|e| StoreError::Encode {
            workflow_id: graph.id,
            reason: e.to_string(),
        })?;

        let path = self.path_for(graph.id);
        let staging = path.with_extension("json.tmp");
        tokio::fs::write(&staging, content)
            .await
            .map_err(|e| io_error(&staging, &e))?;
        tokio::fs::rename(&staging, &path)
            .await
            .map_err(|e| io_error(&path, &e))?;

        debug!(path = %path.display(), "saved workflow");
        Ok(())
    }

    /// Unreadable files are skipped with a warning.
    async fn list(&self) -> Result<Vec<WorkflowSummary>, Report<StoreError>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(&self.root, &e).into()),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_error(&self.root, &e))?
        {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match Self::read_graph(&path).await {
                Ok(Some(graph)) => summaries.push(WorkflowSummary::from(&graph)),
                Ok(None) => {}
                Err(report) => warn!(path = %path.display(), error = %report, "skipping workflow file"),
            }
        }

        summaries.sort_by_key(|s| s.id);
        Ok(summaries)
    }

    async fn delete(&self, id: WorkflowId) -> Result<bool, Report<StoreError>> {
        let path = self.path_for(id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_error(&path, &e).into()),
        }
    }
}
