//! Export and import of workflows.
//!
//! An exported workflow is a [`WorkflowDocument`]: the full graph wrapped
//! with a format version and export timestamp. Importing a document creates
//! a new workflow owned by the importing user; structure is preserved
//! verbatim, identity and ownership are not.

use crate::definition::WorkflowMetadata;
use crate::graph::WorkflowGraph;
use chrono::{DateTime, Utc};
use rootcause::Report;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{info, instrument};

use agentflow_core::{UserId, WorkflowId};

/// Document format written by this version.
pub const FORMAT_VERSION: u32 = 1;

/// Errors from reading or writing workflow documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentError {
    /// The document was written by an incompatible version.
    UnsupportedVersion { found: u32, supported: u32 },
    /// The document is not valid JSON for a workflow document.
    Malformed { reason: String },
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedVersion { found, supported } => write!(
                f,
                "unsupported document format version {found} (supported: {supported})"
            ),
            Self::Malformed { reason } => write!(f, "malformed workflow document: {reason}"),
        }
    }
}

impl std::error::Error for DocumentError {}

/// A portable copy of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDocument {
    pub format_version: u32,
    pub exported_at: DateTime<Utc>,
    pub workflow: WorkflowGraph,
}

impl WorkflowDocument {
    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Malformed`] if encoding fails.
    pub fn to_json(&self) -> Result<String, Report<DocumentError>> {
        serde_json::to_string_pretty(self).map_err(|e| {
            DocumentError::Malformed {
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Parses a document and checks its format version.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentError::Malformed`] for text that is not a workflow
    /// document and [`DocumentError::UnsupportedVersion`] for documents
    /// from other format versions.
    pub fn from_json(text: &str) -> Result<Self, Report<DocumentError>> {
        let document: Self = serde_json::from_str(text).map_err(|e| DocumentError::Malformed {
            reason: e.to_string(),
        })?;
        if document.format_version != FORMAT_VERSION {
            return Err(DocumentError::UnsupportedVersion {
                found: document.format_version,
                supported: FORMAT_VERSION,
            }
            .into());
        }
        Ok(document)
    }
}

/// Wraps a workflow for export.
#[must_use]
pub fn export(graph: &WorkflowGraph) -> WorkflowDocument {
    WorkflowDocument {
        format_version: FORMAT_VERSION,
        exported_at: Utc::now(),
        workflow: graph.clone(),
    }
}

/// Creates a new workflow from a document.
///
/// The result has a new id, version 1, fresh timestamps and
/// `importing_user` as owner. Nodes, connections, variables and trigger
/// declarations are kept as they are in the document; tags are kept, the
/// template link is dropped.
///
/// # Errors
///
/// Returns [`DocumentError::UnsupportedVersion`] for documents from other
/// format versions.
#[instrument(skip_all, fields(source_id = %document.workflow.id))]
pub fn import(
    document: WorkflowDocument,
    importing_user: Option<UserId>,
) -> Result<WorkflowGraph, Report<DocumentError>> {
    if document.format_version != FORMAT_VERSION {
        return Err(DocumentError::UnsupportedVersion {
            found: document.format_version,
            supported: FORMAT_VERSION,
        }
        .into());
    }

    let mut graph = document.workflow;
    let tags = std::mem::take(&mut graph.metadata.tags);
    graph.id = WorkflowId::new();
    graph.version = 1;
    graph.metadata = WorkflowMetadata {
        tags,
        ..WorkflowMetadata::new(importing_user)
    };

    info!(workflow_id = %graph.id, nodes = graph.node_count(), "imported workflow");
    Ok(graph)
}
