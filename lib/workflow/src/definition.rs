//! Workflow-level definition types.
//!
//! Metadata and variables attached to a [`WorkflowGraph`], plus the summary
//! record used for listings.

use crate::graph::WorkflowGraph;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use agentflow_core::{UserId, WorkflowId};

/// Ownership, lineage and timestamps of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    /// When this workflow was created.
    pub created_at: DateTime<Utc>,
    /// When this workflow was last saved with changes.
    pub updated_at: DateTime<Utc>,
    /// The user who owns this workflow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<UserId>,
    /// The template this workflow was cloned from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<WorkflowId>,
    /// Tags for organization/filtering.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl WorkflowMetadata {
    /// Creates metadata stamped with the current time.
    #[must_use]
    pub fn new(owner: Option<UserId>) -> Self {
        let now = Utc::now();
        Self {
            created_at: now,
            updated_at: now,
            owner,
            template_id: None,
            tags: Vec::new(),
        }
    }

    /// Adds a tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }
}

impl Default for WorkflowMetadata {
    fn default() -> Self {
        Self::new(None)
    }
}

/// A named value available to node executors during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowVariable {
    /// Variable name, unique within the workflow.
    pub name: String,
    /// Data kind (`string`, `number`, ...).
    #[serde(rename = "type", default = "default_variable_kind")]
    pub kind: String,
    /// Value used when the execution context does not supply one.
    #[serde(default)]
    pub default_value: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

fn default_variable_kind() -> String {
    crate::port::ANY_KIND.to_string()
}

impl WorkflowVariable {
    /// Creates a variable with a default value.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: impl Into<String>, default_value: JsonValue) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            default_value,
            description: None,
        }
    }
}

/// Summary information about a workflow (for listings).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub id: WorkflowId,
    pub name: String,
    pub version: u32,
    pub owner: Option<UserId>,
    pub tags: Vec<String>,
    pub node_count: usize,
    pub connection_count: usize,
    pub trigger_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl From<&WorkflowGraph> for WorkflowSummary {
    fn from(graph: &WorkflowGraph) -> Self {
        Self {
            id: graph.id,
            name: graph.name.clone(),
            version: graph.version,
            owner: graph.metadata.owner,
            tags: graph.metadata.tags.clone(),
            node_count: graph.node_count(),
            connection_count: graph.connection_count(),
            trigger_count: graph.trigger_nodes().count(),
            updated_at: graph.metadata.updated_at,
        }
    }
}
