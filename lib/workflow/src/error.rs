//! Error types for the workflow crate.
//!
//! - `GraphError`: synchronous editing failures (unknown type, missing node,
//!   rejected connection). These are raised to the editor immediately.
//! - `ExecutionError`: reasons an execution call failed. The engine never
//!   returns these to the caller directly; they are rendered into the
//!   `error` field of an `ExecutionResult`.

use crate::validation::ValidationIssue;
use agentflow_core::NodeId;
use std::fmt;

/// Errors from graph editing operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// The requested node type is not in the registry.
    UnknownNodeType { type_key: String },
    /// No node with the given id exists in the graph.
    NodeNotFound { node_id: NodeId },
    /// The node exists but is not a trigger.
    NotATrigger { node_id: NodeId },
    /// A connection request failed its connection-level check.
    ///
    /// Carries the first offending issue so the editor can report exactly
    /// one actionable message.
    InvalidConnection { issue: ValidationIssue },
}

impl fmt::Display for GraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownNodeType { type_key } => {
                write!(f, "unknown node type: {type_key}")
            }
            Self::NodeNotFound { node_id } => write!(f, "node not found: {node_id}"),
            Self::NotATrigger { node_id } => write!(f, "node {node_id} is not a trigger"),
            Self::InvalidConnection { issue } => {
                write!(f, "invalid connection: {}", issue.message)
            }
        }
    }
}

impl std::error::Error for GraphError {}

/// Reasons an execution call did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// The graph has no trigger-category node to start from.
    NoTriggerNode,
    /// Every trigger node has a disabled declaration.
    AllTriggersDisabled,
    /// The pre-execution validation gate found blocking errors.
    InvalidGraph { error_count: usize, first: String },
    /// No executor is registered for a non-trigger node's type.
    UnsupportedNodeType { node_id: NodeId, type_key: String },
    /// A node executor returned an error.
    NodeFailed { node_id: NodeId, reason: String },
    /// A node executor exceeded the configured timeout.
    NodeTimeout { node_id: NodeId, timeout_ms: u64 },
    /// The execution was cancelled through its context token.
    Cancelled,
    /// The reachable subgraph could not be ordered.
    CircularDependency { node_id: NodeId },
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoTriggerNode => write!(f, "no trigger node found in workflow"),
            Self::AllTriggersDisabled => write!(f, "all trigger nodes in workflow are disabled"),
            Self::InvalidGraph { error_count, first } => {
                write!(
                    f,
                    "workflow failed validation with {error_count} error(s): {first}"
                )
            }
            Self::UnsupportedNodeType { node_id, type_key } => {
                write!(
                    f,
                    "no executor registered for node type '{type_key}' (node {node_id})"
                )
            }
            Self::NodeFailed { node_id, reason } => {
                write!(f, "node {node_id} failed: {reason}")
            }
            Self::NodeTimeout {
                node_id,
                timeout_ms,
            } => write!(f, "node {node_id} timed out after {timeout_ms}ms"),
            Self::Cancelled => write!(f, "execution cancelled"),
            Self::CircularDependency { node_id } => {
                write!(f, "circular dependency detected at node {node_id}")
            }
        }
    }
}

impl std::error::Error for ExecutionError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::{Severity, ValidationErrorKind};

    #[test]
    fn unknown_node_type_display() {
        let err = GraphError::UnknownNodeType {
            type_key: "teleport".to_string(),
        };
        assert_eq!(err.to_string(), "unknown node type: teleport");
    }

    #[test]
    fn invalid_connection_surfaces_issue_message() {
        let node_id = NodeId::new();
        let err = GraphError::InvalidConnection {
            issue: ValidationIssue {
                kind: ValidationErrorKind::SelfConnection,
                node_id: Some(node_id),
                connection_id: None,
                message: "node cannot connect to itself".to_string(),
                severity: Severity::Error,
            },
        };
        assert!(err.to_string().contains("cannot connect to itself"));
    }

    #[test]
    fn no_trigger_display() {
        assert!(
            ExecutionError::NoTriggerNode
                .to_string()
                .contains("no trigger node")
        );
    }

    #[test]
    fn timeout_display_includes_budget() {
        let err = ExecutionError::NodeTimeout {
            node_id: NodeId::new(),
            timeout_ms: 250,
        };
        assert!(err.to_string().contains("250ms"));
    }
}
