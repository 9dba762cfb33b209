//! Connections between node ports.
//!
//! A connection is a directed edge from one node's output port to another
//! node's input port. Connections are only created through
//! [`WorkflowGraph::create_connection`](crate::graph::WorkflowGraph::create_connection),
//! which runs the connection-level check first.

use crate::node::JsonMap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use agentflow_core::ConnectionId;
use agentflow_core::NodeId;

/// Bookkeeping attached to a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectionMetadata {
    /// When the connection was created.
    pub created_at: DateTime<Utc>,
    /// Editor-defined extras (edge styling, labels).
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: JsonMap,
}

/// A directed edge between two ports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConnection {
    /// Unique id within the graph.
    pub id: ConnectionId,
    /// Node the data leaves from.
    pub source_node_id: NodeId,
    /// Output port on the source node.
    pub source_port_id: String,
    /// Node the data enters.
    pub target_node_id: NodeId,
    /// Input port on the target node.
    pub target_port_id: String,
    /// Bookkeeping.
    pub metadata: ConnectionMetadata,
}

impl WorkflowConnection {
    /// Creates a connection with a fresh id.
    #[must_use]
    pub fn new(
        source_node_id: NodeId,
        source_port_id: impl Into<String>,
        target_node_id: NodeId,
        target_port_id: impl Into<String>,
    ) -> Self {
        Self {
            id: ConnectionId::new(),
            source_node_id,
            source_port_id: source_port_id.into(),
            target_node_id,
            target_port_id: target_port_id.into(),
            metadata: ConnectionMetadata {
                created_at: Utc::now(),
                extra: JsonMap::new(),
            },
        }
    }

    /// Returns true if either endpoint is `node_id`.
    #[must_use]
    pub fn touches(&self, node_id: NodeId) -> bool {
        self.source_node_id == node_id || self.target_node_id == node_id
    }

    /// Returns true if this connection joins exactly the given ports.
    ///
    /// This is the uniqueness key inside a graph. Two connections between
    /// the same nodes over different ports do not match.
    #[must_use]
    pub fn joins(
        &self,
        source_node_id: NodeId,
        source_port_id: &str,
        target_node_id: NodeId,
        target_port_id: &str,
    ) -> bool {
        self.source_node_id == source_node_id
            && self.source_port_id == source_port_id
            && self.target_node_id == target_node_id
            && self.target_port_id == target_port_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn touches_either_endpoint() {
        let a = NodeId::new();
        let b = NodeId::new();
        let connection = WorkflowConnection::new(a, "output_message", b, "input_message");

        assert!(connection.touches(a));
        assert!(connection.touches(b));
        assert!(!connection.touches(NodeId::new()));
    }

    #[test]
    fn joins_compares_full_port_tuple() {
        let a = NodeId::new();
        let b = NodeId::new();
        let connection = WorkflowConnection::new(a, "output_message", b, "input_message");

        assert!(connection.joins(a, "output_message", b, "input_message"));
        assert!(!connection.joins(a, "output_sender", b, "input_message"));
        assert!(!connection.joins(b, "output_message", a, "input_message"));
    }

    #[test]
    fn metadata_extras_round_trip_beside_timestamp() {
        let mut connection =
            WorkflowConnection::new(NodeId::new(), "output_message", NodeId::new(), "input_message");
        connection
            .metadata
            .extra
            .insert("created_at".to_string(), serde_json::json!("styled"));

        let json = serde_json::to_value(&connection).expect("serialize");
        let parsed: WorkflowConnection = serde_json::from_value(json).expect("deserialize");

        assert_eq!(parsed, connection);
        assert_eq!(parsed.metadata.extra["created_at"], "styled");
    }
}
