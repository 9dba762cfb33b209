//! Trigger declarations.
//!
//! Trigger nodes are the entry points of a workflow. Each trigger node has
//! a matching declaration on the graph so that channel and webhook routing
//! can find the workflows listening for an event without walking every
//! node. Declarations are reconciled from the graph's trigger nodes.

use crate::node::{JsonMap, WorkflowNode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agentflow_core::NodeId;
pub use agentflow_core::TriggerId;

/// A denormalized record of one trigger node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerDeclaration {
    /// Unique identifier for this declaration.
    pub id: TriggerId,
    /// The trigger node this declaration mirrors.
    pub node_id: NodeId,
    /// The trigger node's type key, e.g. `message_trigger`.
    pub type_key: String,
    /// Whether events should start executions.
    pub enabled: bool,
    /// Snapshot of the trigger node's configuration.
    #[serde(default)]
    pub config: JsonMap,
    /// When the declaration was created.
    pub created_at: DateTime<Utc>,
    /// When the declaration was last changed.
    pub updated_at: DateTime<Utc>,
}

impl TriggerDeclaration {
    /// Creates an enabled declaration for a trigger node.
    #[must_use]
    pub fn for_node(node: &WorkflowNode) -> Self {
        let now = Utc::now();
        Self {
            id: TriggerId::new(),
            node_id: node.id,
            type_key: node.type_key.clone(),
            enabled: true,
            config: node.configuration.clone(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Enables this trigger.
    pub fn enable(&mut self) {
        self.enabled = true;
        self.updated_at = Utc::now();
    }

    /// Disables this trigger.
    pub fn disable(&mut self) {
        self.enabled = false;
        self.updated_at = Utc::now();
    }

    /// Refreshes the snapshot from the node. Returns true if anything changed.
    fn refresh(&mut self, node: &WorkflowNode) -> bool {
        if self.type_key == node.type_key && self.config == node.configuration {
            return false;
        }
        self.type_key = node.type_key.clone();
        self.config = node.configuration.clone();
        self.updated_at = Utc::now();
        true
    }
}

/// Outcome of reconciling declarations against trigger nodes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileResult {
    pub added: u32,
    pub updated: u32,
    pub removed: u32,
}

impl ReconcileResult {
    /// Returns whether any changes were made.
    #[must_use]
    pub fn has_changes(&self) -> bool {
        self.added > 0 || self.updated > 0 || self.removed > 0
    }
}

/// Brings `declarations` in line with the trigger nodes in `nodes`.
///
/// Existing declarations keep their id and enabled flag; declarations whose
/// node is gone or no longer a trigger are dropped; new trigger nodes get a
/// fresh enabled declaration. Output order follows node order.
pub fn reconcile(declarations: &mut Vec<TriggerDeclaration>, nodes: &[WorkflowNode]) -> ReconcileResult {
    let mut result = ReconcileResult::default();
    let mut previous = std::mem::take(declarations);

    for node in nodes.iter().filter(|n| n.is_trigger()) {
        match previous.iter().position(|d| d.node_id == node.id) {
            Some(index) => {
                let mut declaration = previous.swap_remove(index);
                if declaration.refresh(node) {
                    result.updated += 1;
                }
                declarations.push(declaration);
            }
            None => {
                declarations.push(TriggerDeclaration::for_node(node));
                result.added += 1;
            }
        }
    }

    result.removed = u32::try_from(previous.len()).unwrap_or(u32::MAX);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::NodeDefinition;
    use crate::node::{NodeCategory, NodeUpdate, Position};
    use serde_json::json;

    fn node(category: NodeCategory) -> WorkflowNode {
        WorkflowNode::instantiate(
            &NodeDefinition::new("message_trigger", "Message", category),
            Position::default(),
            JsonMap::new(),
        )
    }

    #[test]
    fn reconcile_adds_trigger_nodes_only() {
        let nodes = vec![node(NodeCategory::Trigger), node(NodeCategory::Action)];
        let mut declarations = Vec::new();

        let result = reconcile(&mut declarations, &nodes);

        assert_eq!(result.added, 1);
        assert_eq!(declarations.len(), 1);
        assert_eq!(declarations[0].node_id, nodes[0].id);
        assert!(declarations[0].enabled);
    }

    #[test]
    fn reconcile_keeps_identity_and_enabled_flag() {
        let mut nodes = vec![node(NodeCategory::Trigger)];
        let mut declarations = Vec::new();
        reconcile(&mut declarations, &nodes);
        declarations[0].disable();
        let id = declarations[0].id;

        nodes[0].apply(NodeUpdate::new().config("channel", json!("web_chat")));
        let result = reconcile(&mut declarations, &nodes);

        assert_eq!(result.updated, 1);
        assert_eq!(declarations[0].id, id);
        assert!(!declarations[0].enabled);
        assert_eq!(declarations[0].config["channel"], "web_chat");
    }

    #[test]
    fn reconcile_drops_removed_nodes() {
        let nodes = vec![node(NodeCategory::Trigger)];
        let mut declarations = Vec::new();
        reconcile(&mut declarations, &nodes);

        let result = reconcile(&mut declarations, &[]);

        assert_eq!(result.removed, 1);
        assert!(declarations.is_empty());
        assert!(result.has_changes());
    }
}
