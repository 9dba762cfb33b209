//! The workflow graph aggregate.
//!
//! A workflow graph owns its nodes, the connections between their ports,
//! workflow variables and trigger declarations. All structural edits go
//! through the methods here so that the graph invariants hold after every
//! call:
//!
//! - every connection endpoint refers to a node in the graph
//! - no connection joins a node to itself
//! - no two connections share the same port tuple
//! - every trigger node has exactly one trigger declaration
//!
//! Nodes and connections are kept in insertion order. The petgraph view used
//! for cycle detection and topological ordering is derived on demand.

use crate::catalog::NodeRegistry;
use crate::connection::{ConnectionId, WorkflowConnection};
use crate::definition::{WorkflowMetadata, WorkflowVariable};
use crate::error::GraphError;
use crate::node::{JsonMap, NodeId, NodeUpdate, Position, WorkflowNode};
use crate::trigger::{self, ReconcileResult, TriggerDeclaration};
use crate::validation;
use chrono::Utc;
use petgraph::graphmap::DiGraphMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use agentflow_core::{UserId, WorkflowId};

fn initial_version() -> u32 {
    1
}

/// A workflow: nodes, connections, variables and triggers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowGraph {
    /// Unique identifier.
    pub id: WorkflowId,
    /// Human-readable name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: String,
    /// Incremented by every save that carries changes.
    #[serde(default = "initial_version")]
    pub version: u32,
    #[serde(default)]
    nodes: Vec<WorkflowNode>,
    #[serde(default)]
    connections: Vec<WorkflowConnection>,
    #[serde(default)]
    variables: Vec<WorkflowVariable>,
    #[serde(default)]
    triggers: Vec<TriggerDeclaration>,
    /// Ownership, lineage and timestamps.
    #[serde(default)]
    pub metadata: WorkflowMetadata,
    /// Set by every edit, cleared by `prepare_save`.
    #[serde(skip)]
    dirty: bool,
}

impl WorkflowGraph {
    /// Creates an empty workflow.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: WorkflowId::new(),
            name: name.into(),
            description: String::new(),
            version: initial_version(),
            nodes: Vec::new(),
            connections: Vec::new(),
            variables: Vec::new(),
            triggers: Vec::new(),
            metadata: WorkflowMetadata::default(),
            dirty: false,
        }
    }

    /// Sets the owner.
    #[must_use]
    pub fn with_owner(mut self, owner: UserId) -> Self {
        self.metadata.owner = Some(owner);
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Creates a new workflow from a template.
    ///
    /// The copy gets a fresh id, version 1, new timestamps and the given
    /// owner, and records the template it came from. Trigger declarations
    /// are re-derived so the copy does not share trigger ids with the
    /// template.
    #[must_use]
    pub fn from_template(template: &WorkflowGraph, owner: Option<UserId>) -> Self {
        let mut metadata = WorkflowMetadata::new(owner);
        metadata.template_id = Some(template.id);
        metadata.tags = template.metadata.tags.clone();

        let mut graph = Self {
            id: WorkflowId::new(),
            name: template.name.clone(),
            description: template.description.clone(),
            version: initial_version(),
            nodes: template.nodes.clone(),
            connections: template.connections.clone(),
            variables: template.variables.clone(),
            triggers: Vec::new(),
            metadata,
            dirty: false,
        };
        graph.sync_triggers();
        graph
    }

    /// Nodes in insertion order.
    #[must_use]
    pub fn nodes(&self) -> &[WorkflowNode] {
        &self.nodes
    }

    /// Connections in insertion order.
    #[must_use]
    pub fn connections(&self) -> &[WorkflowConnection] {
        &self.connections
    }

    /// Workflow variables.
    #[must_use]
    pub fn variables(&self) -> &[WorkflowVariable] {
        &self.variables
    }

    /// Trigger declarations, one per trigger node.
    #[must_use]
    pub fn triggers(&self) -> &[TriggerDeclaration] {
        &self.triggers
    }

    /// Returns the node with the given id.
    #[must_use]
    pub fn node(&self, node_id: NodeId) -> Option<&WorkflowNode> {
        self.nodes.iter().find(|n| n.id == node_id)
    }

    /// Returns the connection with the given id.
    #[must_use]
    pub fn connection(&self, connection_id: ConnectionId) -> Option<&WorkflowConnection> {
        self.connections.iter().find(|c| c.id == connection_id)
    }

    /// Trigger-category nodes in node order.
    pub fn trigger_nodes(&self) -> impl Iterator<Item = &WorkflowNode> {
        self.nodes.iter().filter(|n| n.is_trigger())
    }

    /// Trigger nodes whose declaration is enabled, in node order.
    ///
    /// A trigger node without a declaration counts as enabled.
    pub fn enabled_trigger_nodes(&self) -> impl Iterator<Item = &WorkflowNode> {
        self.trigger_nodes()
            .filter(|n| self.trigger_for(n.id).is_none_or(|t| t.enabled))
    }

    /// Returns the trigger declaration mirroring `node_id`.
    #[must_use]
    pub fn trigger_for(&self, node_id: NodeId) -> Option<&TriggerDeclaration> {
        self.triggers.iter().find(|t| t.node_id == node_id)
    }

    /// Connections ending at `node_id`.
    pub fn incoming(&self, node_id: NodeId) -> impl Iterator<Item = &WorkflowConnection> {
        self.connections
            .iter()
            .filter(move |c| c.target_node_id == node_id)
    }

    /// Connections leaving `node_id`.
    pub fn outgoing(&self, node_id: NodeId) -> impl Iterator<Item = &WorkflowConnection> {
        self.connections
            .iter()
            .filter(move |c| c.source_node_id == node_id)
    }

    /// Distinct downstream neighbours of a node, in connection order.
    #[must_use]
    pub fn successors(&self, node_id: NodeId) -> Vec<&WorkflowNode> {
        let mut seen = Vec::new();
        for connection in self.outgoing(node_id) {
            if !seen.contains(&connection.target_node_id) {
                seen.push(connection.target_node_id);
            }
        }
        seen.into_iter().filter_map(|id| self.node(id)).collect()
    }

    /// Distinct upstream neighbours of a node, in connection order.
    #[must_use]
    pub fn predecessors(&self, node_id: NodeId) -> Vec<&WorkflowNode> {
        let mut seen = Vec::new();
        for connection in self.incoming(node_id) {
            if !seen.contains(&connection.source_node_id) {
                seen.push(connection.source_node_id);
            }
        }
        seen.into_iter().filter_map(|id| self.node(id)).collect()
    }

    /// Number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Places a new node of type `type_key` into the graph.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownNodeType`] if the registry has no
    /// definition for `type_key`. The graph is unchanged in that case.
    #[instrument(skip(self, registry, configuration), fields(workflow_id = %self.id))]
    pub fn add_node(
        &mut self,
        registry: &NodeRegistry,
        type_key: &str,
        position: Position,
        configuration: JsonMap,
    ) -> Result<&WorkflowNode, GraphError> {
        let definition = registry
            .get(type_key)
            .ok_or_else(|| GraphError::UnknownNodeType {
                type_key: type_key.to_string(),
            })?;

        let node = WorkflowNode::instantiate(definition, position, configuration);
        debug!(node_id = %node.id, "adding node");
        if node.is_trigger() {
            self.triggers.push(TriggerDeclaration::for_node(&node));
        }
        self.nodes.push(node);
        self.dirty = true;

        let index = self.nodes.len() - 1;
        Ok(&self.nodes[index])
    }

    /// Removes a node together with every connection touching it and its
    /// trigger declaration.
    ///
    /// Removing an absent node is a no-op and returns `None`.
    #[instrument(skip(self), fields(workflow_id = %self.id))]
    pub fn remove_node(&mut self, node_id: NodeId) -> Option<WorkflowNode> {
        let index = self.nodes.iter().position(|n| n.id == node_id)?;
        let node = self.nodes.remove(index);

        let before = self.connections.len();
        self.connections.retain(|c| !c.touches(node_id));
        self.triggers.retain(|t| t.node_id != node_id);
        self.dirty = true;

        debug!(removed_connections = before - self.connections.len(), "removed node");
        Some(node)
    }

    /// Applies a partial update to a node.
    ///
    /// Ports and type key are never changed. A trigger node's declaration
    /// picks up the new configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NodeNotFound`] if the node does not exist.
    pub fn update_node(
        &mut self,
        node_id: NodeId,
        update: NodeUpdate,
    ) -> Result<&WorkflowNode, GraphError> {
        let index = self
            .nodes
            .iter()
            .position(|n| n.id == node_id)
            .ok_or(GraphError::NodeNotFound { node_id })?;

        self.nodes[index].apply(update);
        if self.nodes[index].is_trigger() {
            trigger::reconcile(&mut self.triggers, &self.nodes);
        }
        self.dirty = true;

        Ok(&self.nodes[index])
    }

    /// Enables or disables the trigger declaration of a trigger node.
    ///
    /// Disabled triggers are never chosen as an execution entry. Returns
    /// whether the flag changed.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NodeNotFound`] if the node does not exist and
    /// [`GraphError::NotATrigger`] if it is not a trigger node.
    pub fn set_trigger_enabled(
        &mut self,
        node_id: NodeId,
        enabled: bool,
    ) -> Result<bool, GraphError> {
        let is_trigger = self
            .node(node_id)
            .ok_or(GraphError::NodeNotFound { node_id })?
            .is_trigger();
        if !is_trigger {
            return Err(GraphError::NotATrigger { node_id });
        }
        if self.trigger_for(node_id).is_none() {
            self.sync_triggers();
        }

        let declaration = self
            .triggers
            .iter_mut()
            .find(|t| t.node_id == node_id)
            .ok_or(GraphError::NotATrigger { node_id })?;
        if declaration.enabled == enabled {
            return Ok(false);
        }
        if enabled {
            declaration.enable();
        } else {
            declaration.disable();
        }
        self.dirty = true;
        Ok(true)
    }

    /// Connects an output port of `source` to an input port of `target`.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::InvalidConnection`] carrying the first issue
    /// from the connection check (missing node, self connection, duplicate).
    /// The graph is unchanged in that case.
    #[instrument(skip(self), fields(workflow_id = %self.id))]
    pub fn create_connection(
        &mut self,
        source: NodeId,
        source_port: &str,
        target: NodeId,
        target_port: &str,
    ) -> Result<&WorkflowConnection, GraphError> {
        let issues = validation::check_connection(self, source, source_port, target, target_port);
        if let Some(issue) = issues.into_iter().next() {
            debug!(kind = %issue.kind, "connection rejected");
            return Err(GraphError::InvalidConnection { issue });
        }

        self.connections.push(WorkflowConnection::new(
            source,
            source_port,
            target,
            target_port,
        ));
        self.dirty = true;

        let index = self.connections.len() - 1;
        Ok(&self.connections[index])
    }

    /// Removes a connection. Removing an absent connection returns `None`.
    pub fn remove_connection(&mut self, connection_id: ConnectionId) -> Option<WorkflowConnection> {
        let index = self.connections.iter().position(|c| c.id == connection_id)?;
        self.dirty = true;
        Some(self.connections.remove(index))
    }

    /// Adds a variable, replacing any existing variable with the same name.
    pub fn add_variable(&mut self, variable: WorkflowVariable) {
        match self.variables.iter_mut().find(|v| v.name == variable.name) {
            Some(existing) => *existing = variable,
            None => self.variables.push(variable),
        }
        self.dirty = true;
    }

    /// Re-derives trigger declarations from the trigger nodes.
    ///
    /// Needed after loading a graph from storage written by another tool.
    pub fn sync_triggers(&mut self) -> ReconcileResult {
        trigger::reconcile(&mut self.triggers, &self.nodes)
    }

    /// Returns true if edits were made since the last save.
    #[must_use]
    pub fn has_unsaved_changes(&self) -> bool {
        self.dirty
    }

    /// Prepares the graph for saving.
    ///
    /// If edits are pending, bumps `version` and `updated_at`
    /// and returns true.
    pub fn prepare_save(&mut self) -> bool {
        if !self.dirty {
            return false;
        }
        self.version += 1;
        self.metadata.updated_at = Utc::now();
        self.dirty = false;
        true
    }

    /// Directed view over the connections for graph algorithms.
    ///
    /// Every node is present; connections with a missing endpoint are left
    /// out.
    #[must_use]
    pub fn digraph(&self) -> DiGraphMap<NodeId, ()> {
        let mut graph = DiGraphMap::with_capacity(self.nodes.len(), self.connections.len());
        for node in &self.nodes {
            graph.add_node(node.id);
        }
        for connection in &self.connections {
            if graph.contains_node(connection.source_node_id)
                && graph.contains_node(connection.target_node_id)
            {
                graph.add_edge(connection.source_node_id, connection.target_node_id, ());
            }
        }
        graph
    }
}
