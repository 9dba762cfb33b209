//! Graph validation.
//!
//! Two entry points:
//!
//! - [`check_connection`] runs before a connection is created and reports
//!   why it must be refused.
//! - [`GraphValidator::validate`] checks a whole graph before it is saved or
//!   executed. Blocking issues make the graph invalid; warnings are
//!   reported alongside but never block.

use crate::catalog::NodeRegistry;
use crate::connection::ConnectionId;
use crate::graph::WorkflowGraph;
use crate::node::NodeId;
use petgraph::visit::{DfsEvent, depth_first_search};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, instrument};

/// Kinds of blocking validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    MissingNode,
    SelfConnection,
    DuplicateConnection,
    CircularDependency,
    InvalidConfiguration,
}

impl ValidationErrorKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::MissingNode => "missing_node",
            Self::SelfConnection => "self_connection",
            Self::DuplicateConnection => "duplicate_connection",
            Self::CircularDependency => "circular_dependency",
            Self::InvalidConfiguration => "invalid_configuration",
        }
    }
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kinds of non-blocking findings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// A non-trigger node with no connections at all.
    OrphanNode,
    /// A node whose type is not in the registry.
    UnknownNodeType,
    /// A connection naming a port the node does not have.
    UnknownPort,
    /// A connection between ports of different data kinds.
    PortKindMismatch,
}

/// How serious a finding is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// A blocking problem with a graph or a connection request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub kind: ValidationErrorKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<ConnectionId>,
    pub message: String,
    pub severity: Severity,
}

impl ValidationIssue {
    fn node(kind: ValidationErrorKind, node_id: NodeId, message: String) -> Self {
        Self {
            kind,
            node_id: Some(node_id),
            connection_id: None,
            message,
            severity: Severity::Error,
        }
    }

    fn connection(
        kind: ValidationErrorKind,
        connection_id: ConnectionId,
        node_id: Option<NodeId>,
        message: String,
    ) -> Self {
        Self {
            kind,
            node_id,
            connection_id: Some(connection_id),
            message,
            severity: Severity::Error,
        }
    }
}

/// A non-blocking finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationWarning {
    pub kind: WarningKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<ConnectionId>,
    pub message: String,
    pub severity: Severity,
}

impl ValidationWarning {
    fn new(
        kind: WarningKind,
        node_id: Option<NodeId>,
        connection_id: Option<ConnectionId>,
        message: String,
    ) -> Self {
        Self {
            kind,
            node_id,
            connection_id,
            message,
            severity: Severity::Warning,
        }
    }
}

/// Outcome of validating a whole graph.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// True when `errors` is empty.
    pub valid: bool,
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    fn new(errors: Vec<ValidationIssue>, warnings: Vec<ValidationWarning>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Returns the blocking issues of the given kind.
    pub fn errors_of(&self, kind: ValidationErrorKind) -> impl Iterator<Item = &ValidationIssue> {
        self.errors.iter().filter(move |e| e.kind == kind)
    }

    /// Returns the warnings of the given kind.
    pub fn warnings_of(&self, kind: WarningKind) -> impl Iterator<Item = &ValidationWarning> {
        self.warnings.iter().filter(move |w| w.kind == kind)
    }
}

/// Checks whether a connection may be added to `graph`.
///
/// Issues come back in a fixed order: missing endpoints, self connection,
/// duplicate. An empty list means the connection is acceptable.
#[must_use]
pub fn check_connection(
    graph: &WorkflowGraph,
    source: NodeId,
    source_port: &str,
    target: NodeId,
    target_port: &str,
) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();

    if graph.node(source).is_none() {
        issues.push(ValidationIssue::node(
            ValidationErrorKind::MissingNode,
            source,
            format!("source node {source} does not exist"),
        ));
    }
    if graph.node(target).is_none() {
        issues.push(ValidationIssue::node(
            ValidationErrorKind::MissingNode,
            target,
            format!("target node {target} does not exist"),
        ));
    }
    if source == target {
        issues.push(ValidationIssue::node(
            ValidationErrorKind::SelfConnection,
            source,
            "node cannot connect to itself".to_string(),
        ));
    }
    if graph
        .connections()
        .iter()
        .any(|c| c.joins(source, source_port, target, target_port))
    {
        issues.push(ValidationIssue::node(
            ValidationErrorKind::DuplicateConnection,
            source,
            format!("connection {source}.{source_port} -> {target}.{target_port} already exists"),
        ));
    }

    issues
}

/// Returns true for configuration values that count as not provided.
fn is_blank(value: Option<&JsonValue>) -> bool {
    match value {
        None | Some(JsonValue::Null) => true,
        Some(JsonValue::String(s)) => s.is_empty(),
        Some(JsonValue::Array(a)) => a.is_empty(),
        Some(JsonValue::Object(o)) => o.is_empty(),
        Some(_) => false,
    }
}

/// Validates graphs against a node registry.
#[derive(Debug, Clone, Copy)]
pub struct GraphValidator<'a> {
    registry: &'a NodeRegistry,
}

impl<'a> GraphValidator<'a> {
    #[must_use]
    pub fn new(registry: &'a NodeRegistry) -> Self {
        Self { registry }
    }

    /// See [`check_connection`].
    #[must_use]
    pub fn check_connection(
        &self,
        graph: &WorkflowGraph,
        source: NodeId,
        source_port: &str,
        target: NodeId,
        target_port: &str,
    ) -> Vec<ValidationIssue> {
        check_connection(graph, source, source_port, target, target_port)
    }

    /// Validates a whole graph.
    #[instrument(skip_all, fields(workflow_id = %graph.id))]
    pub fn validate(&self, graph: &WorkflowGraph) -> ValidationResult {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        self.check_connections(graph, &mut errors, &mut warnings);
        self.check_nodes(graph, &mut errors, &mut warnings);
        check_cycles(graph, &mut errors);

        let result = ValidationResult::new(errors, warnings);
        debug!(
            valid = result.valid,
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "validated workflow"
        );
        result
    }

    fn check_connections(
        &self,
        graph: &WorkflowGraph,
        errors: &mut Vec<ValidationIssue>,
        warnings: &mut Vec<ValidationWarning>,
    ) {
        let mut seen = HashSet::new();

        for connection in graph.connections() {
            let source = graph.node(connection.source_node_id);
            let target = graph.node(connection.target_node_id);

            for (endpoint, node) in [
                (connection.source_node_id, source),
                (connection.target_node_id, target),
            ] {
                if node.is_none() {
                    errors.push(ValidationIssue::connection(
                        ValidationErrorKind::MissingNode,
                        connection.id,
                        Some(endpoint),
                        format!("connection {} refers to missing node {endpoint}", connection.id),
                    ));
                }
            }

            if connection.source_node_id == connection.target_node_id {
                errors.push(ValidationIssue::connection(
                    ValidationErrorKind::SelfConnection,
                    connection.id,
                    Some(connection.source_node_id),
                    "node cannot connect to itself".to_string(),
                ));
            }

            let key = (
                connection.source_node_id,
                connection.source_port_id.as_str(),
                connection.target_node_id,
                connection.target_port_id.as_str(),
            );
            if !seen.insert(key) {
                errors.push(ValidationIssue::connection(
                    ValidationErrorKind::DuplicateConnection,
                    connection.id,
                    Some(connection.source_node_id),
                    format!("connection {} duplicates an earlier connection", connection.id),
                ));
            }

            let (Some(source), Some(target)) = (source, target) else {
                continue;
            };
            let source_port = source.output_port(&connection.source_port_id);
            let target_port = target.input_port(&connection.target_port_id);

            if source_port.is_none() {
                warnings.push(ValidationWarning::new(
                    WarningKind::UnknownPort,
                    Some(source.id),
                    Some(connection.id),
                    format!(
                        "node '{}' has no output port '{}'",
                        source.name, connection.source_port_id
                    ),
                ));
            }
            if target_port.is_none() {
                warnings.push(ValidationWarning::new(
                    WarningKind::UnknownPort,
                    Some(target.id),
                    Some(connection.id),
                    format!(
                        "node '{}' has no input port '{}'",
                        target.name, connection.target_port_id
                    ),
                ));
            }
            let (Some(from), Some(to)) = (source_port, target_port) else {
                continue;
            };
            if !to.accepts(from) {
                warnings.push(ValidationWarning::new(
                    WarningKind::PortKindMismatch,
                    Some(target.id),
                    Some(connection.id),
                    format!(
                        "port '{}' ({}) feeds port '{}' ({})",
                        from.id, from.kind, to.id, to.kind
                    ),
                ));
            }
        }
    }

    fn check_nodes(
        &self,
        graph: &WorkflowGraph,
        errors: &mut Vec<ValidationIssue>,
        warnings: &mut Vec<ValidationWarning>,
    ) {
        for node in graph.nodes() {
            if !node.is_trigger() && !graph.connections().iter().any(|c| c.touches(node.id)) {
                warnings.push(ValidationWarning::new(
                    WarningKind::OrphanNode,
                    Some(node.id),
                    None,
                    format!("node '{}' is not connected to the workflow", node.name),
                ));
            }

            let Some(definition) = self.registry.get(&node.type_key) else {
                warnings.push(ValidationWarning::new(
                    WarningKind::UnknownNodeType,
                    Some(node.id),
                    None,
                    format!("node type '{}' is not registered", node.type_key),
                ));
                continue;
            };

            for field in definition.required_config_fields() {
                if is_blank(node.configuration.get(field)) {
                    errors.push(ValidationIssue::node(
                        ValidationErrorKind::InvalidConfiguration,
                        node.id,
                        format!(
                            "required field '{field}' is missing on node '{}'",
                            node.name
                        ),
                    ));
                }
            }
        }
    }
}

/// Reports one issue per node that a depth-first walk re-enters while it is
/// still on the stack.
fn check_cycles(graph: &WorkflowGraph, errors: &mut Vec<ValidationIssue>) {
    let digraph = graph.digraph();
    let mut reentered = HashSet::new();

    depth_first_search(&digraph, digraph.nodes(), |event| {
        if let DfsEvent::BackEdge(_, target) = event {
            reentered.insert(target);
        }
    });

    for node in graph.nodes().iter().filter(|n| reentered.contains(&n.id)) {
        errors.push(ValidationIssue::node(
            ValidationErrorKind::CircularDependency,
            node.id,
            format!("node '{}' is part of a cycle", node.name),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{JsonMap, NodeUpdate, Position};
    use crate::testing::{registry, sample_graph};
    use serde_json::json;

    #[test]
    fn sample_graph_is_valid() {
        let registry = registry();
        let (graph, ..) = sample_graph();

        let result = GraphValidator::new(&registry).validate(&graph);

        assert!(result.valid, "unexpected errors: {:?}", result.errors);
        assert!(result.errors.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn three_node_cycle_is_reported() {
        let registry = registry();
        let mut graph = WorkflowGraph::new("Cycle");
        let mut config = JsonMap::new();
        config.insert("prompt".to_string(), json!("hi"));
        let mut ids = Vec::new();
        for _ in 0..3 {
            let node = graph
                .add_node(&registry, "ai_response", Position::default(), config.clone())
                .expect("known type");
            ids.push(node.id);
        }
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        for (from, to) in [(a, b), (b, c), (c, a)] {
            graph
                .create_connection(from, "output_reply", to, "input_message")
                .expect("connection allowed");
        }

        let result = GraphValidator::new(&registry).validate(&graph);

        assert!(!result.valid);
        let cycles: Vec<_> = result
            .errors_of(ValidationErrorKind::CircularDependency)
            .collect();
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].node_id, Some(a));
    }

    #[test]
    fn blank_required_config_is_blocking() {
        let registry = registry();
        let (mut graph, _, reply, _) = sample_graph();
        let validator = GraphValidator::new(&registry);

        for blank in [JsonValue::Null, json!(""), json!([]), json!({})] {
            graph
                .update_node(reply, NodeUpdate::new().config("prompt", blank))
                .expect("node exists");
            let result = validator.validate(&graph);

            assert!(!result.valid);
            let issue = result
                .errors_of(ValidationErrorKind::InvalidConfiguration)
                .next()
                .expect("configuration issue");
            assert_eq!(issue.node_id, Some(reply));
            assert!(issue.message.contains("prompt"));
        }
    }

    #[test]
    fn orphan_non_trigger_is_a_warning() {
        let registry = registry();
        let mut graph = WorkflowGraph::new("Orphans");
        graph
            .add_node(&registry, "message_trigger", Position::default(), JsonMap::new())
            .expect("known type");
        let orphan = graph
            .add_node(&registry, "send_message", Position::default(), JsonMap::new())
            .expect("known type")
            .id;

        let result = GraphValidator::new(&registry).validate(&graph);

        assert!(result.valid);
        let orphans: Vec<_> = result.warnings_of(WarningKind::OrphanNode).collect();
        assert_eq!(orphans.len(), 1);
        assert_eq!(orphans[0].node_id, Some(orphan));
        assert_eq!(orphans[0].severity, Severity::Warning);
    }

    #[test]
    fn dangling_connection_is_blocking() {
        let registry = registry();
        let (graph, trigger, ..) = sample_graph();
        let trigger_json = serde_json::to_value(trigger).expect("serialize id");
        let mut value = serde_json::to_value(&graph).expect("serialize");
        value["nodes"]
            .as_array_mut()
            .expect("nodes array")
            .retain(|n| n["id"] != trigger_json);
        let broken: WorkflowGraph = serde_json::from_value(value).expect("deserialize");

        let result = GraphValidator::new(&registry).validate(&broken);

        assert!(!result.valid);
        let missing: Vec<_> = result.errors_of(ValidationErrorKind::MissingNode).collect();
        assert_eq!(missing.len(), 1);
        assert_eq!(missing[0].node_id, Some(trigger));
        assert!(missing[0].connection_id.is_some());
    }

    #[test]
    fn unknown_type_and_port_are_warnings() {
        let (graph, trigger, reply, _) = sample_graph();
        let mut value = serde_json::to_value(&graph).expect("serialize");
        value["connections"][0]["source_port_id"] = json!("output_nonexistent");
        let graph: WorkflowGraph = serde_json::from_value(value).expect("deserialize");

        let empty = NodeRegistry::new();
        let result = GraphValidator::new(&empty).validate(&graph);

        assert!(result.valid);
        assert_eq!(result.warnings_of(WarningKind::UnknownNodeType).count(), 3);
        let port = result
            .warnings_of(WarningKind::UnknownPort)
            .next()
            .expect("unknown port warning");
        assert_eq!(port.node_id, Some(trigger));
        assert!(graph.node(reply).is_some());
    }

    #[test]
    fn port_kind_mismatch_is_a_warning() {
        let registry = registry();
        let mut graph = WorkflowGraph::new("Kinds");
        let condition = graph
            .add_node(
                &registry,
                "condition",
                Position::default(),
                JsonMap::from_iter([("expression".to_string(), json!("true"))]),
            )
            .expect("known type")
            .id;
        let send = graph
            .add_node(&registry, "send_message", Position::default(), JsonMap::new())
            .expect("known type")
            .id;
        graph
            .create_connection(condition, "output_result", send, "input_message")
            .expect("connection allowed");

        let result = GraphValidator::new(&registry).validate(&graph);

        assert_eq!(result.warnings_of(WarningKind::PortKindMismatch).count(), 1);
    }

    #[test]
    fn check_connection_reports_in_order() {
        let (graph, ..) = sample_graph();
        let ghost = NodeId::new();

        let issues = check_connection(&graph, ghost, "output_x", ghost, "input_x");
        let kinds: Vec<_> = issues.iter().map(|i| i.kind).collect();

        assert_eq!(
            kinds,
            vec![
                ValidationErrorKind::MissingNode,
                ValidationErrorKind::MissingNode,
                ValidationErrorKind::SelfConnection,
            ]
        );
    }
}
