//! Workflow node types.
//!
//! A node is an instance of a registered node type placed into a graph. It
//! carries a copy of the type's display name and description (editable
//! independently afterwards), concrete ports generated from the type's
//! schemas, a configuration object, and an editor-owned position.

use crate::catalog::NodeDefinition;
use crate::port::Port;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

pub use agentflow_core::NodeId;

/// JSON object used for node configuration and free-form metadata.
pub type JsonMap = Map<String, JsonValue>;

/// The category of a node type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    /// Entry points that start an execution.
    Trigger,
    /// Steps with side effects (AI responses, message sends).
    Action,
    /// Conditionals and data shaping.
    Logic,
    /// Calls into third-party providers.
    Integration,
}

impl NodeCategory {
    /// Lowercase name as used in catalogs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trigger => "trigger",
            Self::Action => "action",
            Self::Logic => "logic",
            Self::Integration => "integration",
        }
    }
}

impl std::fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canvas position. Opaque to the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Bookkeeping attached to a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    /// When the node was placed into the graph.
    pub created_at: DateTime<Utc>,
    /// When the node was last updated through `update_node`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Editor-defined extras.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub extra: JsonMap,
}

impl NodeMetadata {
    fn now() -> Self {
        Self {
            created_at: Utc::now(),
            updated_at: None,
            extra: JsonMap::new(),
        }
    }
}

/// A node placed in a workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowNode {
    /// Unique id within the graph.
    pub id: NodeId,
    /// Key of the node type in the registry.
    pub type_key: String,
    /// Display name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Category copied from the node type.
    pub category: NodeCategory,
    /// Input ports.
    #[serde(default)]
    pub inputs: Vec<Port>,
    /// Output ports.
    #[serde(default)]
    pub outputs: Vec<Port>,
    /// Configuration values keyed by configuration field.
    #[serde(default)]
    pub configuration: JsonMap,
    /// Canvas position.
    #[serde(default)]
    pub position: Position,
    /// Bookkeeping.
    pub metadata: NodeMetadata,
}

impl WorkflowNode {
    /// Instantiates a node of the given type.
    ///
    /// Ports come from the type's schemas. Configuration fields the caller
    /// leaves out are filled from the schema's declared defaults.
    #[must_use]
    pub fn instantiate(
        definition: &NodeDefinition,
        position: Position,
        mut configuration: JsonMap,
    ) -> Self {
        for (field, spec) in &definition.config_schema {
            if let Some(default) = &spec.default {
                configuration
                    .entry(field.clone())
                    .or_insert_with(|| default.clone());
            }
        }

        Self {
            id: NodeId::new(),
            type_key: definition.type_key.clone(),
            name: definition.name.clone(),
            description: definition.description.clone(),
            category: definition.category,
            inputs: definition.input_ports(),
            outputs: definition.output_ports(),
            configuration,
            position,
            metadata: NodeMetadata::now(),
        }
    }

    /// Returns true for entry-point nodes.
    #[must_use]
    pub fn is_trigger(&self) -> bool {
        self.category == NodeCategory::Trigger
    }

    /// Returns the input port with the given id.
    #[must_use]
    pub fn input_port(&self, port_id: &str) -> Option<&Port> {
        self.inputs.iter().find(|p| p.id == port_id)
    }

    /// Returns the output port with the given id.
    #[must_use]
    pub fn output_port(&self, port_id: &str) -> Option<&Port> {
        self.outputs.iter().find(|p| p.id == port_id)
    }

    /// Applies a partial update.
    ///
    /// Configuration and metadata are merged key by key; a `null` value
    /// removes the key. Ports and type key are never touched here.
    pub fn apply(&mut self, update: NodeUpdate) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(description) = update.description {
            self.description = description;
        }
        if let Some(position) = update.position {
            self.position = position;
        }
        merge_object(&mut self.configuration, update.configuration);
        merge_object(&mut self.metadata.extra, update.metadata);
        self.metadata.updated_at = Some(Utc::now());
    }
}

fn merge_object(target: &mut JsonMap, patch: JsonMap) {
    for (key, value) in patch {
        if value.is_null() {
            target.remove(&key);
        } else {
            target.insert(key, value);
        }
    }
}

/// Partial fields for [`WorkflowNode::apply`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default)]
    pub configuration: JsonMap,
    #[serde(default)]
    pub metadata: JsonMap,
}

impl NodeUpdate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }

    /// Sets one configuration field. Pass `null` to clear it.
    #[must_use]
    pub fn config(mut self, field: impl Into<String>, value: JsonValue) -> Self {
        self.configuration.insert(field.into(), value);
        self
    }

    /// Sets one metadata entry. Pass `null` to clear it.
    #[must_use]
    pub fn meta(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::FieldSpec;
    use serde_json::json;

    fn ai_response() -> NodeDefinition {
        NodeDefinition::new("ai_response", "AI Response", NodeCategory::Action)
            .with_description("Reply using the agent's model")
            .with_inputs(json!({ "message": { "type": "string", "required": true } }))
            .with_outputs(json!({ "reply": { "type": "string" } }))
            .with_config_field("prompt", FieldSpec::new("string").required())
            .with_config_field(
                "temperature",
                FieldSpec {
                    default: Some(json!(0.7)),
                    ..FieldSpec::new("number")
                },
            )
    }

    #[test]
    fn instantiate_copies_definition() {
        let node = WorkflowNode::instantiate(&ai_response(), Position::new(10.0, 20.0), JsonMap::new());

        assert_eq!(node.type_key, "ai_response");
        assert_eq!(node.name, "AI Response");
        assert_eq!(node.category, NodeCategory::Action);
        assert_eq!(node.inputs[0].id, "input_message");
        assert_eq!(node.outputs[0].id, "output_reply");
        assert_eq!(node.position, Position::new(10.0, 20.0));
    }

    #[test]
    fn instantiate_fills_config_defaults() {
        let mut config = JsonMap::new();
        config.insert("prompt".to_string(), json!("Be brief"));
        let node = WorkflowNode::instantiate(&ai_response(), Position::default(), config);

        assert_eq!(node.configuration["prompt"], "Be brief");
        assert_eq!(node.configuration["temperature"], 0.7);
    }

    #[test]
    fn apply_merges_and_clears_config() {
        let mut config = JsonMap::new();
        config.insert("prompt".to_string(), json!("old"));
        let mut node = WorkflowNode::instantiate(&ai_response(), Position::default(), config);
        let ports_before = node.inputs.clone();

        node.apply(
            NodeUpdate::new()
                .name("Greeter")
                .config("prompt", json!("new"))
                .config("temperature", JsonValue::Null)
                .meta("color", json!("teal")),
        );

        assert_eq!(node.name, "Greeter");
        assert_eq!(node.configuration["prompt"], "new");
        assert!(!node.configuration.contains_key("temperature"));
        assert_eq!(node.metadata.extra["color"], "teal");
        assert!(node.metadata.updated_at.is_some());
        assert_eq!(node.inputs, ports_before);
        assert_eq!(node.type_key, "ai_response");
    }

    #[test]
    fn metadata_extras_cannot_shadow_timestamps() {
        let mut node = WorkflowNode::instantiate(&ai_response(), Position::default(), JsonMap::new());
        let created_at = node.metadata.created_at;
        node.apply(
            NodeUpdate::new()
                .meta("created_at", json!("yesterday"))
                .meta("updated_at", json!(42)),
        );

        let json = serde_json::to_value(&node).expect("serialize");
        let parsed: WorkflowNode = serde_json::from_value(json).expect("deserialize");

        assert_eq!(parsed.metadata.created_at, created_at);
        assert_eq!(parsed.metadata.updated_at, node.metadata.updated_at);
        assert_eq!(parsed.metadata.extra["created_at"], "yesterday");
        assert_eq!(parsed.metadata.extra["updated_at"], 42);
    }

    #[test]
    fn category_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&NodeCategory::Integration).unwrap(),
            "\"integration\""
        );
    }
}
