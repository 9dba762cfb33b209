//! Port system for workflow nodes.
//!
//! Ports are named attachment points on a node. A node type declares its
//! ports as a schema map (`field -> {type, required, description}`); the
//! generator here turns that map into concrete [`Port`] records when a node
//! is placed into a graph.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// Data kind used when a schema field does not declare one.
pub const ANY_KIND: &str = "any";

fn default_kind() -> String {
    ANY_KIND.to_string()
}

/// One field of a port or configuration schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Data kind (`string`, `number`, `object`, ...).
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,
    /// Whether a value must be supplied.
    #[serde(default)]
    pub required: bool,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Default value offered by the editor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<JsonValue>,
}

impl FieldSpec {
    /// Creates a field of the given kind.
    #[must_use]
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            required: false,
            description: None,
            default: None,
        }
    }

    /// Marks the field as required.
    #[must_use]
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Which side of a node a port sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortDirection {
    Input,
    Output,
}

impl PortDirection {
    /// Prefix used in generated port ids.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

impl fmt::Display for PortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A concrete port on a workflow node.
///
/// Direction is implied by whether the port sits in the node's input or
/// output list. Identity within a graph is `(node_id, port.id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Port {
    /// Id unique within the node, `<direction>_<field>`.
    pub id: String,
    /// The schema field key this port was generated from.
    pub name: String,
    /// Data kind carried by the port.
    pub kind: String,
    /// Whether the port expects a value.
    pub required: bool,
    /// Human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Port {
    /// Builds the port for one schema field.
    #[must_use]
    pub fn from_field(direction: PortDirection, field: &str, spec: &FieldSpec) -> Self {
        Self {
            id: port_id(direction, field),
            name: field.to_string(),
            kind: spec.kind.clone(),
            required: spec.required,
            description: spec.description.clone(),
        }
    }

    /// Returns true if data of `other`'s kind can flow into this port.
    ///
    /// `any` on either side matches everything; otherwise kinds must be equal.
    #[must_use]
    pub fn accepts(&self, other: &Port) -> bool {
        self.kind == ANY_KIND || other.kind == ANY_KIND || self.kind == other.kind
    }
}

/// Returns the deterministic port id for a schema field.
#[must_use]
pub fn port_id(direction: PortDirection, field: &str) -> String {
    format!("{direction}_{field}")
}

/// Derives the concrete ports for a schema map.
///
/// Ports are ordered by field key. A schema that is not an object of field
/// objects yields an empty list rather than an error; catching malformed
/// schemas is the catalog loader's job.
#[must_use]
pub fn generate_ports(schema: &JsonValue, direction: PortDirection) -> Vec<Port> {
    let Ok(fields) = BTreeMap::<String, FieldSpec>::deserialize(schema) else {
        return Vec::new();
    };

    fields
        .iter()
        .map(|(field, spec)| Port::from_field(direction, field, spec))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ids_follow_direction_and_field() {
        let ports = generate_ports(
            &json!({
                "message": { "type": "string", "required": true },
                "sender": { "type": "string" }
            }),
            PortDirection::Output,
        );

        let ids: Vec<_> = ports.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["output_message", "output_sender"]);
        assert!(ports[0].required);
        assert!(!ports[1].required);
        assert_eq!(ports[0].name, "message");
    }

    #[test]
    fn missing_type_defaults_to_any() {
        let ports = generate_ports(&json!({ "payload": {} }), PortDirection::Input);
        assert_eq!(ports.len(), 1);
        assert_eq!(ports[0].id, "input_payload");
        assert_eq!(ports[0].kind, ANY_KIND);
    }

    #[test]
    fn malformed_schema_yields_no_ports() {
        assert!(generate_ports(&json!(null), PortDirection::Input).is_empty());
        assert!(generate_ports(&json!(["message"]), PortDirection::Input).is_empty());
        assert!(generate_ports(&json!({ "message": 3 }), PortDirection::Input).is_empty());
    }

    #[test]
    fn generation_is_deterministic() {
        let schema = json!({ "b": { "type": "number" }, "a": { "type": "string" } });
        let first = generate_ports(&schema, PortDirection::Input);
        let second = generate_ports(&schema, PortDirection::Input);
        assert_eq!(first, second);
        assert_eq!(first[0].name, "a");
    }

    #[test]
    fn any_kind_accepts_everything() {
        let any = Port::from_field(PortDirection::Input, "x", &FieldSpec::new(ANY_KIND));
        let text = Port::from_field(PortDirection::Output, "y", &FieldSpec::new("string"));
        let number = Port::from_field(PortDirection::Input, "z", &FieldSpec::new("number"));

        assert!(any.accepts(&text));
        assert!(text.accepts(&any));
        assert!(!number.accepts(&text));
    }
}
