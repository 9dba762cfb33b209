//! Node definition registry.
//!
//! The registry is the catalog of node types a graph may contain. It is
//! built once at startup from a [`CatalogSource`] and shared read-only
//! (typically behind an `Arc`) by the graph model, the validator and the
//! execution engine. There is no process-wide instance; callers construct
//! one and pass it where it is needed.

use crate::node::NodeCategory;
use crate::port::{FieldSpec, Port, PortDirection, generate_ports};
use async_trait::async_trait;
use rootcause::Report;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, instrument, warn};

/// Template for a node type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// Unique key, e.g. `message_trigger`.
    pub type_key: String,
    /// Display name copied onto new nodes.
    pub name: String,
    /// Description copied onto new nodes.
    #[serde(default)]
    pub description: String,
    /// Category of the node type.
    pub category: NodeCategory,
    /// Icon reference for the editor palette.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Input port schema (`field -> {type, required, description}`).
    #[serde(default)]
    pub input_schema: JsonValue,
    /// Output port schema.
    #[serde(default)]
    pub output_schema: JsonValue,
    /// Configuration schema.
    #[serde(default)]
    pub config_schema: BTreeMap<String, FieldSpec>,
}

impl NodeDefinition {
    /// Creates a definition with empty schemas.
    #[must_use]
    pub fn new(type_key: impl Into<String>, name: impl Into<String>, category: NodeCategory) -> Self {
        Self {
            type_key: type_key.into(),
            name: name.into(),
            description: String::new(),
            category,
            icon: None,
            input_schema: JsonValue::Null,
            output_schema: JsonValue::Null,
            config_schema: BTreeMap::new(),
        }
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the icon reference.
    #[must_use]
    pub fn with_icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    /// Sets the input port schema.
    #[must_use]
    pub fn with_inputs(mut self, schema: JsonValue) -> Self {
        self.input_schema = schema;
        self
    }

    /// Sets the output port schema.
    #[must_use]
    pub fn with_outputs(mut self, schema: JsonValue) -> Self {
        self.output_schema = schema;
        self
    }

    /// Adds a configuration field.
    #[must_use]
    pub fn with_config_field(mut self, field: impl Into<String>, spec: FieldSpec) -> Self {
        self.config_schema.insert(field.into(), spec);
        self
    }

    /// Concrete input ports for a new instance.
    #[must_use]
    pub fn input_ports(&self) -> Vec<Port> {
        generate_ports(&self.input_schema, PortDirection::Input)
    }

    /// Concrete output ports for a new instance.
    #[must_use]
    pub fn output_ports(&self) -> Vec<Port> {
        generate_ports(&self.output_schema, PortDirection::Output)
    }

    /// Names of the configuration fields marked required.
    pub fn required_config_fields(&self) -> impl Iterator<Item = &str> {
        self.config_schema
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(field, _)| field.as_str())
    }
}

/// Errors from catalog sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    /// The source could not be read at all.
    Unavailable { source: String, reason: String },
    /// The source was read but is not a list of definitions.
    Malformed { source: String, reason: String },
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable { source, reason } => {
                write!(f, "catalog '{source}' unavailable: {reason}")
            }
            Self::Malformed { source, reason } => {
                write!(f, "catalog '{source}' is malformed: {reason}")
            }
        }
    }
}

impl std::error::Error for CatalogError {}

/// Where node definitions come from.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetches every definition the source knows about.
    async fn fetch(&self) -> Result<Vec<NodeDefinition>, Report<CatalogError>>;
}

/// A catalog held in memory.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    definitions: Vec<NodeDefinition>,
}

impl StaticCatalog {
    /// Creates a catalog from the given definitions.
    #[must_use]
    pub fn new(definitions: Vec<NodeDefinition>) -> Self {
        Self { definitions }
    }
}

#[async_trait]
impl CatalogSource for StaticCatalog {
    async fn fetch(&self) -> Result<Vec<NodeDefinition>, Report<CatalogError>> {
        Ok(self.definitions.clone())
    }
}

/// A catalog stored as a JSON array of definitions on disk.
///
/// Entries that do not parse as a definition are skipped with a warning so
/// that one bad entry does not hide the rest of the catalog.
#[derive(Debug, Clone)]
pub struct JsonFileCatalog {
    path: PathBuf,
}

impl JsonFileCatalog {
    /// Creates a catalog reading from `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl CatalogSource for JsonFileCatalog {
    async fn fetch(&self) -> Result<Vec<NodeDefinition>, Report<CatalogError>> {
        let source = self.path.display().to_string();
        let text = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            CatalogError::Unavailable {
                source: source.clone(),
                reason: e.to_string(),
            }
        })?;

        let entries: Vec<JsonValue> =
            serde_json::from_str(&text).map_err(|e| CatalogError::Malformed {
                source: source.clone(),
                reason: e.to_string(),
            })?;

        let mut definitions = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            match serde_json::from_value::<NodeDefinition>(entry) {
                Ok(definition) => definitions.push(definition),
                Err(e) => warn!(%source, index, error = %e, "skipping malformed node definition"),
            }
        }

        Ok(definitions)
    }
}

/// Lookup table of node definitions keyed by type key.
#[derive(Debug, Clone, Default)]
pub struct NodeRegistry {
    definitions: HashMap<String, NodeDefinition>,
}

impl NodeRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry from definitions already in hand.
    #[must_use]
    pub fn with_definitions(definitions: impl IntoIterator<Item = NodeDefinition>) -> Self {
        let mut registry = Self::new();
        for definition in definitions {
            registry.register(definition);
        }
        registry
    }

    /// Loads every definition from `source`.
    ///
    /// Later loads overwrite identically keyed entries. An unavailable
    /// source is logged and leaves the registry as it was; an empty
    /// registry means "no node types available", not a failure.
    ///
    /// Returns the number of definitions loaded.
    #[instrument(skip_all)]
    pub async fn load(&mut self, source: &dyn CatalogSource) -> usize {
        match source.fetch().await {
            Ok(definitions) => {
                let count = definitions.len();
                for definition in definitions {
                    self.register(definition);
                }
                info!(count, total = self.len(), "loaded node catalog");
                count
            }
            Err(report) => {
                warn!(error = %report, "node catalog unavailable, keeping current registry");
                0
            }
        }
    }

    /// Inserts or replaces a single definition.
    pub fn register(&mut self, definition: NodeDefinition) {
        debug!(type_key = %definition.type_key, "registering node type");
        self.definitions
            .insert(definition.type_key.clone(), definition);
    }

    /// Returns the definition for `type_key`, if registered.
    #[must_use]
    pub fn get(&self, type_key: &str) -> Option<&NodeDefinition> {
        self.definitions.get(type_key)
    }

    /// Returns true if `type_key` is registered.
    #[must_use]
    pub fn contains(&self, type_key: &str) -> bool {
        self.definitions.contains_key(type_key)
    }

    /// Returns every definition ordered by type key.
    #[must_use]
    pub fn list(&self) -> Vec<&NodeDefinition> {
        let mut definitions: Vec<_> = self.definitions.values().collect();
        definitions.sort_by(|a, b| a.type_key.cmp(&b.type_key));
        definitions
    }

    /// Returns the definitions in `category`, ordered by type key.
    #[must_use]
    pub fn list_by_category(&self, category: NodeCategory) -> Vec<&NodeDefinition> {
        self.list()
            .into_iter()
            .filter(|definition| definition.category == category)
            .collect()
    }

    /// Number of registered definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Returns true if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::sample_definitions;
    use serde_json::json;
    use std::io::Write;

    struct UnavailableCatalog;

    #[async_trait]
    impl CatalogSource for UnavailableCatalog {
        async fn fetch(&self) -> Result<Vec<NodeDefinition>, Report<CatalogError>> {
            Err(CatalogError::Unavailable {
                source: "backend".to_string(),
                reason: "connection refused".to_string(),
            }
            .into())
        }
    }

    #[tokio::test]
    async fn load_populates_registry() {
        let mut registry = NodeRegistry::new();
        let loaded = registry
            .load(&StaticCatalog::new(sample_definitions()))
            .await;

        assert_eq!(loaded, sample_definitions().len());
        assert!(registry.get("message_trigger").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[tokio::test]
    async fn later_loads_overwrite_same_key() {
        let mut registry = NodeRegistry::new();
        registry
            .load(&StaticCatalog::new(sample_definitions()))
            .await;

        let renamed = NodeDefinition::new("send_message", "Send (v2)", NodeCategory::Action);
        registry.load(&StaticCatalog::new(vec![renamed])).await;

        assert_eq!(registry.len(), sample_definitions().len());
        assert_eq!(registry.get("send_message").unwrap().name, "Send (v2)");
    }

    #[tokio::test]
    async fn unavailable_source_leaves_registry_empty() {
        let mut registry = NodeRegistry::new();
        let loaded = registry.load(&UnavailableCatalog).await;

        assert_eq!(loaded, 0);
        assert!(registry.is_empty());
        assert!(registry.list().is_empty());
    }

    #[test]
    fn list_by_category_filters_and_sorts() {
        let registry = NodeRegistry::with_definitions(sample_definitions());
        let triggers = registry.list_by_category(NodeCategory::Trigger);

        assert!(!triggers.is_empty());
        assert!(triggers.iter().all(|d| d.category == NodeCategory::Trigger));

        let keys: Vec<_> = registry.list().iter().map(|d| d.type_key.clone()).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn definition_exposes_required_config() {
        let definition = NodeDefinition::new("ai_response", "AI Response", NodeCategory::Action)
            .with_config_field("prompt", FieldSpec::new("string").required())
            .with_config_field("temperature", FieldSpec::new("number"));

        let required: Vec<_> = definition.required_config_fields().collect();
        assert_eq!(required, vec!["prompt"]);
    }

    #[tokio::test]
    async fn json_file_catalog_skips_bad_entries() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        let body = json!([
            {
                "type_key": "webhook_trigger",
                "name": "Webhook",
                "category": "trigger",
                "output_schema": { "body": { "type": "object" } }
            },
            { "name": "missing type key" }
        ]);
        write!(file, "{body}").expect("write catalog");

        let mut registry = NodeRegistry::new();
        let loaded = registry.load(&JsonFileCatalog::new(file.path())).await;

        assert_eq!(loaded, 1);
        let webhook = registry.get("webhook_trigger").expect("registered");
        assert_eq!(webhook.output_ports()[0].id, "output_body");
    }

    #[tokio::test]
    async fn missing_json_file_is_unavailable() {
        let catalog = JsonFileCatalog::new("/definitely/not/here.json");
        let err = catalog.fetch().await.unwrap_err();
        assert!(err.to_string().contains("unavailable"));
    }
}
