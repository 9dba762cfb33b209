//! Workflow graph engine for the agentflow platform.
//!
//! This crate provides:
//!
//! - **Node Registry**: the catalog of node types, loaded from a catalog source
//! - **Port System**: concrete ports generated from node type schemas
//! - **Graph Model**: nodes, port-to-port connections, variables and triggers
//! - **Validation**: connection checks and whole-graph validation
//! - **Execution**: an engine that runs a graph from its entry trigger
//! - **Persistence**: the workflow store contract and export/import documents

pub mod catalog;
pub mod connection;
pub mod definition;
pub mod document;
pub mod engine;
pub mod error;
pub mod execution;
pub mod executor;
pub mod graph;
pub mod node;
pub mod port;
pub mod store;
pub mod trigger;
pub mod validation;

pub use catalog::{
    CatalogError, CatalogSource, JsonFileCatalog, NodeDefinition, NodeRegistry, StaticCatalog,
};
pub use connection::{ConnectionId, WorkflowConnection};
pub use definition::{WorkflowMetadata, WorkflowSummary, WorkflowVariable};
pub use document::{DocumentError, WorkflowDocument, export, import};
pub use engine::{EngineConfig, ExecutionEngine};
pub use error::{ExecutionError, GraphError};
pub use execution::{ExecutionContext, ExecutionMode, ExecutionResult, NodeResult};
pub use executor::{
    ExecutorRegistry, MockExecutor, NodeExecutionError, NodeExecutor, NodeOutput,
    PassthroughExecutor,
};
pub use graph::WorkflowGraph;
pub use node::{JsonMap, NodeCategory, NodeId, NodeUpdate, Position, WorkflowNode};
pub use port::{FieldSpec, Port, PortDirection, generate_ports};
pub use store::{DirectoryStore, InMemoryStore, StoreError, WorkflowStore, persist};
pub use trigger::{ReconcileResult, TriggerDeclaration, TriggerId};
pub use validation::{
    GraphValidator, Severity, ValidationErrorKind, ValidationIssue, ValidationResult,
    ValidationWarning, WarningKind,
};

#[cfg(test)]
pub(crate) mod testing {
    use crate::catalog::{NodeDefinition, NodeRegistry};
    use crate::graph::WorkflowGraph;
    use crate::node::{JsonMap, NodeCategory, NodeId, Position};
    use crate::port::FieldSpec;
    use serde_json::json;

    pub fn sample_definitions() -> Vec<NodeDefinition> {
        vec![
            NodeDefinition::new("message_trigger", "Message Received", NodeCategory::Trigger)
                .with_description("Starts when a message arrives on a channel")
                .with_outputs(json!({
                    "message": { "type": "string", "required": true },
                    "sender": { "type": "string" },
                    "channel": { "type": "string" }
                }))
                .with_config_field("channel", FieldSpec::new("string")),
            NodeDefinition::new("ai_response", "AI Response", NodeCategory::Action)
                .with_inputs(json!({ "message": { "type": "string", "required": true } }))
                .with_outputs(json!({ "reply": { "type": "string" } }))
                .with_config_field("prompt", FieldSpec::new("string").required()),
            NodeDefinition::new("send_message", "Send Message", NodeCategory::Action)
                .with_inputs(json!({
                    "message": { "type": "string", "required": true },
                    "channel": { "type": "string" }
                }))
                .with_outputs(json!({ "message_id": { "type": "string" } })),
            NodeDefinition::new("condition", "Condition", NodeCategory::Logic)
                .with_inputs(json!({ "value": {} }))
                .with_outputs(json!({ "result": { "type": "boolean" } }))
                .with_config_field("expression", FieldSpec::new("string").required()),
            NodeDefinition::new("http_request", "HTTP Request", NodeCategory::Integration)
                .with_inputs(json!({ "body": { "type": "object" } }))
                .with_outputs(json!({ "response": { "type": "object" } }))
                .with_config_field("url", FieldSpec::new("string").required()),
        ]
    }

    pub fn registry() -> NodeRegistry {
        NodeRegistry::with_definitions(sample_definitions())
    }

    /// `message_trigger -> ai_response -> send_message`, returning the
    /// graph and the three node ids in that order.
    pub fn sample_graph() -> (WorkflowGraph, NodeId, NodeId, NodeId) {
        let registry = registry();
        let mut graph = WorkflowGraph::new("Support bot");
        let trigger = graph
            .add_node(&registry, "message_trigger", Position::new(0.0, 0.0), JsonMap::new())
            .expect("known type")
            .id;
        let mut config = JsonMap::new();
        config.insert("prompt".to_string(), json!("Answer politely"));
        let reply = graph
            .add_node(&registry, "ai_response", Position::new(200.0, 0.0), config)
            .expect("known type")
            .id;
        let send = graph
            .add_node(&registry, "send_message", Position::new(400.0, 0.0), JsonMap::new())
            .expect("known type")
            .id;
        graph
            .create_connection(trigger, "output_message", reply, "input_message")
            .expect("valid connection");
        graph
            .create_connection(reply, "output_reply", send, "input_message")
            .expect("valid connection");
        (graph, trigger, reply, send)
    }
}
