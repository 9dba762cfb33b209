//! Node executors.
//!
//! The engine does not know what any node type does. Behavior is plugged
//! in per type key through an [`ExecutorRegistry`]; AI responses, message
//! sends and provider calls live outside this crate and implement
//! [`NodeExecutor`].

use crate::execution::ExecutionContext;
use crate::node::{JsonMap, WorkflowNode};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// What a node produced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeOutput {
    /// The value handed to downstream nodes.
    pub output: JsonValue,
    /// Extras recorded on the node result but not passed along.
    #[serde(default)]
    pub metadata: JsonMap,
}

impl NodeOutput {
    #[must_use]
    pub fn new(output: JsonValue) -> Self {
        Self {
            output,
            metadata: JsonMap::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

impl From<JsonValue> for NodeOutput {
    fn from(output: JsonValue) -> Self {
        Self::new(output)
    }
}

/// Trait for node execution.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    /// Runs `node` on `input`.
    ///
    /// `input` is the trigger payload for the entry node and, downstream, an
    /// object keyed by input port name.
    async fn execute(
        &self,
        node: &WorkflowNode,
        input: JsonValue,
        context: &ExecutionContext,
    ) -> Result<NodeOutput, NodeExecutionError>;
}

/// Errors from node execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeExecutionError {
    /// Input validation failed.
    InvalidInput { message: String },
    /// Execution failed.
    ExecutionFailed { message: String },
    /// External service error.
    ExternalServiceError { service: String, message: String },
}

impl std::fmt::Display for NodeExecutionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidInput { message } => write!(f, "invalid input: {message}"),
            Self::ExecutionFailed { message } => write!(f, "execution failed: {message}"),
            Self::ExternalServiceError { service, message } => {
                write!(f, "external service error ({service}): {message}")
            }
        }
    }
}

impl std::error::Error for NodeExecutionError {}

/// Executors keyed by node type key.
#[derive(Clone, Default)]
pub struct ExecutorRegistry {
    executors: HashMap<String, Arc<dyn NodeExecutor>>,
}

impl ExecutorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `executor` for `type_key`, replacing any previous one.
    pub fn register(&mut self, type_key: impl Into<String>, executor: Arc<dyn NodeExecutor>) {
        self.executors.insert(type_key.into(), executor);
    }

    /// Builder form of [`register`](Self::register).
    #[must_use]
    pub fn with(mut self, type_key: impl Into<String>, executor: impl NodeExecutor + 'static) -> Self {
        self.register(type_key, Arc::new(executor));
        self
    }

    #[must_use]
    pub fn get(&self, type_key: &str) -> Option<Arc<dyn NodeExecutor>> {
        self.executors.get(type_key).cloned()
    }

    #[must_use]
    pub fn contains(&self, type_key: &str) -> bool {
        self.executors.contains_key(type_key)
    }

    /// Registered type keys, sorted.
    #[must_use]
    pub fn type_keys(&self) -> Vec<&str> {
        let mut keys: Vec<_> = self.executors.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl std::fmt::Debug for ExecutorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutorRegistry")
            .field("type_keys", &self.type_keys())
            .finish()
    }
}

/// Returns its input unchanged.
///
/// Trigger nodes behave like this when no executor is registered for them.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughExecutor;

#[async_trait]
impl NodeExecutor for PassthroughExecutor {
    async fn execute(
        &self,
        _node: &WorkflowNode,
        input: JsonValue,
        _context: &ExecutionContext,
    ) -> Result<NodeOutput, NodeExecutionError> {
        Ok(NodeOutput::new(input))
    }
}

/// A mock executor that can be configured to succeed or fail.
#[derive(Debug, Clone)]
pub struct MockExecutor {
    /// If set, all executions will fail with this error.
    pub fail_with: Option<NodeExecutionError>,
    /// The output to return on success.
    pub output: JsonValue,
    /// Time to wait before answering.
    pub delay: Option<Duration>,
}

impl MockExecutor {
    /// Creates a mock executor that succeeds with the given output.
    #[must_use]
    pub fn succeeding(output: JsonValue) -> Self {
        Self {
            fail_with: None,
            output,
            delay: None,
        }
    }

    /// Creates a mock executor that fails with the given error.
    #[must_use]
    pub fn failing(error: NodeExecutionError) -> Self {
        Self {
            fail_with: Some(error),
            output: JsonValue::Null,
            delay: None,
        }
    }

    /// Delays every answer by `delay`.
    #[must_use]
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl NodeExecutor for MockExecutor {
    async fn execute(
        &self,
        _node: &WorkflowNode,
        _input: JsonValue,
        _context: &ExecutionContext,
    ) -> Result<NodeOutput, NodeExecutionError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.fail_with {
            Some(e) => Err(e.clone()),
            None => Ok(NodeOutput::new(self.output.clone())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::NodeDefinition;
    use crate::node::{NodeCategory, Position};
    use serde_json::json;

    fn create_node() -> WorkflowNode {
        WorkflowNode::instantiate(
            &NodeDefinition::new("ai_response", "AI Response", NodeCategory::Action),
            Position::default(),
            JsonMap::new(),
        )
    }

    #[tokio::test]
    async fn passthrough_echoes_input() {
        let context = ExecutionContext::new(JsonValue::Null);
        let output = PassthroughExecutor
            .execute(&create_node(), json!({ "a": "value_a", "b": 123 }), &context)
            .await
            .unwrap();

        assert_eq!(output.output["a"], "value_a");
        assert_eq!(output.output["b"], 123);
    }

    #[tokio::test]
    async fn mock_executor_fails_as_configured() {
        let executor = MockExecutor::failing(NodeExecutionError::ExecutionFailed {
            message: "test error".to_string(),
        });
        let context = ExecutionContext::new(JsonValue::Null);

        let err = executor
            .execute(&create_node(), JsonValue::Null, &context)
            .await
            .unwrap_err();

        assert!(err.to_string().contains("test error"));
    }

    #[test]
    fn registry_lookup() {
        let registry = ExecutorRegistry::new()
            .with("send_message", MockExecutor::succeeding(json!({ "sent": true })))
            .with("ai_response", PassthroughExecutor);

        assert!(registry.contains("send_message"));
        assert!(registry.get("condition").is_none());
        assert_eq!(registry.type_keys(), vec!["ai_response", "send_message"]);
    }
}
