//! Execution context and results.
//!
//! An [`ExecutionContext`] is what the caller hands the engine for one run;
//! an [`ExecutionResult`] is what comes back. Results always come back,
//! failures included, so callers never have to handle an `Err` from
//! `execute`.

use crate::definition::WorkflowVariable;
use crate::node::{JsonMap, NodeId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use agentflow_core::{ExecutionId, WorkflowId};

/// How far an execution walks the graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Run only the entry trigger and return its output.
    EntryOnly,
    /// Run the entry trigger and everything reachable from it, in
    /// topological order, threading outputs along connections.
    #[default]
    Downstream,
}

impl ExecutionMode {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::EntryOnly => "entry_only",
            Self::Downstream => "downstream",
        }
    }
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs and ambient data for one execution.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Identifier of this execution.
    pub execution_id: ExecutionId,
    /// Payload handed to the entry trigger.
    pub input: JsonValue,
    /// Who started the execution, if known.
    pub caller: Option<String>,
    /// Channel the triggering event arrived on (`web_chat`, `whatsapp`, ...).
    pub channel: Option<String>,
    /// Variable values. Workflow defaults fill in whatever is missing.
    pub variables: JsonMap,
    cancellation: CancellationToken,
}

impl ExecutionContext {
    /// Creates a context with a fresh execution id.
    #[must_use]
    pub fn new(input: JsonValue) -> Self {
        Self {
            execution_id: ExecutionId::new(),
            input,
            caller: None,
            channel: None,
            variables: JsonMap::new(),
            cancellation: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_caller(mut self, caller: impl Into<String>) -> Self {
        self.caller = Some(caller.into());
        self
    }

    #[must_use]
    pub fn with_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: JsonValue) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    /// Uses `token` for cancellation, e.g. a child of a server-wide token.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    /// The token the engine watches for this execution.
    #[must_use]
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Requests cancellation of the execution.
    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Fills variables the caller did not supply from workflow defaults.
    pub fn seed_variables(&mut self, defaults: &[WorkflowVariable]) {
        for variable in defaults {
            self.variables
                .entry(variable.name.clone())
                .or_insert_with(|| variable.default_value.clone());
        }
    }
}

/// Outcome of running a single node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeResult {
    pub node_id: NodeId,
    pub type_key: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<JsonValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub elapsed_ms: u64,
    /// Executor-reported extras (token counts, provider ids).
    #[serde(default)]
    pub metadata: JsonMap,
}

/// Bookkeeping about an execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    /// The trigger the execution started from.
    pub entry_node: Option<NodeId>,
    /// Nodes that were run, in the order they ran.
    pub executed_nodes: Vec<NodeId>,
    pub mode: ExecutionMode,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Outcome of one execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub execution_id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub success: bool,
    /// Output of the execution when it succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<JsonValue>,
    /// Failure message when it did not.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Per-node outcomes, including those of nodes that ran before a failure.
    pub node_results: HashMap<NodeId, NodeResult>,
    pub elapsed_ms: u64,
    pub metadata: ExecutionMetadata,
}

impl ExecutionResult {
    /// Returns the recorded result for `node_id`.
    #[must_use]
    pub fn node(&self, node_id: NodeId) -> Option<&NodeResult> {
        self.node_results.get(&node_id)
    }
}
