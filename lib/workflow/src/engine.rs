//! The execution engine.
//!
//! One call to [`ExecutionEngine::execute`] runs one workflow graph:
//!
//! 1. Pick the entry trigger: the first enabled trigger node in node order.
//! 2. Optionally validate the graph and refuse to run it if it has
//!    blocking issues.
//! 3. Run the entry trigger on the context input.
//! 4. In downstream mode, run every node reachable from the entry in
//!    topological order. Each node receives an object keyed by its input
//!    port names, filled from the outputs of upstream nodes.
//!
//! The engine keeps no state between calls. Everything a run accumulates
//! lives on the stack of `execute`, so one engine can serve any number of
//! concurrent executions.

use crate::catalog::NodeRegistry;
use crate::error::ExecutionError;
use crate::execution::{
    ExecutionContext, ExecutionMetadata, ExecutionMode, ExecutionResult, NodeResult,
};
use crate::executor::{ExecutorRegistry, NodeExecutor, PassthroughExecutor};
use crate::graph::WorkflowGraph;
use crate::node::{JsonMap, NodeId, WorkflowNode};
use crate::validation::GraphValidator;
use chrono::Utc;
use petgraph::Direction;
use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Bfs;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// How far an execution walks the graph.
    pub mode: ExecutionMode,
    /// Per-node time budget. `None` waits indefinitely.
    pub node_timeout_ms: Option<u64>,
    /// Refuse to run graphs with blocking validation issues.
    pub validate_before_execute: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            node_timeout_ms: None,
            validate_before_execute: true,
        }
    }
}

/// Runs workflow graphs.
#[derive(Debug, Clone)]
pub struct ExecutionEngine {
    registry: Arc<NodeRegistry>,
    executors: Arc<ExecutorRegistry>,
    config: EngineConfig,
}

/// What one execution has accumulated so far.
#[derive(Default)]
struct RunLog {
    entry: Option<NodeId>,
    executed: Vec<NodeId>,
    node_results: HashMap<NodeId, NodeResult>,
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

impl ExecutionEngine {
    /// Creates an engine with default settings.
    #[must_use]
    pub fn new(registry: Arc<NodeRegistry>, executors: ExecutorRegistry) -> Self {
        Self {
            registry,
            executors: Arc::new(executors),
            config: EngineConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Executes `graph`.
    ///
    /// Never fails: every problem is reported through the returned result
    /// with `success == false`, along with the results of the nodes that
    /// ran before it.
    #[instrument(
        skip_all,
        fields(workflow_id = %graph.id, execution_id = %context.execution_id, mode = %self.config.mode)
    )]
    pub async fn execute(
        &self,
        graph: &WorkflowGraph,
        mut context: ExecutionContext,
    ) -> ExecutionResult {
        let started_at = Utc::now();
        let clock = Instant::now();
        context.seed_variables(graph.variables());

        let mut log = RunLog::default();
        let outcome = self.run(graph, &context, &mut log).await;

        let (success, result, error) = match outcome {
            Ok(output) => {
                info!(nodes = log.executed.len(), "execution completed");
                (true, Some(output), None)
            }
            Err(e) => {
                warn!(error = %e, "execution failed");
                (false, None, Some(e.to_string()))
            }
        };

        ExecutionResult {
            execution_id: context.execution_id,
            workflow_id: graph.id,
            success,
            result,
            error,
            node_results: log.node_results,
            elapsed_ms: elapsed_ms(clock),
            metadata: ExecutionMetadata {
                entry_node: log.entry,
                executed_nodes: log.executed,
                mode: self.config.mode,
                started_at,
                finished_at: Utc::now(),
            },
        }
    }

    async fn run(
        &self,
        graph: &WorkflowGraph,
        context: &ExecutionContext,
        log: &mut RunLog,
    ) -> Result<JsonValue, ExecutionError> {
        if graph.trigger_nodes().next().is_none() {
            return Err(ExecutionError::NoTriggerNode);
        }
        let entry = graph
            .enabled_trigger_nodes()
            .next()
            .ok_or(ExecutionError::AllTriggersDisabled)?;

        if self.config.validate_before_execute {
            let validation = GraphValidator::new(&self.registry).validate(graph);
            if let Some(first) = validation.errors.first() {
                return Err(ExecutionError::InvalidGraph {
                    error_count: validation.errors.len(),
                    first: first.message.clone(),
                });
            }
        }

        log.entry = Some(entry.id);
        debug!(entry = %entry.id, type_key = %entry.type_key, "starting from trigger");

        let entry_output = self
            .run_node(entry, context.input.clone(), context, log)
            .await?;

        match self.config.mode {
            ExecutionMode::EntryOnly => Ok(entry_output),
            ExecutionMode::Downstream => {
                self.run_downstream(graph, entry.id, entry_output, context, log)
                    .await
            }
        }
    }

    async fn run_downstream(
        &self,
        graph: &WorkflowGraph,
        entry: NodeId,
        entry_output: JsonValue,
        context: &ExecutionContext,
        log: &mut RunLog,
    ) -> Result<JsonValue, ExecutionError> {
        let reachable = reachable_subgraph(graph, entry);
        let order = toposort(&reachable, None).map_err(|cycle| {
            ExecutionError::CircularDependency {
                node_id: cycle.node_id(),
            }
        })?;

        let mut outputs = HashMap::from([(entry, entry_output)]);
        let mut last_terminal = None;

        for node_id in order {
            if node_id != entry {
                let Some(node) = graph.node(node_id) else {
                    continue;
                };
                let input = gather_input(graph, node, &outputs);
                let output = self.run_node(node, input, context, log).await?;
                outputs.insert(node_id, output);
            }

            let is_terminal = reachable
                .neighbors_directed(node_id, Direction::Outgoing)
                .next()
                .is_none();
            if is_terminal {
                last_terminal = outputs.get(&node_id).cloned();
            }
        }

        Ok(last_terminal.unwrap_or(JsonValue::Null))
    }

    async fn run_node(
        &self,
        node: &WorkflowNode,
        input: JsonValue,
        context: &ExecutionContext,
        log: &mut RunLog,
    ) -> Result<JsonValue, ExecutionError> {
        if context.is_cancelled() {
            return Err(ExecutionError::Cancelled);
        }

        let clock = Instant::now();
        let executor: Arc<dyn NodeExecutor> = match self.executors.get(&node.type_key) {
            Some(executor) => executor,
            None if node.is_trigger() => Arc::new(PassthroughExecutor),
            None => {
                let err = ExecutionError::UnsupportedNodeType {
                    node_id: node.id,
                    type_key: node.type_key.clone(),
                };
                log.record(node, Err(err.to_string()), clock);
                return Err(err);
            }
        };

        debug!(node_id = %node.id, type_key = %node.type_key, "running node");
        let call = executor.execute(node, input, context);
        let timeout_ms = self.config.node_timeout_ms;
        let guarded = async {
            let outcome = match timeout_ms {
                Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), call).await {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        return Err(ExecutionError::NodeTimeout {
                            node_id: node.id,
                            timeout_ms: ms,
                        });
                    }
                },
                None => call.await,
            };
            outcome.map_err(|e| ExecutionError::NodeFailed {
                node_id: node.id,
                reason: e.to_string(),
            })
        };

        let outcome = tokio::select! {
            biased;
            () = context.cancellation_token().cancelled() => Err(ExecutionError::Cancelled),
            outcome = guarded => outcome,
        };

        match outcome {
            Ok(output) => {
                let value = output.output.clone();
                log.record_output(node, output.output, output.metadata, clock);
                Ok(value)
            }
            Err(e) => {
                log.record(node, Err(e.to_string()), clock);
                Err(e)
            }
        }
    }
}

impl RunLog {
    fn record(&mut self, node: &WorkflowNode, outcome: Result<JsonValue, String>, clock: Instant) {
        let (success, output, error) = match outcome {
            Ok(output) => (true, Some(output), None),
            Err(error) => (false, None, Some(error)),
        };
        self.executed.push(node.id);
        self.node_results.insert(
            node.id,
            NodeResult {
                node_id: node.id,
                type_key: node.type_key.clone(),
                success,
                output,
                error,
                elapsed_ms: elapsed_ms(clock),
                metadata: JsonMap::new(),
            },
        );
    }

    fn record_output(
        &mut self,
        node: &WorkflowNode,
        output: JsonValue,
        metadata: JsonMap,
        clock: Instant,
    ) {
        self.record(node, Ok(output), clock);
        if let Some(result) = self.node_results.get_mut(&node.id) {
            result.metadata = metadata;
        }
    }
}

/// The part of the connection digraph reachable from `entry`.
fn reachable_subgraph(graph: &WorkflowGraph, entry: NodeId) -> DiGraphMap<NodeId, ()> {
    let full = graph.digraph();
    let mut seen = HashSet::new();
    let mut bfs = Bfs::new(&full, entry);
    while let Some(node_id) = bfs.next(&full) {
        seen.insert(node_id);
    }

    let mut reachable = DiGraphMap::new();
    for node in graph.nodes().iter().filter(|n| seen.contains(&n.id)) {
        reachable.add_node(node.id);
    }
    for (source, target, _) in full.all_edges() {
        if seen.contains(&source) && seen.contains(&target) {
            reachable.add_edge(source, target, ());
        }
    }
    reachable
}

/// Builds a node's input from the outputs of the nodes feeding it.
///
/// Keys are the target port names. Each value is the field of the source
/// output named like the source port, or the whole source output when it
/// has no such field.
fn gather_input(
    graph: &WorkflowGraph,
    node: &WorkflowNode,
    outputs: &HashMap<NodeId, JsonValue>,
) -> JsonValue {
    let mut input = JsonMap::new();

    for connection in graph.incoming(node.id) {
        let Some(upstream) = outputs.get(&connection.source_node_id) else {
            continue;
        };
        let field = graph
            .node(connection.source_node_id)
            .and_then(|source| source.output_port(&connection.source_port_id))
            .map(|port| port.name.as_str());
        let value = field
            .and_then(|field| upstream.get(field))
            .unwrap_or(upstream)
            .clone();

        let key = node
            .input_port(&connection.target_port_id)
            .map_or_else(|| connection.target_port_id.clone(), |port| port.name.clone());
        input.insert(key, value);
    }

    JsonValue::Object(input)
}
