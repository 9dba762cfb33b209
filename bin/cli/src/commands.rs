//! Subcommand implementations.

use crate::config::AppConfig;
use crate::error::CliError;
use agentflow_core::{UserId, WorkflowId};
use agentflow_workflow::{
    DirectoryStore, ExecutionContext, ExecutionEngine, ExecutionMode, ExecutionResult,
    ExecutorRegistry, GraphValidator, JsonFileCatalog, NodeCategory, NodeRegistry,
    PassthroughExecutor, ValidationResult, WorkflowDocument, WorkflowGraph, WorkflowStore,
    export, import, persist,
};
use rootcause::Report;
use serde_json::Value as JsonValue;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

/// Shared state for every subcommand: the node catalog, the store and the
/// engine settings.
pub struct Workspace {
    registry: Arc<NodeRegistry>,
    store: DirectoryStore,
    config: AppConfig,
}

/// Options for `run`.
#[derive(Debug, Default)]
pub struct RunOptions {
    pub input: Option<String>,
    pub echo: bool,
    pub caller: Option<String>,
    pub channel: Option<String>,
    pub mode: Option<ExecutionMode>,
}

impl Workspace {
    /// Loads the node catalog and opens the store.
    ///
    /// A missing or unreadable catalog leaves the registry empty.
    pub async fn open(config: AppConfig) -> Self {
        let mut registry = NodeRegistry::new();
        registry
            .load(&JsonFileCatalog::new(&config.catalog_path))
            .await;
        if registry.is_empty() {
            warn!(path = %config.catalog_path.display(), "no node types available");
        }

        Self {
            registry: Arc::new(registry),
            store: DirectoryStore::new(&config.store_dir),
            config,
        }
    }

    /// Prints the node catalog, optionally restricted to one category.
    pub fn nodes(&self, category: Option<NodeCategory>) {
        let definitions = match category {
            Some(category) => self.registry.list_by_category(category),
            None => self.registry.list(),
        };
        for definition in definitions {
            let inputs: Vec<_> = definition.input_ports().into_iter().map(|p| p.id).collect();
            let outputs: Vec<_> = definition.output_ports().into_iter().map(|p| p.id).collect();
            println!(
                "{:<24} {:<12} {}  in: [{}] out: [{}]",
                definition.type_key,
                definition.category,
                definition.name,
                inputs.join(", "),
                outputs.join(", ")
            );
        }
    }

    /// Prints the stored workflows.
    pub async fn list(&self) -> Result<(), Report<CliError>> {
        let summaries = self.store.list().await.map_err(|e| CliError::Store {
            details: e.to_string(),
        })?;
        for summary in summaries {
            println!(
                "{}  v{:<4} {:<32} nodes: {} triggers: {}",
                summary.id, summary.version, summary.name, summary.node_count, summary.trigger_count
            );
        }
        Ok(())
    }

    /// Validates a workflow and prints every finding.
    pub async fn validate(&self, workflow: &str) -> Result<ValidationResult, Report<CliError>> {
        let graph = self.resolve(workflow).await?;
        let result = GraphValidator::new(&self.registry).validate(&graph);

        for issue in &result.errors {
            println!("error   [{}] {}", issue.kind, issue.message);
        }
        for warning in &result.warnings {
            println!("warning {}", warning.message);
        }
        println!(
            "{}: {} error(s), {} warning(s)",
            if result.valid { "valid" } else { "invalid" },
            result.errors.len(),
            result.warnings.len()
        );
        Ok(result)
    }

    /// Runs a workflow once and prints the result as JSON.
    ///
    /// Ctrl-C cancels the execution.
    pub async fn run(
        &self,
        workflow: &str,
        options: RunOptions,
    ) -> Result<ExecutionResult, Report<CliError>> {
        let graph = self.resolve(workflow).await?;
        let input = match options.input.as_deref() {
            Some(text) => serde_json::from_str(text).map_err(|e| CliError::InvalidInput {
                details: e.to_string(),
            })?,
            None => JsonValue::Object(serde_json::Map::new()),
        };

        let mut executors = ExecutorRegistry::new();
        if options.echo {
            for definition in self.registry.list() {
                executors.register(definition.type_key.clone(), Arc::new(PassthroughExecutor));
            }
        }

        let mut engine_config = self.config.engine.clone();
        if let Some(mode) = options.mode {
            engine_config.mode = mode;
        }
        let engine =
            ExecutionEngine::new(Arc::clone(&self.registry), executors).with_config(engine_config);

        let mut context = ExecutionContext::new(input);
        if let Some(caller) = options.caller {
            context = context.with_caller(caller);
        }
        if let Some(channel) = options.channel {
            context = context.with_channel(channel);
        }

        let token = context.cancellation_token().clone();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupted, cancelling execution");
                token.cancel();
            }
        });
        let result = engine.execute(&graph, context).await;
        interrupt.abort();

        let rendered = serde_json::to_string_pretty(&result).map_err(|e| CliError::Io {
            path: "stdout".to_string(),
            details: e.to_string(),
        })?;
        println!("{rendered}");
        Ok(result)
    }

    /// Writes a stored workflow as a document to `out`, or stdout.
    pub async fn export(&self, workflow: &str, out: Option<&Path>) -> Result<(), Report<CliError>> {
        let graph = self.resolve(workflow).await?;
        let text = export(&graph).to_json().map_err(|e| CliError::Document {
            details: e.to_string(),
        })?;

        match out {
            Some(path) => {
                tokio::fs::write(path, text).await.map_err(|e| CliError::Io {
                    path: path.display().to_string(),
                    details: e.to_string(),
                })?;
                info!(workflow_id = %graph.id, path = %path.display(), "exported workflow");
            }
            None => println!("{text}"),
        }
        Ok(())
    }

    /// Imports a document into the store as a new workflow.
    pub async fn import(
        &self,
        file: &Path,
        owner: Option<&str>,
    ) -> Result<WorkflowId, Report<CliError>> {
        let owner = owner
            .map(|input| {
                UserId::from_str(input).map_err(|_| CliError::InvalidOwner {
                    input: input.to_string(),
                })
            })
            .transpose()?;

        let text = read_file(file).await?;
        let document = WorkflowDocument::from_json(&text).map_err(|e| CliError::Document {
            details: e.to_string(),
        })?;
        let mut graph = import(document, owner).map_err(|e| CliError::Document {
            details: e.to_string(),
        })?;

        persist(&self.store, &mut graph)
            .await
            .map_err(|e| CliError::Store {
                details: e.to_string(),
            })?;
        println!("{}", graph.id);
        Ok(graph.id)
    }

    /// Finds a workflow by file path or stored id.
    async fn resolve(&self, workflow: &str) -> Result<WorkflowGraph, Report<CliError>> {
        let path = Path::new(workflow);
        if tokio::fs::try_exists(path).await.unwrap_or(false) {
            let text = read_file(path).await?;
            let mut graph: WorkflowGraph =
                serde_json::from_str(&text).map_err(|e| CliError::InvalidWorkflow {
                    details: e.to_string(),
                })?;
            graph.sync_triggers();
            return Ok(graph);
        }

        let id = WorkflowId::from_str(workflow).map_err(|_| CliError::InvalidWorkflowRef {
            input: workflow.to_string(),
        })?;
        self.store
            .load(id)
            .await
            .map_err(|e| CliError::Store {
                details: e.to_string(),
            })?
            .ok_or_else(|| {
                CliError::WorkflowNotFound {
                    id: id.to_string(),
                }
                .into()
            })
    }
}

async fn read_file(path: &Path) -> Result<String, Report<CliError>> {
    tokio::fs::read_to_string(path).await.map_err(|e| {
        CliError::Io {
            path: path.display().to_string(),
            details: e.to_string(),
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_workflow::{JsonMap, Position};
    use serde_json::json;
    use tempfile::TempDir;

    async fn workspace() -> (TempDir, Workspace) {
        let dir = tempfile::tempdir().expect("temp dir");
        let catalog = json!([
            {
                "type_key": "message_trigger",
                "name": "Message Received",
                "category": "trigger",
                "output_schema": {
                    "message": { "type": "string", "required": true },
                    "sender": { "type": "string" }
                }
            },
            {
                "type_key": "send_message",
                "name": "Send Message",
                "category": "action",
                "input_schema": { "message": { "type": "string" } }
            }
        ]);
        let catalog_path = dir.path().join("nodes.json");
        std::fs::write(&catalog_path, catalog.to_string()).expect("write catalog");

        let config = AppConfig {
            catalog_path,
            store_dir: dir.path().join("workflows"),
            ..AppConfig::default()
        };
        let workspace = Workspace::open(config).await;
        (dir, workspace)
    }

    async fn stored_workflow(workspace: &Workspace) -> WorkflowId {
        let mut graph = WorkflowGraph::new("Echo");
        let trigger = graph
            .add_node(&workspace.registry, "message_trigger", Position::default(), JsonMap::new())
            .expect("known type")
            .id;
        let send = graph
            .add_node(&workspace.registry, "send_message", Position::default(), JsonMap::new())
            .expect("known type")
            .id;
        graph
            .create_connection(trigger, "output_message", send, "input_message")
            .expect("valid connection");
        persist(&workspace.store, &mut graph).await.expect("saved");
        graph.id
    }

    #[tokio::test]
    async fn run_stored_workflow_with_echo_executors() {
        let (_dir, workspace) = workspace().await;
        let id = stored_workflow(&workspace).await;

        let result = workspace
            .run(
                &id.to_string(),
                RunOptions {
                    input: Some(r#"{"message":"hi","sender":"u1"}"#.to_string()),
                    echo: true,
                    ..RunOptions::default()
                },
            )
            .await
            .expect("ran");

        assert!(result.success, "error: {:?}", result.error);
        assert_eq!(result.result, Some(json!({ "message": "hi" })));
    }

    #[tokio::test]
    async fn run_without_executors_fails_on_actions() {
        let (_dir, workspace) = workspace().await;
        let id = stored_workflow(&workspace).await;

        let result = workspace
            .run(&id.to_string(), RunOptions::default())
            .await
            .expect("ran");

        assert!(!result.success);
        assert!(result.error.unwrap().contains("send_message"));
    }

    #[tokio::test]
    async fn export_then_import_creates_new_workflow() {
        let (dir, workspace) = workspace().await;
        let id = stored_workflow(&workspace).await;
        let out = dir.path().join("echo.workflow.json");

        workspace
            .export(&id.to_string(), Some(&out))
            .await
            .expect("exported");
        let imported = workspace.import(&out, None).await.expect("imported");

        assert_ne!(imported, id);
        let validation = workspace
            .validate(&imported.to_string())
            .await
            .expect("validated");
        assert!(validation.valid);
    }

    #[tokio::test]
    async fn unknown_reference_is_rejected() {
        let (_dir, workspace) = workspace().await;

        let err = workspace.validate("not-a-workflow").await.unwrap_err();
        assert!(err.to_string().contains("neither a workflow id"));

        let missing = WorkflowId::new().to_string();
        let err = workspace.validate(&missing).await.unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[tokio::test]
    async fn import_rejects_bad_owner() {
        let (dir, workspace) = workspace().await;
        let err = workspace
            .import(&dir.path().join("missing.json"), Some("bob"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not a user id"));
    }
}
