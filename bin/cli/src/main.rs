//! Operator CLI for agentflow workflows.

mod commands;
mod config;
mod error;

use agentflow_workflow::{ExecutionMode, NodeCategory};
use crate::commands::{RunOptions, Workspace};
use crate::config::AppConfig;
use crate::error::CliError;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Inspect, validate, run, export and import agentflow workflows.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML, JSON or YAML).
    #[arg(long, global = true, env = "AGENTFLOW_CONFIG")]
    config: Option<PathBuf>,

    /// Node catalog file; overrides the configured path.
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Workflow store directory; overrides the configured path.
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the node types in the catalog.
    Nodes {
        #[arg(long, value_enum)]
        category: Option<CategoryArg>,
    },
    /// List stored workflows.
    List,
    /// Validate a workflow (stored id or file).
    Validate { workflow: String },
    /// Run a workflow once and print the execution result.
    Run {
        workflow: String,
        /// Trigger payload as JSON.
        #[arg(long)]
        input: Option<String>,
        /// Register a passthrough executor for every node type.
        #[arg(long)]
        echo: bool,
        #[arg(long)]
        caller: Option<String>,
        #[arg(long)]
        channel: Option<String>,
        #[arg(long, value_enum)]
        mode: Option<ModeArg>,
    },
    /// Export a workflow as a portable document.
    Export {
        workflow: String,
        /// Output file; stdout when omitted.
        #[arg(long, short)]
        out: Option<PathBuf>,
    },
    /// Import a workflow document into the store as a new workflow.
    Import {
        file: PathBuf,
        /// Owner of the imported workflow (`usr_...`).
        #[arg(long)]
        owner: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CategoryArg {
    Trigger,
    Action,
    Logic,
    Integration,
}

impl From<CategoryArg> for NodeCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Trigger => Self::Trigger,
            CategoryArg::Action => Self::Action,
            CategoryArg::Logic => Self::Logic,
            CategoryArg::Integration => Self::Integration,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ModeArg {
    EntryOnly,
    Downstream,
}

impl From<ModeArg> for ExecutionMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::EntryOnly => Self::EntryOnly,
            ModeArg::Downstream => Self::Downstream,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", CliError::Config {
                details: e.to_string()
            });
            return ExitCode::FAILURE;
        }
    };
    if let Some(catalog) = cli.catalog {
        config.catalog_path = catalog;
    }
    if let Some(store) = cli.store {
        config.store_dir = store;
    }

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let workspace = Workspace::open(config).await;

    let outcome = match cli.command {
        Command::Nodes { category } => {
            workspace.nodes(category.map(NodeCategory::from));
            Ok(true)
        }
        Command::List => workspace.list().await.map(|()| true),
        Command::Validate { workflow } => workspace.validate(&workflow).await.map(|r| r.valid),
        Command::Run {
            workflow,
            input,
            echo,
            caller,
            channel,
            mode,
        } => {
            let options = RunOptions {
                input,
                echo,
                caller,
                channel,
                mode: mode.map(ExecutionMode::from),
            };
            workspace.run(&workflow, options).await.map(|r| r.success)
        }
        Command::Export { workflow, out } => workspace
            .export(&workflow, out.as_deref())
            .await
            .map(|()| true),
        Command::Import { file, owner } => workspace
            .import(&file, owner.as_deref())
            .await
            .map(|_| true),
    };

    match outcome {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(report) => {
            tracing::error!(error = %report, "command failed");
            eprintln!("error: {report}");
            ExitCode::FAILURE
        }
    }
}
