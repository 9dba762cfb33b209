//! CLI configuration.
//!
//! Loaded via the `config` crate from an optional file and from
//! `AGENTFLOW__*` environment variables, e.g.
//! `AGENTFLOW__ENGINE__NODE_TIMEOUT_MS=5000`.

use agentflow_workflow::EngineConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// JSON file holding the node type catalog.
    #[serde(default = "default_catalog_path")]
    pub catalog_path: PathBuf,

    /// Directory the workflow store writes to.
    #[serde(default = "default_store_dir")]
    pub store_dir: PathBuf,

    /// Filter used when `RUST_LOG` is not set.
    #[serde(default = "default_log_filter")]
    pub log_filter: String,

    /// Execution engine settings.
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_catalog_path() -> PathBuf {
    PathBuf::from("nodes.json")
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("workflows")
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            catalog_path: default_catalog_path(),
            store_dir: default_store_dir(),
            log_filter: default_log_filter(),
            engine: EngineConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from `file` (if given) and the environment.
    ///
    /// Environment variables win over the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a value has the
    /// wrong type.
    pub fn load(file: Option<&Path>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::from(path));
        }
        builder
            .add_source(
                config::Environment::with_prefix("AGENTFLOW")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentflow_workflow::ExecutionMode;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.catalog_path, PathBuf::from("nodes.json"));
        assert_eq!(config.store_dir, PathBuf::from("workflows"));
        assert!(config.engine.validate_before_execute);
    }

    #[test]
    fn file_values_are_read() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        writeln!(
            file,
            "catalog_path = \"catalog/nodes.json\"\n\n[engine]\nmode = \"entry_only\"\nnode_timeout_ms = 250"
        )
        .expect("write config");

        let config = AppConfig::load(Some(file.path())).expect("load");

        assert_eq!(config.catalog_path, PathBuf::from("catalog/nodes.json"));
        assert_eq!(config.engine.mode, ExecutionMode::EntryOnly);
        assert_eq!(config.engine.node_timeout_ms, Some(250));
        assert!(config.engine.validate_before_execute);
    }
}
