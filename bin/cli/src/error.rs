//! Error types for CLI commands.

use std::fmt;

/// Why a command failed.
#[derive(Debug)]
pub enum CliError {
    /// Configuration could not be loaded.
    Config { details: String },
    /// A file could not be read or written.
    Io { path: String, details: String },
    /// A workflow argument is neither an id nor a readable file.
    InvalidWorkflowRef { input: String },
    /// No stored workflow has the given id.
    WorkflowNotFound { id: String },
    /// A workflow file is not valid workflow JSON.
    InvalidWorkflow { details: String },
    /// An owner argument is not a user id.
    InvalidOwner { input: String },
    /// The run input is not valid JSON.
    InvalidInput { details: String },
    /// The workflow store failed.
    Store { details: String },
    /// Reading or writing a workflow document failed.
    Document { details: String },
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "configuration error: {details}"),
            Self::Io { path, details } => write!(f, "cannot access '{path}': {details}"),
            Self::InvalidWorkflowRef { input } => {
                write!(f, "'{input}' is neither a workflow id nor a workflow file")
            }
            Self::WorkflowNotFound { id } => write!(f, "workflow '{id}' not found"),
            Self::InvalidWorkflow { details } => write!(f, "invalid workflow: {details}"),
            Self::InvalidOwner { input } => write!(f, "'{input}' is not a user id"),
            Self::InvalidInput { details } => write!(f, "invalid run input: {details}"),
            Self::Store { details } => write!(f, "workflow store error: {details}"),
            Self::Document { details } => write!(f, "workflow document error: {details}"),
        }
    }
}

impl std::error::Error for CliError {}
