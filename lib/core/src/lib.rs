//! Core domain types shared by the agentflow crates.
//!
//! This crate provides the strongly-typed identifiers and the error-handling
//! foundation used by the workflow engine and its operator tooling.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ConnectionId, ExecutionId, NodeId, ParseIdError, TriggerId, UserId, WorkflowId};
