//! Strongly-typed identifiers for workflow entities.
//!
//! Every id wraps a ULID, so ids sort by creation time. The display form
//! carries a short type prefix (`wf_01J...`) and parsing accepts either the
//! prefixed or the bare ULID form.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

/// Error returned when parsing an id from a string fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    /// The type of id that failed to parse.
    pub id_type: &'static str,
    /// Why parsing failed.
    pub reason: String,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.id_type, self.reason)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $prefix:expr) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(Ulid);

        impl $name {
            /// Creates a fresh id.
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }

            /// Wraps an existing ULID.
            #[must_use]
            pub const fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            /// Returns the underlying ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> Ulid {
                self.0
            }

            /// Returns the display prefix for this id type.
            #[must_use]
            pub const fn prefix() -> &'static str {
                $prefix
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let raw = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ulid::from_str(raw).map(Self).map_err(|e| ParseIdError {
                    id_type: stringify!($name),
                    reason: e.to_string(),
                })
            }
        }

        impl From<Ulid> for $name {
            fn from(ulid: Ulid) -> Self {
                Self(ulid)
            }
        }
    };
}

define_id!(
    /// Identifies a dashboard user (workflow owner or importer).
    UserId,
    "usr"
);

define_id!(
    /// Identifies a workflow graph.
    WorkflowId,
    "wf"
);

define_id!(
    /// Identifies a node within a workflow graph.
    NodeId,
    "node"
);

define_id!(
    /// Identifies a connection within a workflow graph.
    ConnectionId,
    "conn"
);

define_id!(
    /// Identifies a trigger declaration.
    TriggerId,
    "trg"
);

define_id!(
    /// Identifies a single execution call.
    ExecutionId,
    "exec"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_type_prefix() {
        assert!(WorkflowId::new().to_string().starts_with("wf_"));
        assert!(NodeId::new().to_string().starts_with("node_"));
        assert!(ConnectionId::new().to_string().starts_with("conn_"));
    }

    #[test]
    fn parses_prefixed_and_bare_forms() {
        let id = NodeId::new();
        let prefixed: NodeId = id.to_string().parse().expect("prefixed");
        let bare: NodeId = id.as_ulid().to_string().parse().expect("bare");
        assert_eq!(prefixed, id);
        assert_eq!(bare, id);
    }

    #[test]
    fn rejects_garbage() {
        let err = "conn_nope".parse::<ConnectionId>().unwrap_err();
        assert_eq!(err.id_type, "ConnectionId");
    }

    #[test]
    fn ids_order_by_creation() {
        let first = ExecutionId::from_ulid(Ulid::from_parts(1, 0));
        let second = ExecutionId::from_ulid(Ulid::from_parts(2, 0));
        assert!(first < second);
    }

    #[test]
    fn serializes_as_bare_ulid_string() {
        let id = TriggerId::new();
        let json = serde_json::to_string(&id).expect("serialize");
        assert_eq!(json, format!("\"{}\"", id.as_ulid()));
        let back: TriggerId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, id);
    }
}
