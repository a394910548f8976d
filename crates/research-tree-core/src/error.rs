//! Domain errors for tree operations.
//!
//! Engine and repository functions return `anyhow::Result`; the variants
//! below travel inside the `anyhow::Error` so callers can branch with
//! `err.downcast_ref::<TreeError>()`.

use crate::models::{NodeId, SessionId};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("node not found: {0}")]
    NodeNotFound(String),

    #[error("invalid tree structure: {0}")]
    InvalidStructure(String),

    #[error("node {0} is final; its content cannot be overwritten")]
    NodeFinalized(NodeId),

    #[error("invalid outline: {0}")]
    InvalidOutline(String),
}

impl TreeError {
    /// True for the variants a caller should surface as "not found".
    pub fn is_not_found(&self) -> bool {
        matches!(self, TreeError::SessionNotFound(_) | TreeError::NodeNotFound(_))
    }
}
