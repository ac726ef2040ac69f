//! Core error types for portlayout-core.
//!
//! Uses `thiserror` for structured, matchable error variants covering every
//! way a structural layout edit can be rejected. All of them are raised
//! before the tree is touched.

use thiserror::Error;

use crate::id::NodeId;
use crate::permission::Capability;

/// Core errors produced by the portlayout-core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A node id was not found in the tree.
    #[error("node not found: {id}")]
    NodeNotFound { id: NodeId },

    /// A capability flag check failed.
    #[error("permission denied: {capability} is not allowed on node {id}")]
    PermissionDenied { id: NodeId, capability: Capability },

    /// The request is malformed or structurally illegal.
    #[error("invalid request: {reason}")]
    InvalidRequest { reason: String },

    /// A raw identifier could not be parsed.
    #[error("invalid node id '{raw}': {reason}")]
    InvalidId { raw: String, reason: String },

    /// A tree invariant was violated (only raised by validation of
    /// reconstructed snapshots).
    #[error("tree inconsistency: {reason}")]
    TreeInconsistency { reason: String },
}

impl CoreError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        CoreError::InvalidRequest {
            reason: reason.into(),
        }
    }
}
