//! Storage error types for portlayout-storage.
//!
//! [`StorageError`] covers every failure mode of the store layer: the
//! database itself, serialization of JSON columns, lookups that found
//! nothing, integrity violations, and snapshots that cannot be turned back
//! into a valid tree.

use thiserror::Error;

use portlayout_core::{ContentId, CoreError, UserId};

use crate::types::LayoutKey;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The SQLite backend reported an error.
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Applying schema migrations failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// No user is registered under this name.
    #[error("user not found: {0}")]
    UserNotFound(String),

    /// No user has this numeric identity.
    #[error("user id not found: {0}")]
    UserIdNotFound(UserId),

    /// The user exists but has no layout for the profile.
    #[error("layout not found: {0}")]
    LayoutNotFound(LayoutKey),

    /// No subscription links these two users.
    #[error("subscription not found: subscriber={subscriber}, owner={owner}")]
    SubscriptionNotFound { subscriber: UserId, owner: UserId },

    /// No content definition has this id.
    #[error("content not found: {0}")]
    ContentNotFound(ContentId),

    /// A data integrity violation was detected (duplicates, dangling
    /// references).
    #[error("integrity error: {reason}")]
    IntegrityError { reason: String },

    /// A stored snapshot could not be rebuilt into a valid tree.
    #[error("reconstruction error: {0}")]
    Reconstruction(#[from] CoreError),

    /// The backend refused the write.
    #[error("write rejected: {reason}")]
    WriteRejected { reason: String },
}

impl StorageError {
    /// Whether this error means "the thing asked for does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::UserNotFound(_)
                | StorageError::UserIdNotFound(_)
                | StorageError::LayoutNotFound(_)
                | StorageError::SubscriptionNotFound { .. }
                | StorageError::ContentNotFound(_)
        )
    }
}
