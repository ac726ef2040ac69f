//! Serialization of structural edits.
//!
//! - [`lock_manager::LayoutLockManager`] hands out one exclusive lock per
//!   `(user, profile)` layout.

pub mod lock_manager;

pub use lock_manager::{LayoutGuard, LayoutLockManager};
