//! Storage abstraction for portal layouts.
//!
//! Provides the storage traits the layout service depends on
//! ([`LayoutStore`], [`SubscriptionStore`], [`IdentityResolver`],
//! [`ContentRegistry`], bundled as [`PortalStore`]) plus the
//! [`InMemoryStore`] and [`SqliteStore`] backends.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`types`]: ProfileId, LayoutKey, subscription and content records
//! - [`traits`]: the storage contracts
//! - [`convert`]: LayoutTree decompose/recompose, including fragment merge
//! - [`hash`]: blake3 layout hash
//! - [`memory`]: InMemoryStore implementation
//! - [`schema`]: migrations and connection setup
//! - [`sqlite`]: SqliteStore implementation

pub mod convert;
pub mod error;
pub mod hash;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod types;

// Re-export key types for ergonomic use.
pub use error::StorageError;
pub use hash::{hash_layout, layout_hash_hex};
pub use memory::{InMemoryStore, WriteFailureSwitch};
pub use sqlite::SqliteStore;
pub use traits::{ContentRegistry, IdentityResolver, LayoutStore, PortalStore, SubscriptionStore};
pub use types::{ContentDescriptor, FragmentSubscription, LayoutKey, ProfileId, DEFAULT_PROFILE};
