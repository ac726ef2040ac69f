//! Application state shared by all handlers.
//!
//! [`AppState`] holds the [`LayoutService`] behind an `Arc`. The service
//! does its own locking (a per-layout lock plus a short store guard), so
//! handlers share it without an outer mutex and run its blocking methods
//! on the blocking thread pool.

use std::sync::Arc;

use portlayout_storage::{InMemoryStore, PortalStore, SqliteStore};
use tracing::info;

use crate::config::ServerConfig;
use crate::error::ApiError;
use crate::service::LayoutService;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LayoutService>,
}

impl AppState {
    /// State backed by the SQLite database named in `config`.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ApiError> {
        let store = if config.is_in_memory() {
            SqliteStore::in_memory()?
        } else {
            SqliteStore::new(&config.db_path)?
        };
        info!(db_path = %config.db_path, "opened layout database");
        Ok(Self::with_store(Box::new(store)))
    }

    /// State backed by a fresh [`InMemoryStore`] (for testing).
    pub fn in_memory() -> Self {
        Self::with_store(Box::new(InMemoryStore::new()))
    }

    pub fn with_store(store: Box<dyn PortalStore>) -> Self {
        AppState {
            service: Arc::new(LayoutService::new(store)),
        }
    }
}
