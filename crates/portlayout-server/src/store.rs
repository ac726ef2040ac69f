//! The injected storage backend, shared between request threads.
//!
//! Backends hold a `rusqlite::Connection`, which is `Send` but not `Sync`,
//! so the store lives behind a `std::sync::Mutex`. The guard is held for
//! one closure at a time; callers never hold it across a whole action.

use std::sync::Mutex;

use portlayout_storage::PortalStore;

use crate::error::ApiError;

pub struct SharedStore {
    inner: Mutex<Box<dyn PortalStore>>,
}

impl SharedStore {
    pub fn new(store: Box<dyn PortalStore>) -> Self {
        SharedStore {
            inner: Mutex::new(store),
        }
    }

    /// Runs `f` with exclusive access to the backend.
    pub fn call<R>(
        &self,
        f: impl FnOnce(&mut dyn PortalStore) -> Result<R, ApiError>,
    ) -> Result<R, ApiError> {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| ApiError::InternalError("store lock poisoned".to_string()))?;
        f(&mut **guard)
    }
}
