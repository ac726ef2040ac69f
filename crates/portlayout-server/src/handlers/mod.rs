//! HTTP handler functions for all API endpoints.
//!
//! Each handler extracts its inputs, runs the matching [`LayoutService`]
//! method on the blocking thread pool and wraps the result in JSON.
//!
//! [`LayoutService`]: crate::service::LayoutService

pub mod layout;
pub mod users;

use std::sync::Arc;

use axum::http::HeaderMap;

use crate::error::ApiError;
use crate::service::{is_guest, LayoutService};
use crate::state::AppState;

/// Header naming the acting portal user.
pub const PORTAL_USER_HEADER: &str = "X-Portal-User";

/// Extracts the acting user from the `X-Portal-User` header.
///
/// Returns `ApiError::Unauthorized` if the header is missing, blank or
/// names the guest user.
pub fn extract_portal_user(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(PORTAL_USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|name| !name.is_empty() && !is_guest(name))
        .map(str::to_string)
        .ok_or_else(|| ApiError::Unauthorized(format!("{PORTAL_USER_HEADER} header required")))
}

/// Runs a blocking service call off the async runtime.
pub(crate) async fn run_blocking<R, F>(state: &AppState, f: F) -> Result<R, ApiError>
where
    R: Send + 'static,
    F: FnOnce(&LayoutService) -> Result<R, ApiError> + Send + 'static,
{
    let service = Arc::clone(&state.service);
    tokio::task::spawn_blocking(move || f(&*service))
        .await
        .map_err(|e| ApiError::InternalError(format!("layout task failed: {e}")))?
}
