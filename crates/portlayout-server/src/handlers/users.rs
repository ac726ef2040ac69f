//! User registration handler.

use axum::extract::State;
use axum::Json;

use crate::error::ApiError;
use crate::schema::users::{RegisterUserRequest, RegisterUserResponse};
use crate::state::AppState;

use super::run_blocking;

/// Registers a user with the default layout.
///
/// `POST /users`
pub async fn register_user(
    State(state): State<AppState>,
    Json(req): Json<RegisterUserRequest>,
) -> Result<Json<RegisterUserResponse>, ApiError> {
    let response = run_blocking(&state, move |service| service.register_user(&req.user_name)).await?;
    Ok(Json(response))
}
