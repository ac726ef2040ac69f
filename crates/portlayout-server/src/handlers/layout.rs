//! Layout read and action handlers. All of them act for the user named by
//! the `X-Portal-User` header.

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;

use portlayout_storage::ProfileId;

use crate::error::ApiError;
use crate::schema::actions::{ActionRequest, ActionResponse};
use crate::schema::layout::{LayoutView, SubscriptionListResponse};
use crate::state::AppState;

use super::{extract_portal_user, run_blocking};

/// Returns the merged layout with its hash and preferences.
///
/// `GET /profiles/{profile}/layout`
pub async fn get_layout(
    State(state): State<AppState>,
    Path(profile): Path<u32>,
    headers: HeaderMap,
) -> Result<Json<LayoutView>, ApiError> {
    let user = extract_portal_user(&headers)?;
    let view = run_blocking(&state, move |service| {
        service.layout(&user, ProfileId(profile))
    })
    .await?;
    Ok(Json(view))
}

/// Applies one layout action.
///
/// `POST /profiles/{profile}/layout/actions`
pub async fn apply_action(
    State(state): State<AppState>,
    Path(profile): Path<u32>,
    headers: HeaderMap,
    Json(req): Json<ActionRequest>,
) -> Result<Json<ActionResponse>, ApiError> {
    let user = extract_portal_user(&headers)?;
    let response = run_blocking(&state, move |service| {
        service.apply(&user, ProfileId(profile), req)
    })
    .await?;
    Ok(Json(response))
}

/// Lists the acting user's fragment subscriptions.
///
/// `GET /profiles/{profile}/subscriptions`
pub async fn list_subscriptions(
    State(state): State<AppState>,
    Path(_profile): Path<u32>,
    headers: HeaderMap,
) -> Result<Json<SubscriptionListResponse>, ApiError> {
    let user = extract_portal_user(&headers)?;
    let list = run_blocking(&state, move |service| service.subscriptions(&user)).await?;
    Ok(Json(list))
}
