//! Router assembly for the layout HTTP API.
//!
//! [`build_router`] wires all handler functions to their routes with
//! CORS and tracing middleware layers.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

/// Builds the complete axum router with all API routes.
///
/// Routes use axum 0.8 `/{param}` path syntax.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/users", post(handlers::users::register_user))
        .route(
            "/profiles/{profile}/layout",
            get(handlers::layout::get_layout),
        )
        .route(
            "/profiles/{profile}/layout/actions",
            post(handlers::layout::apply_action),
        )
        .route(
            "/profiles/{profile}/subscriptions",
            get(handlers::layout::list_subscriptions),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
