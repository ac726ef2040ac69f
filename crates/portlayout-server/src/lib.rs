//! HTTP/JSON API server for per-user portal layouts.
//!
//! Hosts the [`service::LayoutService`] that applies layout actions under a
//! per-layout lock, the fragment subscription manager, and the axum
//! router, handlers and schema types in front of them.

pub mod concurrency;
pub mod config;
pub mod error;
pub mod fragments;
pub mod handlers;
pub mod router;
pub mod schema;
pub mod service;
pub mod state;
pub mod store;
