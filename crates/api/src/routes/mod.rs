//! API routes

pub mod health;
pub mod webhooks;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Deliveries are accepted on `/`; other methods there get a bare 405
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(webhooks::deliver))
        .route("/health", get(health::health))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
