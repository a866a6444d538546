//! HTTP status API for the relay watcher.

pub mod status;

use crate::state::StateRecorder;
use axum::{routing::get, Router};
use std::sync::Arc;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub recorder: Arc<StateRecorder>,
}

/// Create the API router with all endpoints
pub fn create_router(recorder: Arc<StateRecorder>) -> Router {
    Router::new()
        .route("/health", get(status::health))
        .route("/version", get(status::version))
        .route("/status", get(status::status))
        .route("/progress", get(status::progress))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(AppState { recorder })
}
