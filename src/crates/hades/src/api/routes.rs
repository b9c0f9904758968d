//! API route definitions

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::handlers;
use crate::engine::RollbackEngine;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<RollbackEngine>,
}

/// Build the complete API router
pub fn create_router(engine: Arc<RollbackEngine>) -> Router {
    let app_state = AppState { engine };

    Router::new()
        .route("/api/health", get(handlers::health))
        // Operation lifecycle
        .route("/api/track", post(handlers::track))
        .route("/api/complete", post(handlers::complete))
        .route("/api/rollback", post(handlers::rollback))
        // Operation log
        .route("/api/operations", get(handlers::list_operations))
        .route("/api/operations/:id", get(handlers::get_operation))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}
