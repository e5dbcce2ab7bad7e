//! API route modules.

pub mod health;
pub mod logging;
pub mod objects;
pub mod stages;
pub mod trigger;

use axum::{Json, Router, routing::get};
use serde_json::{Value, json};

use crate::api::server::AppState;

/// Create the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(root))
        .merge(trigger::router())
        .nest("/api/logging", logging::router())
        .nest("/api/objects", objects::router())
        .nest("/api/stages", stages::router())
        .nest("/health", health::router())
        .with_state(state)
}

async fn root() -> Json<Value> {
    Json(json!({ "message": "stagehand media pipeline" }))
}
