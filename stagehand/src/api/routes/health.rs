//! Health check routes.

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::get};

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::HealthResponse;
use crate::api::server::AppState;

/// Bucket and object the health check looks up.
const HEALTH_BUCKET: &str = "stagehand-health";
const HEALTH_PATH: &str = "__health";

/// Create the health router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/live", get(liveness_check))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        store: state.dispatcher.store().name().to_string(),
        relay: state.relay_stats.as_ref().map(|stats| stats.snapshot()),
    })
}

/// Ready once the store answers an existence query.
async fn readiness_check(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    state
        .dispatcher
        .store()
        .exists(HEALTH_BUCKET, HEALTH_PATH)
        .await
        .map_err(|e| ApiError::service_unavailable(format!("store unavailable: {e}")))?;
    Ok((StatusCode::OK, "ready"))
}

async fn liveness_check(State(state): State<AppState>) -> impl IntoResponse {
    let uptime = state.start_time.elapsed().as_secs();
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "alive",
            "uptime_secs": uptime
        })),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::RelayStatsSnapshot;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy".to_string(),
            version: "0.1.0".to_string(),
            uptime_secs: 3600,
            store: "memory".to_string(),
            relay: Some(RelayStatsSnapshot::default()),
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains(r#""store":"memory""#));
        assert!(json.contains(r#""failed":0"#));
    }
}
