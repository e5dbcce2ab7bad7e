//! Classification preview.
//!
//! Shows which stage an object name would trigger without dispatching it, and
//! optionally which objects the job already has in a bucket.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use stage_naming::ObjectPath;

use crate::api::error::{ApiError, ApiResult};
use crate::api::models::{StageQuery, StageResponse};
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(preview_stage))
}

async fn preview_stage(
    State(state): State<AppState>,
    Query(query): Query<StageQuery>,
) -> ApiResult<Json<StageResponse>> {
    if query.path.is_empty() {
        return Err(ApiError::bad_request("path is required"));
    }

    let path = ObjectPath::parse(query.path.clone());

    let objects = match query.bucket.as_deref().filter(|b| !b.is_empty()) {
        Some(bucket) if !path.base_identifier().is_empty() => {
            let listed = state
                .dispatcher
                .store()
                .list(bucket, path.base_identifier())
                .await?;
            // the prefix also matches longer job names
            Some(
                listed
                    .into_iter()
                    .filter(|p| ObjectPath::parse(p.as_str()).base_identifier() == path.base_identifier())
                    .collect(),
            )
        }
        _ => None,
    };

    Ok(Json(StageResponse {
        stage: path.stage(),
        base_identifier: path.base_identifier().to_string(),
        marker: path.marker().map(|m| m.to_string()),
        objects,
        path: query.path,
    }))
}
