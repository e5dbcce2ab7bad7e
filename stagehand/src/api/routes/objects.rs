//! Direct object access for local runs.
//!
//! Uploading through this route writes to the pipeline's own store, so with
//! local notifications on the write triggers the pipeline exactly like a
//! platform upload would.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    routing::put,
};
use serde_json::json;
use stage_naming::ObjectPath;
use tracing::info;

use crate::api::error::ApiResult;
use crate::api::server::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/{bucket}/{*path}", put(upload_object).get(download_object))
}

async fn upload_object(
    State(state): State<AppState>,
    Path((bucket, path)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<serde_json::Value>)> {
    let size = body.len();
    state.dispatcher.store().put(&bucket, &path, body).await?;

    let parsed = ObjectPath::parse(path.as_str());
    info!(bucket = %bucket, path = %path, size, stage = %parsed.stage(), "Object uploaded");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "bucket": bucket,
            "path": path,
            "size_bytes": size,
            "stage": parsed.stage(),
        })),
    ))
}

async fn download_object(
    State(state): State<AppState>,
    Path((bucket, path)): Path<(String, String)>,
) -> ApiResult<Bytes> {
    Ok(state.dispatcher.store().get(&bucket, &path).await?)
}
