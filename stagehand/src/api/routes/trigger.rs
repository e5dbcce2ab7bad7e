//! Notification ingress.
//!
//! Every successful write in the bucket is expected to arrive here once or
//! more. A 500 asks the delivery layer to retry; everything else, including
//! objects outside the pipeline, is acknowledged.

use axum::{
    Json, Router,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
    routing::post,
};
use tracing::warn;

use crate::api::models::{CloudEventPayload, NotificationRequest, TriggerResponse};
use crate::api::server::AppState;
use crate::error::Error;
use crate::notification::ObjectNotification;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trigger-event", post(trigger_event))
        .route("/api/notifications", post(receive_notification))
}

/// Cloud Events style object-finalized event.
async fn trigger_event(
    State(state): State<AppState>,
    payload: Result<Json<CloudEventPayload>, JsonRejection>,
) -> (StatusCode, Json<TriggerResponse>) {
    let event = match payload {
        Ok(Json(event)) => event,
        Err(rejection) => return reject_body(rejection),
    };
    let data = event.data.unwrap_or_default();
    handle(&state, data.bucket, data.name).await
}

/// Flat `{bucket, path}` notification.
async fn receive_notification(
    State(state): State<AppState>,
    payload: Result<Json<NotificationRequest>, JsonRejection>,
) -> (StatusCode, Json<TriggerResponse>) {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => return reject_body(rejection),
    };
    handle(&state, request.bucket, request.path).await
}

/// Unreadable bodies get the same answer as notifications missing a field.
fn reject_body(rejection: JsonRejection) -> (StatusCode, Json<TriggerResponse>) {
    let detail = rejection.body_text();
    warn!(status = %rejection.status(), error = %detail, "Rejecting notification body");
    (
        StatusCode::BAD_REQUEST,
        Json(TriggerResponse::rejected(detail)),
    )
}

async fn handle(
    state: &AppState,
    bucket: Option<String>,
    path: Option<String>,
) -> (StatusCode, Json<TriggerResponse>) {
    let notification =
        match ObjectNotification::new(bucket.unwrap_or_default(), path.unwrap_or_default()) {
            Ok(notification) => notification,
            Err(e) => {
                warn!(error = %e, "Rejecting notification");
                return (
                    StatusCode::BAD_REQUEST,
                    Json(TriggerResponse::rejected(e.to_string())),
                );
            }
        };

    match state.dispatcher.dispatch(&notification).await {
        Ok(outcome) => (StatusCode::OK, Json(TriggerResponse::from_outcome(&outcome))),
        Err(e) => {
            let (stage, base_identifier) = match &e {
                Error::Stage {
                    stage,
                    base_identifier,
                    ..
                } => (Some(*stage), Some(base_identifier.clone())),
                _ => (None, None),
            };
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(TriggerResponse::failed(e.to_string(), stage, base_identifier)),
            )
        }
    }
}
