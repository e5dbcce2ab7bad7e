//! HTTP surface tests driven through the router without a listener.

use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use bytes::Bytes;
use serde_json::{Value, json};
use stagehand::api::{ApiServer, ApiServerConfig, AppState};
use stagehand::media::PassthroughEngine;
use stagehand::pipeline::EventDispatcher;
use stagehand::store::{MemoryStore, ObjectStore};
use tokio_util::sync::CancellationToken;
use rstest::rstest;
use tower::ServiceExt;

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
}

fn setup() -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let dispatcher = EventDispatcher::new(store.clone(), Arc::new(PassthroughEngine::new(4.0)));
    let server = ApiServer::new(
        ApiServerConfig::default(),
        AppState::new(Arc::new(dispatcher)),
        CancellationToken::new(),
    );
    TestApp {
        router: server.build_router(),
        store,
    }
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Bytes) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, body)
}

async fn send_json(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn cloud_event(bucket: &str, name: &str) -> Value {
    json!({ "data": { "bucket": bucket, "name": name } })
}

mod trigger {
    use super::*;

    #[tokio::test]
    async fn test_upload_event_is_processed() {
        let app = setup();
        app.store
            .put("media", "job123.mp4", Bytes::from_static(b"0123456789"))
            .await
            .unwrap();

        let (status, body) =
            send_json(&app, post_json("/trigger-event", cloud_event("media", "job123.mp4"))).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "processed");
        assert_eq!(body["stage"], "extractor_initial");
        assert_eq!(body["base_identifier"], "job123");
        assert!(app.store.exists("media", "job123__audio_req").await.unwrap());
        assert!(app.store.exists("media", "job123__video_req").await.unwrap());
    }

    #[tokio::test]
    async fn test_unrelated_object_is_ignored() {
        let app = setup();
        let (status, body) = send_json(
            &app,
            post_json("/trigger-event", cloud_event("media", "notes/readme.txt")),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ignored");
        assert_eq!(app.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_missing_object_name_is_rejected() {
        let app = setup();
        let (status, body) =
            send_json(&app, post_json("/trigger-event", json!({ "data": { "bucket": "media" } }))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "rejected");
        assert_eq!(app.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_event_is_rejected() {
        let app = setup();
        let (status, body) = send_json(&app, post_json("/trigger-event", json!({}))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "rejected");
    }

    fn raw_post(uri: &str, content_type: Option<&str>, body: &'static str) -> Request<Body> {
        let mut builder = Request::builder().method("POST").uri(uri);
        if let Some(content_type) = content_type {
            builder = builder.header("content-type", content_type);
        }
        builder.body(Body::from(body)).unwrap()
    }

    #[rstest]
    #[case::cloud_event_not_json("/trigger-event", Some("application/json"), "{not json")]
    #[case::cloud_event_wrong_type("/trigger-event", Some("application/json"), r#"{"data":"x"}"#)]
    #[case::cloud_event_no_content_type("/trigger-event", None, r#"{"data":{}}"#)]
    #[case::flat_not_json("/api/notifications", Some("application/json"), "bucket=media")]
    #[case::flat_wrong_type("/api/notifications", Some("application/json"), r#"{"bucket":7,"path":"a"}"#)]
    #[tokio::test]
    async fn test_unreadable_body_is_rejected(
        #[case] uri: &str,
        #[case] content_type: Option<&str>,
        #[case] body: &'static str,
    ) {
        let app = setup();
        let (status, body) = send_json(&app, raw_post(uri, content_type, body)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], "rejected");
        assert!(!body["detail"].as_str().unwrap().is_empty());
        assert_eq!(app.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_handler_failure_is_reported() {
        let app = setup();
        // the upload was never written
        let (status, body) =
            send_json(&app, post_json("/trigger-event", cloud_event("media", "ghost.mp4"))).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["status"], "failed");
        assert_eq!(body["stage"], "extractor_initial");
        assert_eq!(body["base_identifier"], "ghost");
        assert_eq!(app.store.write_count(), 0);
    }

    #[tokio::test]
    async fn test_flat_notification_body() {
        let app = setup();
        let (status, body) = send_json(
            &app,
            post_json(
                "/api/notifications",
                json!({ "bucket": "media", "path": "job__audio_done" }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "waiting");
        assert_eq!(body["stage"], "extractor_finalise_audio");
    }
}

mod objects {
    use super::*;

    #[tokio::test]
    async fn test_upload_then_download() {
        let app = setup();
        let request = Request::builder()
            .method("PUT")
            .uri("/api/objects/media/uploads/clip.mp4")
            .body(Body::from("clip-bytes"))
            .unwrap();

        let (status, body) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["path"], "uploads/clip.mp4");
        assert_eq!(body["size_bytes"], 10);
        assert_eq!(body["stage"], "extractor_initial");

        let (status, bytes) = send(&app, get("/api/objects/media/uploads/clip.mp4")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, Bytes::from_static(b"clip-bytes"));
    }

    #[tokio::test]
    async fn test_download_missing_object() {
        let app = setup();
        let (status, _) = send(&app, get("/api/objects/media/nothing.mp4")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

mod stages {
    use super::*;

    #[tokio::test]
    async fn test_preview_classifies_path() {
        let app = setup();
        let (status, body) = send_json(&app, get("/api/stages?path=job__split_3")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stage"], "extractor_split_segment");
        assert_eq!(body["base_identifier"], "job");
        assert!(body.get("objects").is_none());
    }

    #[tokio::test]
    async fn test_preview_lists_job_objects() {
        let app = setup();
        for path in ["job", "job__audio_req", "job2__audio_req"] {
            app.store
                .put("media", path, Bytes::from_static(b"x"))
                .await
                .unwrap();
        }

        let (status, body) =
            send_json(&app, get("/api/stages?path=job__video_req&bucket=media")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["objects"], json!(["job", "job__audio_req"]));
    }

    #[tokio::test]
    async fn test_preview_requires_path() {
        let app = setup();
        let (status, _) = send(&app, get("/api/stages?path=")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

mod health {
    use super::*;

    #[tokio::test]
    async fn test_root_banner_is_json() {
        let app = setup();
        let (status, body) = send_json(&app, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "stagehand media pipeline");
    }

    #[tokio::test]
    async fn test_health_reports_store() {
        let app = setup();
        let (status, body) = send_json(&app, get("/health")).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["store"], "memory");
    }

    #[tokio::test]
    async fn test_readiness_and_liveness() {
        let app = setup();
        let (status, _) = send(&app, get("/health/ready")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send_json(&app, get("/health/live")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "alive");
    }

    #[tokio::test]
    async fn test_logging_unavailable_without_config() {
        let app = setup();
        let (status, _) = send(&app, get("/api/logging")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
