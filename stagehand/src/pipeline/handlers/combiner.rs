//! Combiner stage handlers: render spec to final rendered video.

use std::sync::Arc;

use async_trait::async_trait;
use stage_naming::Marker;
use tracing::info;

use super::traits::{StageHandler, StageOutcome, ensure_same_job, write_object};
use crate::media::MediaEngine;
use crate::pipeline::context::JobContext;
use crate::pipeline::payloads::{
    CompletionMarker, ExtractionManifest, RenderPlan, RenderSpec, decode, encode,
};
use crate::store::ObjectStore;
use crate::{Error, Result};

/// Resolves an uploaded render spec against the extraction manifest.
pub struct CombinerInitialRender {
    store: Arc<dyn ObjectStore>,
}

impl CombinerInitialRender {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StageHandler for CombinerInitialRender {
    fn name(&self) -> &'static str {
        "CombinerInitialRender"
    }

    async fn run(&self, ctx: &JobContext) -> Result<StageOutcome> {
        let bucket = ctx.bucket();
        let plan_path = ctx.path(Marker::RenderRequest);

        if self.store.exists(bucket, &plan_path).await? {
            return Ok(StageOutcome::skipped("render already requested"));
        }

        let spec: RenderSpec = decode(
            ctx.trigger_path(),
            &self.store.get(bucket, ctx.trigger_path()).await?,
        )?;
        if spec.segments.is_empty() {
            return Err(Error::malformed(format!(
                "'{}' selects no segments",
                ctx.trigger_path()
            )));
        }

        // Rendering before extraction has finished is a failure, so the
        // delivery layer retries it once the manifest lands.
        let manifest_path = ctx.path(Marker::Extracted);
        let manifest: ExtractionManifest = decode(
            &manifest_path,
            &self.store.get(bucket, &manifest_path).await?,
        )?;

        if let Some(unknown) = spec
            .segments
            .iter()
            .find(|index| !manifest.segments.iter().any(|span| span.index == **index))
        {
            return Err(Error::malformed(format!(
                "'{}' selects segment {} but '{}' has {} segments",
                ctx.trigger_path(),
                unknown,
                manifest_path,
                manifest.segments.len()
            )));
        }

        // Splits land one notification at a time, so a listed segment may not
        // be cut yet. Failing here gets the spec redelivered later.
        let segments: Vec<String> = spec
            .segments
            .iter()
            .map(|index| ctx.path(Marker::Segment(*index)))
            .collect();
        for path in &segments {
            if !self.store.exists(bucket, path).await? {
                return Err(Error::not_found(bucket, path));
            }
        }

        let plan = encode(&RenderPlan {
            job: ctx.base_identifier().to_string(),
            segments,
        })?;

        let mut written = Vec::with_capacity(1);
        write_object(self.store.as_ref(), ctx, plan_path, plan, &mut written).await?;

        info!(
            job = %ctx.base_identifier(),
            segments = spec.segments.len(),
            "Render requested"
        );
        Ok(StageOutcome::completed(written))
    }
}

/// Joins the planned segments into one video.
pub struct CombinerRender {
    store: Arc<dyn ObjectStore>,
    engine: Arc<dyn MediaEngine>,
}

impl CombinerRender {
    pub fn new(store: Arc<dyn ObjectStore>, engine: Arc<dyn MediaEngine>) -> Self {
        Self { store, engine }
    }
}

#[async_trait]
impl StageHandler for CombinerRender {
    fn name(&self) -> &'static str {
        "CombinerRender"
    }

    async fn run(&self, ctx: &JobContext) -> Result<StageOutcome> {
        let bucket = ctx.bucket();
        let done_path = ctx.path(Marker::RenderDone);

        if self.store.exists(bucket, &done_path).await? {
            return Ok(StageOutcome::skipped("render already done"));
        }

        let plan: RenderPlan = decode(
            ctx.trigger_path(),
            &self.store.get(bucket, ctx.trigger_path()).await?,
        )?;
        ensure_same_job(ctx, &plan.job)?;

        let mut segments = Vec::with_capacity(plan.segments.len());
        for path in &plan.segments {
            segments.push(self.store.get(bucket, path).await?);
        }

        let rendered = self.engine.render(segments).await?;
        if rendered.is_empty() {
            return Err(Error::media(format!(
                "render of '{}' produced no data",
                ctx.base_identifier()
            )));
        }

        let output_path = ctx.path(Marker::RenderOutput);
        let marker = encode(&CompletionMarker {
            job: plan.job,
            output: output_path.clone(),
            size_bytes: rendered.len() as u64,
        })?;

        let mut written = Vec::with_capacity(2);
        write_object(self.store.as_ref(), ctx, output_path, rendered, &mut written).await?;
        write_object(self.store.as_ref(), ctx, done_path, marker, &mut written).await?;

        info!(
            job = %ctx.base_identifier(),
            segments = plan.segments.len(),
            engine = %self.engine.name(),
            "Render complete"
        );
        Ok(StageOutcome::completed(written))
    }
}

/// Produces the terminal rendered object. Nothing it writes re-enters the
/// pipeline.
pub struct CombinerFinaliseRender {
    store: Arc<dyn ObjectStore>,
    engine: Arc<dyn MediaEngine>,
}

impl CombinerFinaliseRender {
    pub fn new(store: Arc<dyn ObjectStore>, engine: Arc<dyn MediaEngine>) -> Self {
        Self { store, engine }
    }
}

#[async_trait]
impl StageHandler for CombinerFinaliseRender {
    fn name(&self) -> &'static str {
        "CombinerFinaliseRender"
    }

    async fn run(&self, ctx: &JobContext) -> Result<StageOutcome> {
        let bucket = ctx.bucket();
        let final_path = ctx.path(Marker::Rendered);

        if self.store.exists(bucket, &final_path).await? {
            return Ok(StageOutcome::skipped("render already finalised"));
        }

        let marker: CompletionMarker = decode(
            ctx.trigger_path(),
            &self.store.get(bucket, ctx.trigger_path()).await?,
        )?;
        ensure_same_job(ctx, &marker.job)?;
        let rendered = self.store.get(bucket, &marker.output).await?;
        let output = self.engine.finalise_render(rendered).await?;

        let mut written = Vec::with_capacity(1);
        write_object(self.store.as_ref(), ctx, final_path.clone(), output, &mut written).await?;

        info!(job = %ctx.base_identifier(), output = %final_path, "Rendered output ready");
        Ok(StageOutcome::completed(written))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{MockMediaEngine, PassthroughEngine, SegmentSpan};
    use crate::store::MemoryStore;
    use bytes::Bytes;
    use stage_naming::ObjectPath;

    const BUCKET: &str = "media";

    fn ctx(path: &str) -> JobContext {
        JobContext::new(BUCKET, ObjectPath::parse(path))
    }

    fn passthrough() -> Arc<dyn MediaEngine> {
        Arc::new(PassthroughEngine::default())
    }

    fn span(index: u32) -> SegmentSpan {
        SegmentSpan {
            index,
            start_secs: f64::from(index) * 2.0,
            end_secs: f64::from(index + 1) * 2.0,
        }
    }

    async fn split_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        let manifest = ExtractionManifest {
            job: "job".into(),
            audio: "job__audio.wav".into(),
            video: "job__video.mp4".into(),
            segments: vec![span(0), span(1), span(2)],
        };
        store
            .put(BUCKET, "job__extracted.json", encode(&manifest).unwrap())
            .await
            .unwrap();
        for (index, body) in [(0, "ab"), (1, "cd"), (2, "ef")] {
            store
                .put(
                    BUCKET,
                    &format!("job__segment_{index}.mp4"),
                    Bytes::from_static(body.as_bytes()),
                )
                .await
                .unwrap();
        }
        store
    }

    async fn upload_spec(store: &MemoryStore, body: &'static str) {
        store
            .put(BUCKET, "job__render_spec.json", Bytes::from_static(body.as_bytes()))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_initial_render_resolves_segments() {
        let store = split_store().await;
        upload_spec(&store, r#"{"segments": [2, 0]}"#).await;

        let outcome = CombinerInitialRender::new(store.clone())
            .run(&ctx("job__render_spec.json"))
            .await
            .unwrap();
        assert_eq!(outcome.written(), ["job__render_req".to_string()]);

        let plan: RenderPlan =
            decode("p", &store.get(BUCKET, "job__render_req").await.unwrap()).unwrap();
        assert_eq!(plan.segments, ["job__segment_2.mp4", "job__segment_0.mp4"]);
    }

    #[tokio::test]
    async fn test_initial_render_rejects_unknown_segment() {
        let store = split_store().await;
        upload_spec(&store, r#"{"segments": [0, 9]}"#).await;

        let err = CombinerInitialRender::new(store.clone())
            .run(&ctx("job__render_spec.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedInput(msg) if msg.contains("segment 9")));
        assert!(!store.exists(BUCKET, "job__render_req").await.unwrap());
    }

    #[tokio::test]
    async fn test_initial_render_waits_for_uncut_segment() {
        let store = Arc::new(MemoryStore::new());
        let manifest = ExtractionManifest {
            job: "job".into(),
            audio: "job__audio.wav".into(),
            video: "job__video.mp4".into(),
            segments: vec![span(0), span(1)],
        };
        store
            .put(BUCKET, "job__extracted.json", encode(&manifest).unwrap())
            .await
            .unwrap();
        store
            .put(BUCKET, "job__segment_0.mp4", Bytes::from_static(b"ab"))
            .await
            .unwrap();
        upload_spec(&store, r#"{"segments": [0, 1]}"#).await;
        let handler = CombinerInitialRender::new(store.clone());

        let err = handler.run(&ctx("job__render_spec.json")).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(err.to_string().contains("job__segment_1.mp4"));
        assert!(!store.exists(BUCKET, "job__render_req").await.unwrap());

        store
            .put(BUCKET, "job__segment_1.mp4", Bytes::from_static(b"cd"))
            .await
            .unwrap();
        let outcome = handler.run(&ctx("job__render_spec.json")).await.unwrap();
        assert_eq!(outcome.written(), ["job__render_req".to_string()]);
    }

    #[tokio::test]
    async fn test_initial_render_rejects_empty_spec() {
        let store = split_store().await;
        upload_spec(&store, r#"{"segments": []}"#).await;

        let err = CombinerInitialRender::new(store)
            .run(&ctx("job__render_spec.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)));
    }

    #[tokio::test]
    async fn test_initial_render_before_extraction_fails() {
        let store = Arc::new(MemoryStore::new());
        upload_spec(&store, r#"{"segments": [0]}"#).await;

        let err = CombinerInitialRender::new(store)
            .run(&ctx("job__render_spec.json"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_render_chain_to_terminal_output() {
        let store = split_store().await;
        upload_spec(&store, r#"{"segments": [1, 2, 0]}"#).await;

        CombinerInitialRender::new(store.clone())
            .run(&ctx("job__render_spec.json"))
            .await
            .unwrap();
        let rendered = CombinerRender::new(store.clone(), passthrough())
            .run(&ctx("job__render_req"))
            .await
            .unwrap();
        assert_eq!(
            rendered.written(),
            ["job__render.mp4".to_string(), "job__render_done".to_string()]
        );

        let finalised = CombinerFinaliseRender::new(store.clone(), passthrough())
            .run(&ctx("job__render_done"))
            .await
            .unwrap();
        assert_eq!(finalised.written(), ["job__rendered.mp4".to_string()]);
        assert_eq!(
            store.get(BUCKET, "job__rendered.mp4").await.unwrap(),
            Bytes::from_static(b"cdefab")
        );

        let again = CombinerFinaliseRender::new(store.clone(), passthrough())
            .run(&ctx("job__render_done"))
            .await
            .unwrap();
        assert!(matches!(again, StageOutcome::Skipped { .. }));
    }

    #[tokio::test]
    async fn test_render_failure_leaves_no_commit() {
        let store = split_store().await;
        upload_spec(&store, r#"{"segments": [0]}"#).await;
        CombinerInitialRender::new(store.clone())
            .run(&ctx("job__render_spec.json"))
            .await
            .unwrap();

        let mut engine = MockMediaEngine::new();
        engine
            .expect_render()
            .times(1)
            .returning(|_| Err(Error::media("encoder crashed")));

        let err = CombinerRender::new(store.clone(), Arc::new(engine))
            .run(&ctx("job__render_req"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Media(_)));
        assert!(!store.exists(BUCKET, "job__render_done").await.unwrap());
        assert!(!store.exists(BUCKET, "job__render.mp4").await.unwrap());
    }

    #[tokio::test]
    async fn test_render_rejects_foreign_plan() {
        let store = split_store().await;
        let plan = RenderPlan {
            job: "other".into(),
            segments: vec!["other__segment_0.mp4".into()],
        };
        store
            .put(BUCKET, "job__render_req", encode(&plan).unwrap())
            .await
            .unwrap();
        let writes = store.write_count();

        let err = CombinerRender::new(store.clone(), passthrough())
            .run(&ctx("job__render_req"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedInput(msg) if msg.contains("'other'")));
        assert_eq!(store.write_count(), writes);
    }

    #[tokio::test]
    async fn test_finalise_rejects_foreign_marker() {
        let store = Arc::new(MemoryStore::new());
        store
            .put(BUCKET, "other__render.mp4", Bytes::from_static(b"theirs"))
            .await
            .unwrap();
        let marker = CompletionMarker {
            job: "other".into(),
            output: "other__render.mp4".into(),
            size_bytes: 6,
        };
        store
            .put(BUCKET, "job__render_done", encode(&marker).unwrap())
            .await
            .unwrap();
        let writes = store.write_count();

        let err = CombinerFinaliseRender::new(store.clone(), passthrough())
            .run(&ctx("job__render_done"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedInput(_)));
        assert_eq!(store.write_count(), writes);
        assert!(!store.exists(BUCKET, "job__rendered.mp4").await.unwrap());
    }

    #[tokio::test]
    async fn test_render_missing_segment_fails() {
        let store = Arc::new(MemoryStore::new());
        let plan = RenderPlan {
            job: "job".into(),
            segments: vec!["job__segment_0.mp4".into()],
        };
        store
            .put(BUCKET, "job__render_req", encode(&plan).unwrap())
            .await
            .unwrap();

        let err = CombinerRender::new(store, passthrough())
            .run(&ctx("job__render_req"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
