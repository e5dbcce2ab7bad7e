//! Audio/video join barrier.
//!
//! Each completion marker's notification checks once whether its sibling has
//! landed and exits. Whichever check sees both markers writes the `__finalise`
//! trigger. Both checks may see both markers when the tracks finish together;
//! promotion is therefore at-least-once and relies on
//! [`FinaliseExtraction`](crate::pipeline::handlers::FinaliseExtraction)
//! being idempotent.

use std::sync::Arc;

use async_trait::async_trait;
use stage_naming::Marker;
use tracing::{debug, info};

use crate::Result;
use crate::pipeline::context::JobContext;
use crate::pipeline::handlers::{StageHandler, StageOutcome, write_object};
use crate::pipeline::payloads::{FinaliseRequest, encode};
use crate::store::ObjectStore;

/// Which completion markers of one job are present in the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SiblingMarkers {
    pub audio_done: bool,
    pub video_done: bool,
}

impl SiblingMarkers {
    /// Markers still missing, in a stable order.
    pub fn missing(&self) -> Vec<Marker> {
        let mut missing = Vec::new();
        if !self.audio_done {
            missing.push(Marker::AudioDone);
        }
        if !self.video_done {
            missing.push(Marker::VideoDone);
        }
        missing
    }
}

/// Whether the job may move on to finalisation.
pub fn should_promote(siblings: SiblingMarkers) -> bool {
    siblings.audio_done && siblings.video_done
}

/// Handler for both completion-marker stages.
pub struct CheckFinaliseExtraction {
    store: Arc<dyn ObjectStore>,
}

impl CheckFinaliseExtraction {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    async fn observe(&self, ctx: &JobContext) -> Result<SiblingMarkers> {
        let bucket = ctx.bucket();
        Ok(SiblingMarkers {
            audio_done: self.store.exists(bucket, &ctx.path(Marker::AudioDone)).await?,
            video_done: self.store.exists(bucket, &ctx.path(Marker::VideoDone)).await?,
        })
    }
}

#[async_trait]
impl StageHandler for CheckFinaliseExtraction {
    fn name(&self) -> &'static str {
        "CheckFinaliseExtraction"
    }

    async fn run(&self, ctx: &JobContext) -> Result<StageOutcome> {
        let siblings = self.observe(ctx).await?;

        if !should_promote(siblings) {
            let missing: Vec<String> = siblings
                .missing()
                .into_iter()
                .map(|marker| ctx.path(marker))
                .collect();
            debug!(
                job = %ctx.base_identifier(),
                trigger = %ctx.trigger_path(),
                ?missing,
                "Sibling not landed yet"
            );
            return Ok(StageOutcome::Waiting { missing });
        }

        let trigger_path = ctx.path(Marker::Finalise);
        if self.store.exists(ctx.bucket(), &trigger_path).await? {
            return Ok(StageOutcome::skipped("finalisation already triggered"));
        }

        let request = encode(&FinaliseRequest {
            job: ctx.base_identifier().to_string(),
            audio: ctx.path(Marker::AudioOutput),
            video: ctx.path(Marker::VideoOutput),
        })?;

        let mut written = Vec::with_capacity(1);
        write_object(self.store.as_ref(), ctx, trigger_path, request, &mut written).await?;

        info!(
            job = %ctx.base_identifier(),
            trigger = %ctx.trigger_path(),
            "Both tracks extracted, promoting to finalisation"
        );
        Ok(StageOutcome::completed(written))
    }
}
