//! Event dispatcher.
//!
//! Classifies each notification and runs the matching stage handler. The
//! dispatcher holds no per-job state; duplicate and racing notifications are
//! absorbed by the handlers' own idempotence.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use stage_naming::PipelineStage;
use tracing::{debug, error, info};

use super::barrier::CheckFinaliseExtraction;
use super::context::JobContext;
use super::handlers::{
    CombinerFinaliseRender, CombinerInitialRender, CombinerRender, ExtractTrack,
    FinaliseExtraction, InitialExtract, SplitAvSegment, StageHandler, StageOutcome,
};
use crate::Result;
use crate::media::MediaEngine;
use crate::notification::ObjectNotification;
use crate::store::ObjectStore;

/// Coarse result of one dispatch, as reported to the delivery layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DispatchStatus {
    Processed,
    Waiting,
    Ignored,
    Failed,
    Rejected,
}

/// What dispatching one notification did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The path classified as `Unrecognized`; nothing ran.
    Ignored { path: String },
    /// A handler ran to completion.
    Handled {
        stage: PipelineStage,
        base_identifier: String,
        outcome: StageOutcome,
    },
}

impl DispatchOutcome {
    pub fn status(&self) -> DispatchStatus {
        match self {
            Self::Ignored { .. } => DispatchStatus::Ignored,
            Self::Handled {
                outcome: StageOutcome::Waiting { .. },
                ..
            } => DispatchStatus::Waiting,
            Self::Handled { .. } => DispatchStatus::Processed,
        }
    }

    /// Human-readable summary.
    pub fn detail(&self) -> String {
        match self {
            Self::Ignored { path } => format!("'{path}' is not a pipeline object"),
            Self::Handled { stage, outcome, .. } => match outcome {
                StageOutcome::Completed { written } => {
                    format!("{stage} wrote {}", written.join(", "))
                }
                StageOutcome::Skipped { reason } => format!("{stage} skipped: {reason}"),
                StageOutcome::Waiting { missing } => {
                    format!("{stage} waiting for {}", missing.join(", "))
                }
            },
        }
    }
}

/// Routes notifications to stage handlers.
pub struct EventDispatcher {
    store: Arc<dyn ObjectStore>,
    handlers: HashMap<PipelineStage, Arc<dyn StageHandler>>,
}

impl EventDispatcher {
    /// Build a dispatcher with the standard handler for every stage.
    pub fn new(store: Arc<dyn ObjectStore>, engine: Arc<dyn MediaEngine>) -> Self {
        let barrier: Arc<dyn StageHandler> = Arc::new(CheckFinaliseExtraction::new(store.clone()));

        let mut handlers: HashMap<PipelineStage, Arc<dyn StageHandler>> = HashMap::new();
        handlers.insert(
            PipelineStage::ExtractorInitial,
            Arc::new(InitialExtract::new(store.clone())),
        );
        handlers.insert(
            PipelineStage::ExtractorAudio,
            Arc::new(ExtractTrack::audio(store.clone(), engine.clone())),
        );
        handlers.insert(
            PipelineStage::ExtractorVideo,
            Arc::new(ExtractTrack::video(store.clone(), engine.clone())),
        );
        handlers.insert(PipelineStage::ExtractorFinaliseAudio, barrier.clone());
        handlers.insert(PipelineStage::ExtractorFinaliseVideo, barrier);
        handlers.insert(
            PipelineStage::ExtractorFinalise,
            Arc::new(FinaliseExtraction::new(store.clone(), engine.clone())),
        );
        handlers.insert(
            PipelineStage::ExtractorSplitSegment,
            Arc::new(SplitAvSegment::new(store.clone(), engine.clone())),
        );
        handlers.insert(
            PipelineStage::CombinerInitial,
            Arc::new(CombinerInitialRender::new(store.clone())),
        );
        handlers.insert(
            PipelineStage::CombinerRender,
            Arc::new(CombinerRender::new(store.clone(), engine.clone())),
        );
        handlers.insert(
            PipelineStage::CombinerFinalise,
            Arc::new(CombinerFinaliseRender::new(store.clone(), engine)),
        );

        Self { store, handlers }
    }

    /// Replace the handler for one stage.
    pub fn with_handler(mut self, stage: PipelineStage, handler: Arc<dyn StageHandler>) -> Self {
        self.handlers.insert(stage, handler);
        self
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Handler registered for `stage`, if any.
    pub fn handler_for(&self, stage: PipelineStage) -> Option<&Arc<dyn StageHandler>> {
        self.handlers.get(&stage)
    }

    /// Dispatch one notification.
    ///
    /// Unrecognized paths are acknowledged without touching the store. Handler
    /// failures come back wrapped with the stage and base identifier.
    pub async fn dispatch(&self, notification: &ObjectNotification) -> Result<DispatchOutcome> {
        let ctx = JobContext::from_notification(notification);
        let stage = ctx.stage();

        let Some(handler) = self.handlers.get(&stage) else {
            debug!(
                bucket = %notification.bucket,
                path = %notification.path,
                "Ignoring object outside the pipeline"
            );
            return Ok(DispatchOutcome::Ignored {
                path: notification.path.clone(),
            });
        };

        let started = Instant::now();
        info!(
            bucket = %ctx.bucket(),
            path = %ctx.trigger_path(),
            stage = %stage,
            base_identifier = %ctx.base_identifier(),
            handler = %handler.name(),
            "Dispatching stage"
        );

        let outcome = match handler.run(&ctx).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(
                    bucket = %ctx.bucket(),
                    path = %ctx.trigger_path(),
                    stage = %stage,
                    base_identifier = %ctx.base_identifier(),
                    error = %e,
                    "Stage failed"
                );
                return Err(e.in_stage(stage, ctx.base_identifier()));
            }
        };

        let dispatched = DispatchOutcome::Handled {
            stage,
            base_identifier: ctx.base_identifier().to_string(),
            outcome,
        };
        info!(
            stage = %stage,
            base_identifier = %ctx.base_identifier(),
            status = %dispatched.status(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Stage finished"
        );
        Ok(dispatched)
    }
}
