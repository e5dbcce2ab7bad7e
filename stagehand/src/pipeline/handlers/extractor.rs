//! Extractor stage handlers.
//!
//! The extractor turns a raw upload into separate audio and video tracks,
//! joins the two branches (see [`crate::pipeline::barrier`]), detects
//! segments and cuts each one out.
//!
//! Every handler writes its data objects first and its commit object last,
//! and skips when the commit object already exists.

use std::sync::Arc;

use async_trait::async_trait;
use stage_naming::{Marker, ObjectPath};
use tracing::info;

use super::traits::{StageHandler, StageOutcome, ensure_same_job, write_object};
use crate::media::{MAX_SEGMENTS, MediaEngine, MediaSource, SegmentSpan};
use crate::pipeline::context::JobContext;
use crate::pipeline::payloads::{
    CompletionMarker, ExtractionManifest, ExtractionRequest, FinaliseRequest, decode, encode,
};
use crate::store::ObjectStore;
use crate::{Error, Result};

/// Fans a raw upload out into audio and video extraction requests.
pub struct InitialExtract {
    store: Arc<dyn ObjectStore>,
}

impl InitialExtract {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StageHandler for InitialExtract {
    fn name(&self) -> &'static str {
        "InitialExtract"
    }

    async fn run(&self, ctx: &JobContext) -> Result<StageOutcome> {
        let bucket = ctx.bucket();
        let source = ctx.trigger_path();

        if !self.store.exists(bucket, source).await? {
            return Err(Error::not_found(bucket, source));
        }

        let request = encode(&ExtractionRequest {
            job: ctx.base_identifier().to_string(),
            source: source.to_string(),
        })?;

        let mut written = Vec::new();
        for marker in [Marker::AudioRequest, Marker::VideoRequest] {
            let path = ctx.path(marker);
            if self.store.exists(bucket, &path).await? {
                continue;
            }
            write_object(self.store.as_ref(), ctx, path, request.clone(), &mut written).await?;
        }

        if written.is_empty() {
            return Ok(StageOutcome::skipped("extraction already requested"));
        }

        info!(
            job = %ctx.base_identifier(),
            source = %source,
            requests = written.len(),
            "Requested audio/video extraction"
        );
        Ok(StageOutcome::completed(written))
    }
}

/// Which track an [`ExtractTrack`] handler pulls out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Track {
    Audio,
    Video,
}

impl Track {
    fn output(&self) -> Marker {
        match self {
            Self::Audio => Marker::AudioOutput,
            Self::Video => Marker::VideoOutput,
        }
    }

    fn done(&self) -> Marker {
        match self {
            Self::Audio => Marker::AudioDone,
            Self::Video => Marker::VideoDone,
        }
    }
}

impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Audio => write!(f, "audio"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Extracts one track from the upload and writes its completion marker.
pub struct ExtractTrack {
    track: Track,
    store: Arc<dyn ObjectStore>,
    engine: Arc<dyn MediaEngine>,
}

impl ExtractTrack {
    pub fn new(track: Track, store: Arc<dyn ObjectStore>, engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            track,
            store,
            engine,
        }
    }

    pub fn audio(store: Arc<dyn ObjectStore>, engine: Arc<dyn MediaEngine>) -> Self {
        Self::new(Track::Audio, store, engine)
    }

    pub fn video(store: Arc<dyn ObjectStore>, engine: Arc<dyn MediaEngine>) -> Self {
        Self::new(Track::Video, store, engine)
    }
}

#[async_trait]
impl StageHandler for ExtractTrack {
    fn name(&self) -> &'static str {
        match self.track {
            Track::Audio => "ExtractAudio",
            Track::Video => "ExtractVideo",
        }
    }

    async fn run(&self, ctx: &JobContext) -> Result<StageOutcome> {
        let bucket = ctx.bucket();
        let done_path = ctx.path(self.track.done());

        if self.store.exists(bucket, &done_path).await? {
            return Ok(StageOutcome::skipped(format!(
                "{} already extracted",
                self.track
            )));
        }

        let request: ExtractionRequest = decode(
            ctx.trigger_path(),
            &self.store.get(bucket, ctx.trigger_path()).await?,
        )?;
        ensure_same_job(ctx, &request.job)?;

        let source = MediaSource {
            data: self.store.get(bucket, &request.source).await?,
            extension: ObjectPath::parse(request.source.clone())
                .extension()
                .map(str::to_string),
        };

        let output = match self.track {
            Track::Audio => self.engine.extract_audio(source).await?,
            Track::Video => self.engine.extract_video(source).await?,
        };
        if output.is_empty() {
            return Err(Error::media(format!(
                "{} extraction of '{}' produced no data",
                self.track, request.source
            )));
        }

        let output_path = ctx.path(self.track.output());
        let marker = encode(&CompletionMarker {
            job: request.job,
            output: output_path.clone(),
            size_bytes: output.len() as u64,
        })?;

        let mut written = Vec::with_capacity(2);
        write_object(self.store.as_ref(), ctx, output_path, output, &mut written).await?;
        write_object(self.store.as_ref(), ctx, done_path, marker, &mut written).await?;

        info!(
            job = %ctx.base_identifier(),
            track = %self.track,
            engine = %self.engine.name(),
            "Track extracted"
        );
        Ok(StageOutcome::completed(written))
    }
}

/// Assembles the extraction outputs once the join barrier has promoted the job.
pub struct FinaliseExtraction {
    store: Arc<dyn ObjectStore>,
    engine: Arc<dyn MediaEngine>,
}

impl FinaliseExtraction {
    pub fn new(store: Arc<dyn ObjectStore>, engine: Arc<dyn MediaEngine>) -> Self {
        Self { store, engine }
    }
}

#[async_trait]
impl StageHandler for FinaliseExtraction {
    fn name(&self) -> &'static str {
        "FinaliseExtraction"
    }

    async fn run(&self, ctx: &JobContext) -> Result<StageOutcome> {
        let bucket = ctx.bucket();
        let manifest_path = ctx.path(Marker::Extracted);

        if self.store.exists(bucket, &manifest_path).await? {
            return Ok(StageOutcome::skipped("extraction already finalised"));
        }

        let request: FinaliseRequest = decode(
            ctx.trigger_path(),
            &self.store.get(bucket, ctx.trigger_path()).await?,
        )?;
        ensure_same_job(ctx, &request.job)?;

        let audio = self.store.get(bucket, &request.audio).await?;
        let video = self.store.get(bucket, &request.video).await?;

        let segments = self.engine.detect_segments(audio, video).await?;
        if segments.is_empty() {
            return Err(Error::media(format!(
                "no segments detected in '{}'",
                request.video
            )));
        }
        if segments.len() > MAX_SEGMENTS {
            return Err(Error::config(format!(
                "'{}' splits into {} segments, more than {MAX_SEGMENTS}",
                request.video,
                segments.len()
            )));
        }

        let mut written = Vec::with_capacity(segments.len() + 1);
        for span in &segments {
            let path = ctx.path(Marker::Split(span.index));
            if self.store.exists(bucket, &path).await? {
                continue;
            }
            write_object(self.store.as_ref(), ctx, path, encode(span)?, &mut written).await?;
        }

        let manifest = encode(&ExtractionManifest {
            job: request.job,
            audio: request.audio,
            video: request.video,
            segments,
        })?;
        write_object(self.store.as_ref(), ctx, manifest_path, manifest, &mut written).await?;

        info!(
            job = %ctx.base_identifier(),
            split_requests = written.len() - 1,
            "Extraction finalised"
        );
        Ok(StageOutcome::completed(written))
    }
}

/// Cuts one segment out of the extracted tracks.
pub struct SplitAvSegment {
    store: Arc<dyn ObjectStore>,
    engine: Arc<dyn MediaEngine>,
}

impl SplitAvSegment {
    pub fn new(store: Arc<dyn ObjectStore>, engine: Arc<dyn MediaEngine>) -> Self {
        Self { store, engine }
    }
}

#[async_trait]
impl StageHandler for SplitAvSegment {
    fn name(&self) -> &'static str {
        "SplitAvSegment"
    }

    async fn run(&self, ctx: &JobContext) -> Result<StageOutcome> {
        let bucket = ctx.bucket();
        let index = ctx.segment_index().ok_or_else(|| {
            Error::malformed(format!("'{}' carries no segment index", ctx.trigger_path()))
        })?;

        let segment_path = ctx.path(Marker::Segment(index));
        if self.store.exists(bucket, &segment_path).await? {
            return Ok(StageOutcome::skipped(format!("segment {index} already split")));
        }

        let span: SegmentSpan = decode(
            ctx.trigger_path(),
            &self.store.get(bucket, ctx.trigger_path()).await?,
        )?;
        if span.index != index {
            return Err(Error::malformed(format!(
                "'{}' describes segment {}, expected {}",
                ctx.trigger_path(),
                span.index,
                index
            )));
        }

        let video = self.store.get(bucket, &ctx.path(Marker::VideoOutput)).await?;
        let audio = self.store.get(bucket, &ctx.path(Marker::AudioOutput)).await?;
        let segment = self.engine.split_segment(video, audio, span).await?;

        let mut written = Vec::with_capacity(1);
        write_object(self.store.as_ref(), ctx, segment_path, segment, &mut written).await?;

        info!(job = %ctx.base_identifier(), segment = index, "Segment split");
        Ok(StageOutcome::completed(written))
    }
}
