//! Byte-level stand-in engine.
//!
//! Treats every byte of the extracted video as one second of media. Tracks are
//! copied, segments are byte slices and rendering is concatenation, which keeps
//! every stage deterministic and cheap for local runs and tests.

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};

use super::{MediaEngine, MediaSource, SegmentSpan, fixed_spans};
use crate::{Error, Result};

/// Media engine that moves bytes around without decoding them.
#[derive(Debug, Clone)]
pub struct PassthroughEngine {
    segment_secs: f64,
}

impl PassthroughEngine {
    pub fn new(segment_secs: f64) -> Self {
        Self { segment_secs }
    }
}

impl Default for PassthroughEngine {
    fn default() -> Self {
        Self::new(10.0)
    }
}

#[async_trait]
impl MediaEngine for PassthroughEngine {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    async fn extract_audio(&self, source: MediaSource) -> Result<Bytes> {
        Ok(source.data)
    }

    async fn extract_video(&self, source: MediaSource) -> Result<Bytes> {
        Ok(source.data)
    }

    async fn detect_segments(&self, _audio: Bytes, video: Bytes) -> Result<Vec<SegmentSpan>> {
        if video.is_empty() {
            return Err(Error::media("extracted video is empty"));
        }
        Ok(fixed_spans(video.len() as f64, self.segment_secs))
    }

    async fn split_segment(&self, video: Bytes, _audio: Bytes, span: SegmentSpan) -> Result<Bytes> {
        let start = span.start_secs.max(0.0) as usize;
        let end = (span.end_secs.max(0.0) as usize).min(video.len());
        if start >= end {
            return Err(Error::media(format!(
                "segment {} [{}, {}) is outside the video",
                span.index, span.start_secs, span.end_secs
            )));
        }
        Ok(video.slice(start..end))
    }

    async fn render(&self, segments: Vec<Bytes>) -> Result<Bytes> {
        if segments.is_empty() {
            return Err(Error::media("nothing to render"));
        }
        let mut out = BytesMut::with_capacity(segments.iter().map(Bytes::len).sum());
        for segment in &segments {
            out.extend_from_slice(segment);
        }
        Ok(out.freeze())
    }

    async fn finalise_render(&self, rendered: Bytes) -> Result<Bytes> {
        Ok(rendered)
    }
}
