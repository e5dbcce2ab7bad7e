//! Media engine seam.
//!
//! Stage handlers own coordination; the codec work they trigger is delegated
//! to a [`MediaEngine`]. Engines receive and return whole blobs so handlers
//! stay independent of where the bytes live.

mod ffmpeg;
mod passthrough;

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::Result;

pub use ffmpeg::FfmpegEngine;
pub use passthrough::PassthroughEngine;

/// Most segments one job may fan out into.
pub const MAX_SEGMENTS: usize = 10_000;

/// A raw upload handed to the extractors.
#[derive(Debug, Clone)]
pub struct MediaSource {
    pub data: Bytes,
    /// Container extension of the upload, if it had one.
    pub extension: Option<String>,
}

/// A time range of the extracted media.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentSpan {
    pub index: u32,
    pub start_secs: f64,
    pub end_secs: f64,
}

impl SegmentSpan {
    pub fn duration_secs(&self) -> f64 {
        self.end_secs - self.start_secs
    }
}

/// Codec operations behind each stage.
///
/// Implementations must be deterministic for identical inputs: duplicate
/// deliveries re-run them and the resulting objects must not differ.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaEngine: Send + Sync {
    /// Engine name for logging.
    fn name(&self) -> &'static str;

    /// Extract the audio track of an upload.
    async fn extract_audio(&self, source: MediaSource) -> Result<Bytes>;

    /// Extract the video track of an upload, without audio.
    async fn extract_video(&self, source: MediaSource) -> Result<Bytes>;

    /// Work out the segments of the extracted media.
    async fn detect_segments(&self, audio: Bytes, video: Bytes) -> Result<Vec<SegmentSpan>>;

    /// Cut one audio/video segment.
    async fn split_segment(&self, video: Bytes, audio: Bytes, span: SegmentSpan) -> Result<Bytes>;

    /// Join segments, in order, into one rendered video.
    async fn render(&self, segments: Vec<Bytes>) -> Result<Bytes>;

    /// Produce the deliverable from a rendered video.
    async fn finalise_render(&self, rendered: Bytes) -> Result<Bytes>;
}

/// Cut `[0, duration)` into consecutive spans of at most `segment_secs`.
pub fn fixed_spans(duration_secs: f64, segment_secs: f64) -> Vec<SegmentSpan> {
    let valid = |secs: f64| secs.is_finite() && secs > 0.0;
    if !valid(duration_secs) || !valid(segment_secs) {
        return Vec::new();
    }

    let mut spans = Vec::new();
    let mut start = 0.0;
    let mut index = 0u32;
    while start < duration_secs {
        let end = (start + segment_secs).min(duration_secs);
        spans.push(SegmentSpan {
            index,
            start_secs: start,
            end_secs: end,
        });
        index += 1;
        start = segment_secs * f64::from(index);
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_spans_even() {
        let spans = fixed_spans(30.0, 10.0);
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[2].start_secs, 20.0);
        assert_eq!(spans[2].end_secs, 30.0);
    }

    #[test]
    fn test_fixed_spans_remainder() {
        let spans = fixed_spans(25.0, 10.0);
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[2].duration_secs(), 5.0);
        assert!(spans.iter().enumerate().all(|(i, s)| s.index == i as u32));
    }

    #[test]
    fn test_fixed_spans_degenerate() {
        assert!(fixed_spans(0.0, 10.0).is_empty());
        assert!(fixed_spans(10.0, 0.0).is_empty());
        assert!(fixed_spans(f64::NAN, 10.0).is_empty());
        assert!(fixed_spans(f64::INFINITY, 10.0).is_empty());
        assert_eq!(fixed_spans(3.0, 10.0).len(), 1);
    }
}
