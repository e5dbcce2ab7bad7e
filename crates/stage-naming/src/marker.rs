//! Stage marker vocabulary.
//!
//! A marker is a suffix appended to a base identifier. The vocabulary is the
//! wire protocol between pipeline stages: every stage finds its inputs and
//! names its outputs through these tokens only.

use std::fmt;

use crate::stage::PipelineStage;

/// Reserved separator every marker token starts with.
pub const SEPARATOR: &str = "__";

/// Marker tokens.
pub mod tokens {
    pub const AUDIO_REQUEST: &str = "__audio_req";
    pub const VIDEO_REQUEST: &str = "__video_req";
    pub const AUDIO_DONE: &str = "__audio_done";
    pub const VIDEO_DONE: &str = "__video_done";
    pub const FINALISE: &str = "__finalise";
    pub const SPLIT_PREFIX: &str = "__split_";
    pub const RENDER_SPEC: &str = "__render_spec";
    pub const RENDER_REQUEST: &str = "__render_req";
    pub const RENDER_DONE: &str = "__render_done";

    pub const AUDIO_OUTPUT: &str = "__audio";
    pub const VIDEO_OUTPUT: &str = "__video";
    pub const EXTRACTED: &str = "__extracted";
    pub const SEGMENT_PREFIX: &str = "__segment_";
    pub const RENDER_OUTPUT: &str = "__render";
    pub const RENDERED: &str = "__rendered";
}

/// Container extensions accepted for a raw upload.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "mkv", "webm", "avi", "m4v"];

/// A stage marker.
///
/// Trigger markers re-enter the pipeline when written; output markers name
/// derived data and classify as [`PipelineStage::Unrecognized`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Marker {
    AudioRequest,
    VideoRequest,
    AudioDone,
    VideoDone,
    Finalise,
    Split(u32),
    RenderSpec,
    RenderRequest,
    RenderDone,
    AudioOutput,
    VideoOutput,
    Extracted,
    Segment(u32),
    RenderOutput,
    Rendered,
}

impl Marker {
    /// Markers with a fixed token, in match order.
    pub const FIXED: &'static [Marker] = &[
        Marker::AudioRequest,
        Marker::VideoRequest,
        Marker::AudioDone,
        Marker::VideoDone,
        Marker::Finalise,
        Marker::RenderSpec,
        Marker::RenderRequest,
        Marker::RenderDone,
        Marker::AudioOutput,
        Marker::VideoOutput,
        Marker::Extracted,
        Marker::RenderOutput,
        Marker::Rendered,
    ];

    /// The token for fixed markers; `None` for indexed ones.
    pub fn fixed_token(&self) -> Option<&'static str> {
        let token = match self {
            Self::AudioRequest => tokens::AUDIO_REQUEST,
            Self::VideoRequest => tokens::VIDEO_REQUEST,
            Self::AudioDone => tokens::AUDIO_DONE,
            Self::VideoDone => tokens::VIDEO_DONE,
            Self::Finalise => tokens::FINALISE,
            Self::RenderSpec => tokens::RENDER_SPEC,
            Self::RenderRequest => tokens::RENDER_REQUEST,
            Self::RenderDone => tokens::RENDER_DONE,
            Self::AudioOutput => tokens::AUDIO_OUTPUT,
            Self::VideoOutput => tokens::VIDEO_OUTPUT,
            Self::Extracted => tokens::EXTRACTED,
            Self::RenderOutput => tokens::RENDER_OUTPUT,
            Self::Rendered => tokens::RENDERED,
            Self::Split(_) | Self::Segment(_) => return None,
        };
        Some(token)
    }

    /// The stage an object carrying this marker dispatches to.
    pub fn stage(&self) -> PipelineStage {
        match self {
            Self::AudioRequest => PipelineStage::ExtractorAudio,
            Self::VideoRequest => PipelineStage::ExtractorVideo,
            Self::AudioDone => PipelineStage::ExtractorFinaliseAudio,
            Self::VideoDone => PipelineStage::ExtractorFinaliseVideo,
            Self::Finalise => PipelineStage::ExtractorFinalise,
            Self::Split(_) => PipelineStage::ExtractorSplitSegment,
            Self::RenderSpec => PipelineStage::CombinerInitial,
            Self::RenderRequest => PipelineStage::CombinerRender,
            Self::RenderDone => PipelineStage::CombinerFinalise,
            Self::AudioOutput
            | Self::VideoOutput
            | Self::Extracted
            | Self::Segment(_)
            | Self::RenderOutput
            | Self::Rendered => PipelineStage::Unrecognized,
        }
    }

    /// Extension used when this pipeline writes the marker.
    pub fn extension(&self) -> Option<&'static str> {
        match self {
            Self::AudioOutput => Some("wav"),
            Self::VideoOutput | Self::Segment(_) | Self::RenderOutput | Self::Rendered => {
                Some("mp4")
            }
            Self::Extracted | Self::RenderSpec => Some("json"),
            _ => None,
        }
    }

    /// The segment index carried by indexed markers.
    pub fn index(&self) -> Option<u32> {
        match self {
            Self::Split(index) | Self::Segment(index) => Some(*index),
            _ => None,
        }
    }

    /// Build the full object path for `base` carrying this marker.
    pub fn path_for(&self, base: &str) -> String {
        match self.extension() {
            Some(ext) => format!("{base}{self}.{ext}"),
            None => format!("{base}{self}"),
        }
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Split(index) => write!(f, "{}{}", tokens::SPLIT_PREFIX, index),
            Self::Segment(index) => write!(f, "{}{}", tokens::SEGMENT_PREFIX, index),
            fixed => f.write_str(fixed.fixed_token().unwrap_or_default()),
        }
    }
}
