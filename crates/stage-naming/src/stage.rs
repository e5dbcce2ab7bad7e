//! Pipeline stage tags.

use serde::{Deserialize, Serialize};

/// The pipeline stage an object name belongs to.
///
/// Exactly one value is produced per object path by [`crate::classify`].
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// A raw upload with no stage marker.
    ExtractorInitial,
    /// Audio extraction request.
    ExtractorAudio,
    /// Video extraction request.
    ExtractorVideo,
    /// Audio extraction completion marker (barrier input).
    ExtractorFinaliseAudio,
    /// Video extraction completion marker (barrier input).
    ExtractorFinaliseVideo,
    /// Barrier satisfied, assemble the extraction outputs.
    ExtractorFinalise,
    /// Split one audio/video segment out of the extracted video.
    ExtractorSplitSegment,
    /// Render spec uploaded.
    CombinerInitial,
    /// Render request ready.
    CombinerRender,
    /// Render finished, assemble the terminal output.
    CombinerFinalise,
    /// Anything else landing in the bucket.
    Unrecognized,
}

impl PipelineStage {
    /// Whether the dispatcher has a handler for this stage.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, Self::Unrecognized)
    }
}
