//! Stage handlers.
//!
//! One handler per recognized [`PipelineStage`](stage_naming::PipelineStage);
//! the two completion-marker stages share
//! [`CheckFinaliseExtraction`](crate::pipeline::barrier::CheckFinaliseExtraction).

mod combiner;
mod extractor;
mod traits;

pub use combiner::{CombinerFinaliseRender, CombinerInitialRender, CombinerRender};
pub use extractor::{ExtractTrack, FinaliseExtraction, InitialExtract, SplitAvSegment, Track};
pub use traits::{StageHandler, StageOutcome};

pub(crate) use traits::write_object;
