//! Naming convention for the notification-driven media pipeline.
//!
//! Every pipeline stage communicates by writing objects whose names carry a
//! stage marker. This crate owns that vocabulary and the single total mapping
//! from an object path to the [`PipelineStage`] that should handle it.
//!
//! ```
//! use stage_naming::{classify, Marker, PipelineStage};
//!
//! assert_eq!(classify("job123.mp4"), PipelineStage::ExtractorInitial);
//! assert_eq!(classify(&Marker::AudioDone.path_for("job123")), PipelineStage::ExtractorFinaliseAudio);
//! assert_eq!(classify("random/unrelated/file.txt"), PipelineStage::Unrecognized);
//! ```

mod classify;
mod marker;
mod stage;

pub use classify::{ObjectPath, classify};
pub use marker::{Marker, SEPARATOR, VIDEO_EXTENSIONS, tokens};
pub use stage::PipelineStage;
