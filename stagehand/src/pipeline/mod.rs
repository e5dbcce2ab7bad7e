//! The notification-driven pipeline.
//!
//! There is no queue, database or scheduler. Each stage writes an object whose
//! name encodes its role, and that write is the trigger for the next stage:
//!
//! ```text
//! job.mp4 ─▶ InitialExtract ─┬▶ job__audio_req ─▶ ExtractAudio ─▶ job__audio_done ─┐
//!                            └▶ job__video_req ─▶ ExtractVideo ─▶ job__video_done ─┤
//!                                                                                   ▼
//!                                                             CheckFinaliseExtraction
//!                                                                                   │
//!       job__split_<n> ◀─ FinaliseExtraction ◀─ job__finalise ◀────────────────────┘
//!            │
//!            ▼
//!       SplitAvSegment ─▶ job__segment_<n>.mp4
//!
//! job__render_spec.json ─▶ CombinerInitialRender ─▶ job__render_req ─▶ CombinerRender
//!       ─▶ job__render_done ─▶ CombinerFinaliseRender ─▶ job__rendered.mp4
//! ```
//!
//! Delivery is at-least-once. Every handler is idempotent, and the barrier
//! promotes at least once rather than exactly once.

pub mod barrier;
pub mod context;
pub mod dispatcher;
pub mod handlers;
pub mod payloads;
pub mod relay;

pub use barrier::{CheckFinaliseExtraction, SiblingMarkers, should_promote};
pub use context::JobContext;
pub use dispatcher::{DispatchOutcome, DispatchStatus, EventDispatcher};
pub use handlers::{StageHandler, StageOutcome};
pub use relay::{NotificationRelay, RelayStats, RelayStatsSnapshot};
