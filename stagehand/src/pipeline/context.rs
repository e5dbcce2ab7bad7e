//! Per-invocation job context.

use stage_naming::{Marker, ObjectPath, PipelineStage};

use crate::notification::ObjectNotification;

/// Scope of one handler invocation, rebuilt from each notification.
///
/// Nothing here is persisted: the store is the only durable state, so every
/// handler invocation is stateless and safe to restart.
#[derive(Debug, Clone)]
pub struct JobContext {
    bucket: String,
    trigger: ObjectPath,
}

impl JobContext {
    pub fn new(bucket: impl Into<String>, trigger: ObjectPath) -> Self {
        Self {
            bucket: bucket.into(),
            trigger,
        }
    }

    pub fn from_notification(notification: &ObjectNotification) -> Self {
        Self::new(
            notification.bucket.clone(),
            ObjectPath::parse(notification.path.clone()),
        )
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn base_identifier(&self) -> &str {
        self.trigger.base_identifier()
    }

    /// The object whose creation triggered this invocation.
    pub fn trigger(&self) -> &ObjectPath {
        &self.trigger
    }

    pub fn trigger_path(&self) -> &str {
        self.trigger.as_str()
    }

    pub fn stage(&self) -> PipelineStage {
        self.trigger.stage()
    }

    /// Segment index carried by the trigger's marker.
    pub fn segment_index(&self) -> Option<u32> {
        self.trigger.marker().and_then(|m| m.index())
    }

    /// Path of `marker` for this job.
    pub fn path(&self, marker: Marker) -> String {
        marker.path_for(self.base_identifier())
    }
}
