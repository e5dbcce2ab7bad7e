//! API request and response bodies.

use serde::{Deserialize, Serialize};
use stage_naming::PipelineStage;

use crate::pipeline::{DispatchOutcome, DispatchStatus, RelayStatsSnapshot};

/// Object-finalized event in the Cloud Events shape storage platforms push.
///
/// Only `data.bucket` and `data.name` are read; fields are optional so a
/// missing one is reported as a rejected notification rather than a JSON error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CloudEventPayload {
    #[serde(default)]
    pub data: Option<StorageObjectData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageObjectData {
    pub bucket: Option<String>,
    pub name: Option<String>,
}

/// Flat notification body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationRequest {
    pub bucket: Option<String>,
    pub path: Option<String>,
}

/// Result of one ingress call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub status: DispatchStatus,
    pub detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stage: Option<PipelineStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_identifier: Option<String>,
}

impl TriggerResponse {
    pub fn from_outcome(outcome: &DispatchOutcome) -> Self {
        let (stage, base_identifier) = match outcome {
            DispatchOutcome::Ignored { .. } => (None, None),
            DispatchOutcome::Handled {
                stage,
                base_identifier,
                ..
            } => (Some(*stage), Some(base_identifier.clone())),
        };
        Self {
            status: outcome.status(),
            detail: outcome.detail(),
            stage,
            base_identifier,
        }
    }

    pub fn rejected(detail: impl Into<String>) -> Self {
        Self {
            status: DispatchStatus::Rejected,
            detail: detail.into(),
            stage: None,
            base_identifier: None,
        }
    }

    pub fn failed(
        detail: impl Into<String>,
        stage: Option<PipelineStage>,
        base_identifier: Option<String>,
    ) -> Self {
        Self {
            status: DispatchStatus::Failed,
            detail: detail.into(),
            stage,
            base_identifier,
        }
    }
}

/// Classification preview query.
#[derive(Debug, Clone, Deserialize)]
pub struct StageQuery {
    pub path: String,
    /// When set, also list the job's objects in this bucket.
    pub bucket: Option<String>,
}

/// Classification preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageResponse {
    pub path: String,
    pub stage: PipelineStage,
    pub base_identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub marker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub objects: Option<Vec<String>>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub store: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay: Option<RelayStatsSnapshot>,
}

/// Request to update the log filter.
#[derive(Debug, Deserialize)]
pub struct UpdateLogFilterRequest {
    pub filter: String,
}

/// Response for logging configuration.
#[derive(Debug, Serialize)]
pub struct LoggingConfigResponse {
    pub filter: String,
    pub available_modules: Vec<ModuleInfo>,
}

#[derive(Debug, Serialize)]
pub struct ModuleInfo {
    pub name: String,
    pub description: String,
}
