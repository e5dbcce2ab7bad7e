//! Bodies of the objects stages hand to each other.
//!
//! Serialization is deterministic: the same inputs always produce the same
//! bytes, so duplicate writes of a derived object are byte-identical.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::media::SegmentSpan;
use crate::{Error, Result};

/// Body of an audio or video extraction request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    pub job: String,
    /// Path of the raw upload.
    pub source: String,
}

/// Body of a completion marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionMarker {
    pub job: String,
    /// Path of the data object this marker vouches for.
    pub output: String,
    pub size_bytes: u64,
}

/// Body of the finalisation trigger written by the join barrier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinaliseRequest {
    pub job: String,
    pub audio: String,
    pub video: String,
}

/// Result of a finished extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionManifest {
    pub job: String,
    pub audio: String,
    pub video: String,
    pub segments: Vec<SegmentSpan>,
}

/// Uploaded description of what to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderSpec {
    /// Segment indexes, in playback order.
    pub segments: Vec<u32>,
}

/// Resolved render inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderPlan {
    pub job: String,
    /// Segment object paths, in playback order.
    pub segments: Vec<String>,
}

/// Serialize a payload.
pub fn encode<T: Serialize>(payload: &T) -> Result<Bytes> {
    Ok(Bytes::from(serde_json::to_vec_pretty(payload)?))
}

/// Deserialize the payload stored at `path`.
pub fn decode<T: DeserializeOwned>(path: &str, data: &[u8]) -> Result<T> {
    serde_json::from_slice(data)
        .map_err(|e| Error::malformed(format!("cannot parse '{path}': {e}")))
}
