//! Application-wide error types.

use stage_naming::PipelineStage;
use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Store error while {op} '{path}': {source}")]
    Store {
        op: &'static str,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Object not found: {bucket}/{path}")]
    ObjectNotFound { bucket: String, path: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid notification: {0}")]
    InvalidNotification(String),

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Media engine error: {0}")]
    Media(String),

    #[error("Stage {stage} failed for '{base_identifier}': {source}")]
    Stage {
        stage: PipelineStage,
        base_identifier: String,
        #[source]
        source: Box<Error>,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn not_found(bucket: impl Into<String>, path: impl Into<String>) -> Self {
        Self::ObjectNotFound {
            bucket: bucket.into(),
            path: path.into(),
        }
    }

    pub fn store_io(op: &'static str, path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Store {
            op,
            path: path.into(),
            source,
        }
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedInput(msg.into())
    }

    pub fn media(msg: impl Into<String>) -> Self {
        Self::Media(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Attach the failing stage and job to this error.
    pub fn in_stage(self, stage: PipelineStage, base_identifier: impl Into<String>) -> Self {
        Self::Stage {
            stage,
            base_identifier: base_identifier.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error, or the error it wraps, is a missing object.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::ObjectNotFound { .. } => true,
            Self::Stage { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}
