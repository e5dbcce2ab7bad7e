//! Object creation notifications.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One object-finalized notification: the unit of work for the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectNotification {
    pub bucket: String,
    pub path: String,
    pub timestamp: DateTime<Utc>,
}

impl ObjectNotification {
    /// Build a notification, rejecting a missing bucket or path.
    pub fn new(bucket: impl Into<String>, path: impl Into<String>) -> Result<Self> {
        let bucket = bucket.into();
        let path = path.into();

        if bucket.trim().is_empty() {
            return Err(Error::InvalidNotification("bucket is missing".into()));
        }
        if path.trim().is_empty() {
            return Err(Error::InvalidNotification("object name is missing".into()));
        }

        Ok(Self {
            bucket,
            path,
            timestamp: Utc::now(),
        })
    }
}
