//! Stage handler trait and related types.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{Error, Result};
use crate::pipeline::context::JobContext;
use crate::store::ObjectStore;

/// What a handler invocation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StageOutcome {
    /// The handler did its work and wrote these objects, in write order.
    Completed { written: Vec<String> },
    /// The handler's output already existed; nothing was written.
    Skipped { reason: String },
    /// A precondition is not met yet. Not an error: a sibling's own
    /// notification will re-check it.
    Waiting { missing: Vec<String> },
}

impl StageOutcome {
    pub fn completed(written: Vec<String>) -> Self {
        Self::Completed { written }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    /// Objects written by the invocation.
    pub fn written(&self) -> &[String] {
        match self {
            Self::Completed { written } => written,
            _ => &[],
        }
    }
}

/// One unit of pipeline work.
///
/// Handlers must be idempotent: at-least-once delivery means any invocation
/// may be repeated with the same context, and duplicate invocations must leave
/// the store exactly as a single one would.
#[async_trait]
pub trait StageHandler: Send + Sync {
    /// Handler name for logging.
    fn name(&self) -> &'static str;

    /// Run the handler for one notification.
    ///
    /// Errors are handler failures and are surfaced to the caller so the
    /// delivery layer can redeliver; a missing sibling is reported as
    /// [`StageOutcome::Waiting`] instead.
    async fn run(&self, ctx: &JobContext) -> Result<StageOutcome>;
}

/// Write `data` to `path` and record it in `written`.
pub(crate) async fn write_object(
    store: &dyn ObjectStore,
    ctx: &JobContext,
    path: String,
    data: Bytes,
    written: &mut Vec<String>,
) -> Result<()> {
    debug!(
        bucket = %ctx.bucket(),
        path = %path,
        size = data.len(),
        "Writing stage output"
    );
    store.put(ctx.bucket(), &path, data).await?;
    written.push(path);
    Ok(())
}

/// Payloads name their job; a payload from another job is malformed.
pub(crate) fn ensure_same_job(ctx: &JobContext, job: &str) -> Result<()> {
    if job != ctx.base_identifier() {
        return Err(Error::malformed(format!(
            "'{}' belongs to job '{}', expected '{}'",
            ctx.trigger_path(),
            job,
            ctx.base_identifier()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_written() {
        let outcome = StageOutcome::completed(vec!["a".into(), "b".into()]);
        assert_eq!(outcome.written(), ["a".to_string(), "b".to_string()]);
        assert!(StageOutcome::skipped("done").written().is_empty());
    }

    #[test]
    fn test_outcome_serialization() {
        let json = serde_json::to_string(&StageOutcome::Waiting {
            missing: vec!["job__video_done".into()],
        })
        .unwrap();
        assert!(json.contains(r#""kind":"waiting""#));
        assert!(json.contains("job__video_done"));
    }
}

