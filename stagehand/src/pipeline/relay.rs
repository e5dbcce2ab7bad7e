//! In-process notification relay.
//!
//! Stands in for the platform's delivery layer on local runs: every
//! notification emitted by a [`NotifyingStore`](crate::store::NotifyingStore)
//! is dispatched on its own task, bounded by a semaphore. Failures are logged
//! and counted, never retried.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::dispatcher::{DispatchStatus, EventDispatcher};
use crate::notification::ObjectNotification;

/// Running totals of relayed dispatches.
#[derive(Debug, Default)]
pub struct RelayStats {
    processed: AtomicU64,
    waiting: AtomicU64,
    ignored: AtomicU64,
    failed: AtomicU64,
}

/// Point-in-time copy of [`RelayStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelayStatsSnapshot {
    pub processed: u64,
    pub waiting: u64,
    pub ignored: u64,
    pub failed: u64,
}

impl RelayStats {
    fn record(&self, status: DispatchStatus) {
        let counter = match status {
            DispatchStatus::Processed => &self.processed,
            DispatchStatus::Waiting => &self.waiting,
            DispatchStatus::Ignored => &self.ignored,
            DispatchStatus::Failed | DispatchStatus::Rejected => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RelayStatsSnapshot {
        RelayStatsSnapshot {
            processed: self.processed.load(Ordering::Relaxed),
            waiting: self.waiting.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }
}

/// Dispatches locally emitted notifications.
pub struct NotificationRelay {
    dispatcher: Arc<EventDispatcher>,
    semaphore: Arc<Semaphore>,
    stats: Arc<RelayStats>,
    cancellation_token: CancellationToken,
}

impl NotificationRelay {
    pub fn new(
        dispatcher: Arc<EventDispatcher>,
        max_concurrent: usize,
        cancellation_token: CancellationToken,
    ) -> Self {
        Self {
            dispatcher,
            semaphore: Arc::new(Semaphore::new(max_concurrent.max(1))),
            stats: Arc::new(RelayStats::default()),
            cancellation_token,
        }
    }

    pub fn stats(&self) -> Arc<RelayStats> {
        self.stats.clone()
    }

    /// Run the relay on a background task.
    pub fn spawn(self, rx: UnboundedReceiver<ObjectNotification>) -> JoinHandle<()> {
        tokio::spawn(self.run(rx))
    }

    /// Relay until cancelled or the channel closes, then wait for in-flight
    /// dispatches.
    pub async fn run(self, mut rx: UnboundedReceiver<ObjectNotification>) {
        info!(
            max_concurrent = self.semaphore.available_permits(),
            "Notification relay started"
        );
        let mut tasks = JoinSet::new();

        loop {
            let notification = tokio::select! {
                _ = self.cancellation_token.cancelled() => break,
                next = rx.recv() => match next {
                    Some(notification) => notification,
                    None => break,
                },
            };

            let permit = tokio::select! {
                _ = self.cancellation_token.cancelled() => break,
                permit = self.semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let dispatcher = self.dispatcher.clone();
            let stats = self.stats.clone();
            tasks.spawn(async move {
                let _permit = permit;
                let status = match dispatcher.dispatch(&notification).await {
                    Ok(outcome) => outcome.status(),
                    Err(e) => {
                        warn!(
                            bucket = %notification.bucket,
                            path = %notification.path,
                            error = %e,
                            "Relayed dispatch failed"
                        );
                        DispatchStatus::Failed
                    }
                };
                stats.record(status);
            });

            while let Some(joined) = tasks.try_join_next() {
                if let Err(e) = joined {
                    warn!(error = %e, "Relay task panicked");
                }
            }
        }

        debug!(in_flight = tasks.len(), "Notification relay draining");
        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                warn!(error = %e, "Relay task panicked");
            }
        }
        info!(stats = ?self.stats.snapshot(), "Notification relay stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::PassthroughEngine;
    use crate::store::{MemoryStore, NotifyingStore, ObjectStore};
    use bytes::Bytes;
    use std::time::Duration;

    #[tokio::test]
    async fn test_relay_drives_extraction_to_segments() {
        let memory = Arc::new(MemoryStore::new());
        let (store, rx) = NotifyingStore::new(memory.clone());
        let store: Arc<dyn ObjectStore> = Arc::new(store);
        let dispatcher = Arc::new(EventDispatcher::new(
            store.clone(),
            Arc::new(PassthroughEngine::new(4.0)),
        ));

        let token = CancellationToken::new();
        let relay = NotificationRelay::new(dispatcher, 4, token.clone());
        let stats = relay.stats();
        let handle = relay.spawn(rx);

        store
            .put("media", "job.mp4", Bytes::from_static(b"0123456789"))
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), async {
            while !memory.exists("media", "job__segment_2.mp4").await.unwrap()
                || !memory.exists("media", "job__segment_0.mp4").await.unwrap()
                || !memory.exists("media", "job__segment_1.mp4").await.unwrap()
            {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("pipeline did not reach the segments");

        token.cancel();
        handle.await.unwrap();

        let stats = stats.snapshot();
        assert_eq!(stats.failed, 0);
        assert!(stats.processed >= 8);
    }

    #[tokio::test]
    async fn test_relay_counts_failures_and_stops_when_channel_closes() {
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryStore::new());
        let dispatcher = Arc::new(EventDispatcher::new(
            store,
            Arc::new(PassthroughEngine::default()),
        ));
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let relay = NotificationRelay::new(dispatcher, 2, CancellationToken::new());
        let stats = relay.stats();

        // the upload was never written, so extraction fails
        tx.send(ObjectNotification::new("media", "ghost.mp4").unwrap())
            .unwrap();
        tx.send(ObjectNotification::new("media", "notes.txt").unwrap())
            .unwrap();
        drop(tx);

        relay.run(rx).await;
        assert_eq!(
            stats.snapshot(),
            RelayStatsSnapshot {
                processed: 0,
                waiting: 0,
                ignored: 1,
                failed: 1,
            }
        );
    }
}
