//! Background watch that pulls newer versions ahead of demand.
//!
//! Without the watch a node only refreshes when a caller asks for a version it
//! does not have. The watch polls the coordination store on an interval and
//! refreshes any cached key that has fallen behind, so most version requests
//! are served straight from the cache.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use vellum_core::VersionedArtifact;

use crate::service::VersionQueryService;

/// Counters for the watch task.
#[derive(Debug, Default)]
pub struct WatchMetrics {
    pub polls: AtomicU64,
    pub keys_checked: AtomicU64,
    pub keys_refreshed: AtomicU64,
    pub errors: AtomicU64,
}

/// Point-in-time copy of [`WatchMetrics`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchSnapshot {
    pub polls: u64,
    pub keys_checked: u64,
    pub keys_refreshed: u64,
    pub errors: u64,
}

impl WatchMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> WatchSnapshot {
        WatchSnapshot {
            polls: self.polls.load(Ordering::Relaxed),
            keys_checked: self.keys_checked.load(Ordering::Relaxed),
            keys_refreshed: self.keys_refreshed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Poll the coordination store until the shutdown signal is received.
///
/// # Example
///
/// ```ignore
/// let (shutdown_tx, shutdown_rx) = watch::channel(false);
/// let handle = tokio::spawn(schema_watch_task(service, Duration::from_secs(30), shutdown_rx));
///
/// // Later
/// let _ = shutdown_tx.send(true);
/// let metrics = handle.await?;
/// ```
pub async fn schema_watch_task<A: VersionedArtifact>(
    service: Arc<VersionQueryService<A>>,
    poll_interval: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
) -> Arc<WatchMetrics> {
    let metrics = Arc::new(WatchMetrics::new());

    let mut ticker = interval(poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!(
        poll_interval_ms = poll_interval.as_millis() as u64,
        "Schema watch task started"
    );

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                // A dropped sender also means shutdown.
                if changed.is_err() || *shutdown_rx.borrow() {
                    tracing::info!("Schema watch task shutting down");
                    break;
                }
            }

            _ = ticker.tick() => {
                poll(&service, &metrics).await;
            }
        }
    }

    let snapshot = metrics.snapshot();
    tracing::info!(
        polls = snapshot.polls,
        keys_checked = snapshot.keys_checked,
        keys_refreshed = snapshot.keys_refreshed,
        errors = snapshot.errors,
        "Schema watch task completed"
    );

    metrics
}

async fn poll<A: VersionedArtifact>(service: &VersionQueryService<A>, metrics: &WatchMetrics) {
    metrics.polls.fetch_add(1, Ordering::Relaxed);
    let report = service.poll_once().await;

    metrics
        .keys_checked
        .fetch_add(report.checked as u64, Ordering::Relaxed);
    metrics
        .keys_refreshed
        .fetch_add(report.refreshed as u64, Ordering::Relaxed);
    metrics
        .errors
        .fetch_add(report.failed as u64, Ordering::Relaxed);

    if report.refreshed > 0 || report.failed > 0 {
        tracing::info!(
            checked = report.checked,
            refreshed = report.refreshed,
            failed = report.failed,
            "Schema watch poll completed"
        );
    } else {
        tracing::trace!(checked = report.checked, "Schema watch poll found nothing new");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::InMemoryCoordinationStore;
    use vellum_core::{FieldDefinition, IndexSchema, RefreshConfig, SnapshotKey};

    fn schema() -> Arc<IndexSchema> {
        Arc::new(IndexSchema::new("books", "id").with_field(FieldDefinition::new("id", "string")))
    }

    #[tokio::test]
    async fn test_watch_refreshes_and_stops() {
        let key = SnapshotKey::collection("books").expect("valid key");
        let store = Arc::new(InMemoryCoordinationStore::new());
        store.insert_at(key.clone(), 1, schema()).await;

        let service = Arc::new(VersionQueryService::new(store.clone(), RefreshConfig::default()));
        assert_eq!(service.get_version(&key, -1).await.ok(), Some(1));
        store.insert_at(key.clone(), 4, schema()).await;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(schema_watch_task(
            Arc::clone(&service),
            Duration::from_millis(10),
            shutdown_rx,
        ));

        let mut refreshed = false;
        for _ in 0..100 {
            if service.cached_version(&key) == Some(4) {
                refreshed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(refreshed, "watch should pick up version 4");

        shutdown_tx.send(true).expect("task alive");
        let metrics = handle.await.expect("task joins");
        let snapshot = metrics.snapshot();
        assert!(snapshot.polls >= 1);
        assert!(snapshot.keys_refreshed >= 1);
    }

    #[tokio::test]
    async fn test_watch_stops_when_sender_dropped() {
        let store = Arc::new(InMemoryCoordinationStore::<IndexSchema>::new());
        let service = Arc::new(VersionQueryService::new(store, RefreshConfig::default()));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(schema_watch_task(service, Duration::from_secs(60), shutdown_rx));
        drop(shutdown_tx);

        let metrics = handle.await.expect("task joins");
        assert_eq!(metrics.snapshot().keys_checked, 0);
    }
}
