//! Coordinated refresh with per-key single-flight.
//!
//! The coordinator answers "ensure the cached artifact is at least version V".
//! When the cache already satisfies the demand it returns without touching the
//! coordination store. Otherwise exactly one fetch per key runs at a time and
//! every concurrent caller for that key awaits the same outcome.
//!
//! # Flights
//!
//! A fetch is a *flight*: a spawned task wrapped in a [`Shared`] future and
//! registered in the in-flight map under its key. The task installs its
//! result with [`SnapshotCache::swap_if_newer`] before it releases the
//! marker, so a caller that finds no marker also finds the refreshed
//! snapshot. The marker is released by a guard owned by the task, which means
//! a caller dropping its future (client disconnect, outer timeout) never
//! strands the key.

use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};
use uuid::Uuid;
use vellum_core::{
    ArtifactVersion, CoordinationError, RefreshConfig, RefreshRequest, Snapshot, SnapshotKey,
    VellumError, VellumResult, VersionedArtifact, UNVERSIONED,
};

use super::snapshot_cache::SnapshotCache;
use super::stats::{RefreshStats, RefreshStatsSnapshot};
use crate::coordination::CoordinationStore;

type FlightResult<A> = Result<Arc<Snapshot<A>>, CoordinationError>;
type FlightFuture<A> = Shared<BoxFuture<'static, FlightResult<A>>>;

/// In-flight marker for one key.
struct InFlight<A> {
    id: Uuid,
    target: ArtifactVersion,
    future: FlightFuture<A>,
}

/// Releases the in-flight marker when the flight task ends, however it ends.
struct FlightGuard<A> {
    flights: Arc<DashMap<SnapshotKey, InFlight<A>>>,
    key: SnapshotKey,
    id: Uuid,
}

impl<A> Drop for FlightGuard<A> {
    fn drop(&mut self) {
        // Only remove our own marker; a newer flight may already own the key.
        self.flights.remove_if(&self.key, |_, flight| flight.id == self.id);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Owner,
    Joined,
}

/// How a version demand was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Cached snapshot already satisfied the demand.
    Hit,
    /// Nothing was cached; this call loaded the first snapshot.
    FirstLoad,
    /// A refresh ran and reached the requested version.
    Refreshed,
    /// A refresh ran but the store had nothing new enough.
    StaleAfterRefresh,
    /// The artifact is not coordination-managed.
    Unmanaged,
}

impl RefreshOutcome {
    /// Label used for metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            RefreshOutcome::Hit => "hit",
            RefreshOutcome::FirstLoad => "first_load",
            RefreshOutcome::Refreshed => "refreshed",
            RefreshOutcome::StaleAfterRefresh => "stale_after_refresh",
            RefreshOutcome::Unmanaged => "unmanaged",
        }
    }
}

/// Version returned to the caller plus how it was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ensured {
    pub version: ArtifactVersion,
    pub outcome: RefreshOutcome,
}

/// Result of one watch poll across all cached keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollReport {
    pub checked: usize,
    pub refreshed: usize,
    pub failed: usize,
}

/// Read-through cache front with coordinated, coalesced refresh.
pub struct RefreshCoordinator<A: VersionedArtifact> {
    store: Arc<dyn CoordinationStore<A>>,
    cache: Arc<SnapshotCache<A>>,
    flights: Arc<DashMap<SnapshotKey, InFlight<A>>>,
    stats: Arc<RefreshStats>,
    config: RefreshConfig,
}

impl<A: VersionedArtifact> Clone for RefreshCoordinator<A> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
            flights: Arc::clone(&self.flights),
            stats: Arc::clone(&self.stats),
            config: self.config.clone(),
        }
    }
}

impl<A: VersionedArtifact> RefreshCoordinator<A> {
    pub fn new(store: Arc<dyn CoordinationStore<A>>, config: RefreshConfig) -> Self {
        Self {
            store,
            cache: Arc::new(SnapshotCache::new()),
            flights: Arc::new(DashMap::new()),
            stats: Arc::new(RefreshStats::new()),
            config,
        }
    }

    pub fn with_defaults(store: Arc<dyn CoordinationStore<A>>) -> Self {
        Self::new(store, RefreshConfig::default())
    }

    pub fn config(&self) -> &RefreshConfig {
        &self.config
    }

    pub fn cache(&self) -> &SnapshotCache<A> {
        &self.cache
    }

    pub fn store(&self) -> &Arc<dyn CoordinationStore<A>> {
        &self.store
    }

    pub fn stats(&self) -> RefreshStatsSnapshot {
        self.stats.snapshot()
    }

    /// Number of keys with a fetch currently running.
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    /// Current snapshot for `key`, loading it on first access.
    pub async fn snapshot(&self, key: &SnapshotKey) -> VellumResult<Arc<Snapshot<A>>> {
        self.current_or_load(key, self.config.fetch_timeout)
            .await
            .map(|(snapshot, _)| snapshot)
    }

    /// Ensure the cached version for `key` is at least `min_version`.
    ///
    /// Returns the satisfying version, the best version the store had if it
    /// was still behind, or [`UNVERSIONED`] for unmanaged artifacts.
    pub async fn ensure_at_least(
        &self,
        key: &SnapshotKey,
        min_version: ArtifactVersion,
    ) -> VellumResult<ArtifactVersion> {
        self.ensure(key, RefreshRequest::at_least(min_version))
            .await
            .map(|ensured| ensured.version)
    }

    /// Like [`ensure_at_least`](Self::ensure_at_least) with an explicit fetch
    /// timeout. If the call joins a flight another caller started, that
    /// flight's timeout applies.
    pub async fn ensure_at_least_within(
        &self,
        key: &SnapshotKey,
        min_version: ArtifactVersion,
        timeout: Duration,
    ) -> VellumResult<ArtifactVersion> {
        self.ensure(key, RefreshRequest::at_least(min_version).with_timeout(timeout))
            .await
            .map(|ensured| ensured.version)
    }

    /// Ensure a refresh request and report how it was satisfied.
    pub async fn ensure(&self, key: &SnapshotKey, request: RefreshRequest) -> VellumResult<Ensured> {
        let timeout = request.timeout.unwrap_or(self.config.fetch_timeout);
        let (current, loaded) = self.current_or_load(key, timeout).await?;

        if !current.is_coordinated() {
            debug!(key = %key, "Artifact not coordination-managed, skipping refresh");
            return Ok(Ensured {
                version: current.reported_version(),
                outcome: RefreshOutcome::Unmanaged,
            });
        }

        if current.satisfies(request.min_version) {
            let outcome = if loaded {
                RefreshOutcome::FirstLoad
            } else {
                self.stats.record_hit();
                RefreshOutcome::Hit
            };
            debug!(
                key = %key,
                requested = request.min_version,
                current = current.version(),
                "Cached snapshot satisfies request"
            );
            return Ok(Ensured {
                version: current.version(),
                outcome,
            });
        }

        self.refresh(key, request.min_version, timeout, &current).await
    }

    /// Drop the cached snapshot for `key`.
    ///
    /// A flight already running for the key still installs its result.
    pub fn evict(&self, key: &SnapshotKey) -> Option<Arc<Snapshot<A>>> {
        let evicted = self.cache.invalidate(key);
        if let Some(snapshot) = &evicted {
            info!(key = %key, version = snapshot.version(), "Evicted cached snapshot");
        }
        evicted
    }

    /// Compare every cached key against the store and refresh the ones that
    /// are behind.
    ///
    /// Unmanaged snapshots are checked too: their reported version stays
    /// [`UNVERSIONED`], but the cached artifact still follows the store.
    pub async fn poll_once(&self) -> PollReport {
        let mut report = PollReport::default();

        for key in self.cache.keys() {
            let Some(current) = self.cache.read(&key) else {
                continue;
            };
            report.checked += 1;

            let probe = tokio::time::timeout(self.config.fetch_timeout, self.store.current_version(&key))
                .await
                .unwrap_or_else(|_| {
                    Err(CoordinationError::Timeout {
                        key: key.to_string(),
                        after: self.config.fetch_timeout,
                    })
                });

            match probe {
                Ok(Some(remote)) if remote > current.version() => {
                    match self.refresh(&key, remote, self.config.fetch_timeout, &current).await {
                        Ok(_) => report.refreshed += 1,
                        Err(e) => {
                            warn!(key = %key, error = %e, "Watch refresh failed");
                            report.failed += 1;
                        }
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(key = %key, error = %e, "Watch version probe failed");
                    report.failed += 1;
                }
            }
        }

        report
    }

    /// Cached snapshot, or a coalesced first load. The flag is true when this
    /// call performed or joined the load.
    async fn current_or_load(
        &self,
        key: &SnapshotKey,
        timeout: Duration,
    ) -> VellumResult<(Arc<Snapshot<A>>, bool)> {
        if let Some(snapshot) = self.cache.read(key) {
            return Ok((snapshot, false));
        }

        let (flight, role, _) = self.join_or_start(key, UNVERSIONED, timeout);
        match role {
            Role::Owner => {
                info!(key = %key, "Loading snapshot on first access");
                self.stats.record_first_load();
            }
            Role::Joined => self.stats.record_coalesced(),
        }

        match flight.await {
            Ok(snapshot) => Ok((self.freshest(key, snapshot), true)),
            Err(source) => {
                if role == Role::Owner {
                    self.stats.record_failure();
                }
                warn!(key = %key, error = %source, "First load failed with nothing cached");
                Err(VellumError::Coordination(source))
            }
        }
    }

    async fn refresh(
        &self,
        key: &SnapshotKey,
        min_version: ArtifactVersion,
        timeout: Duration,
        current: &Arc<Snapshot<A>>,
    ) -> VellumResult<Ensured> {
        let mut retried = false;

        loop {
            let (flight, role, flight_target) = self.join_or_start(key, min_version, timeout);
            match role {
                Role::Owner => {
                    info!(
                        key = %key,
                        requested = min_version,
                        current = current.version(),
                        "Refreshing snapshot from coordination store"
                    );
                    self.stats.record_refresh();
                }
                Role::Joined => {
                    debug!(
                        key = %key,
                        requested = min_version,
                        flight_target,
                        "Joining in-flight refresh"
                    );
                    self.stats.record_coalesced();
                }
            }

            let snapshot = match flight.await {
                Ok(snapshot) => self.freshest(key, snapshot),
                Err(source) => {
                    if role == Role::Owner {
                        self.stats.record_failure();
                    }
                    let last_known_version = self
                        .cache
                        .read(key)
                        .map_or(current.version(), |s| s.version());
                    warn!(
                        key = %key,
                        requested = min_version,
                        last_known_version,
                        error = %source,
                        "Refresh failed, serving last known snapshot"
                    );
                    return Err(VellumError::RefreshUnavailable {
                        key: key.to_string(),
                        requested: min_version,
                        last_known_version,
                        source,
                    });
                }
            };

            if snapshot.satisfies(min_version) {
                if role == Role::Owner {
                    info!(key = %key, version = snapshot.version(), "Snapshot refreshed");
                }
                return Ok(Ensured {
                    version: snapshot.version(),
                    outcome: RefreshOutcome::Refreshed,
                });
            }

            // Joined a flight aimed lower than our demand: one more round.
            if role == Role::Joined && flight_target < min_version && !retried {
                retried = true;
                continue;
            }

            self.stats.record_stale();
            warn!(
                key = %key,
                requested = min_version,
                current = snapshot.version(),
                "Store version still below requested version after refresh"
            );
            return Ok(Ensured {
                version: snapshot.version(),
                outcome: RefreshOutcome::StaleAfterRefresh,
            });
        }
    }

    /// The newer of a flight result and whatever the cache holds now.
    fn freshest(&self, key: &SnapshotKey, fetched: Arc<Snapshot<A>>) -> Arc<Snapshot<A>> {
        match self.cache.read(key) {
            Some(cached) if cached.is_newer_than(&fetched) => cached,
            _ => fetched,
        }
    }

    fn join_or_start(
        &self,
        key: &SnapshotKey,
        target: ArtifactVersion,
        timeout: Duration,
    ) -> (FlightFuture<A>, Role, ArtifactVersion) {
        match self.flights.entry(key.clone()) {
            Entry::Occupied(occupied) => {
                let flight = occupied.get();
                (flight.future.clone(), Role::Joined, flight.target)
            }
            Entry::Vacant(vacant) => {
                let id = Uuid::now_v7();
                let future = self.spawn_flight(key.clone(), target, timeout, id);
                // The flight task cannot release its marker before this insert:
                // its removal waits on the shard lock held by `vacant`.
                vacant.insert(InFlight {
                    id,
                    target,
                    future: future.clone(),
                });
                (future, Role::Owner, target)
            }
        }
    }

    fn spawn_flight(
        &self,
        key: SnapshotKey,
        target: ArtifactVersion,
        timeout: Duration,
        id: Uuid,
    ) -> FlightFuture<A> {
        let guard = FlightGuard {
            flights: Arc::clone(&self.flights),
            key: key.clone(),
            id,
        };
        let store = Arc::clone(&self.store);
        let cache = Arc::clone(&self.cache);

        let handle = tokio::spawn(async move {
            let _guard = guard;
            let fetched = match tokio::time::timeout(timeout, store.fetch_latest(&key, target)).await
            {
                Ok(Ok(fetched)) => fetched,
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(CoordinationError::Timeout {
                        key: key.to_string(),
                        after: timeout,
                    })
                }
            };
            Ok(cache.swap_if_newer(&key, Arc::new(Snapshot::from(fetched))))
        });

        async move {
            match handle.await {
                Ok(result) => result,
                Err(join_err) => Err(CoordinationError::Unavailable {
                    reason: format!("refresh task ended abnormally: {}", join_err),
                }),
            }
        }
        .boxed()
        .shared()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordination::{CoordinationResult, InMemoryCoordinationStore};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vellum_core::{FieldDefinition, IndexSchema, Versioned};

    fn key() -> SnapshotKey {
        SnapshotKey::collection("books").expect("valid key")
    }

    fn schema() -> Arc<IndexSchema> {
        Arc::new(IndexSchema::new("books", "id").with_field(FieldDefinition::new("id", "string")))
    }

    async fn store_at(version: ArtifactVersion) -> Arc<InMemoryCoordinationStore<IndexSchema>> {
        let store = Arc::new(InMemoryCoordinationStore::new());
        store.insert_at(key(), version, schema()).await;
        store
    }

    /// Counts fetches and optionally delays each one.
    struct CountingStore {
        inner: Arc<InMemoryCoordinationStore<IndexSchema>>,
        fetches: AtomicUsize,
        delay: Duration,
    }

    impl CountingStore {
        fn new(inner: Arc<InMemoryCoordinationStore<IndexSchema>>, delay: Duration) -> Self {
            Self {
                inner,
                fetches: AtomicUsize::new(0),
                delay,
            }
        }

        fn fetches(&self) -> usize {
            self.fetches.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CoordinationStore<IndexSchema> for CountingStore {
        async fn fetch_latest(
            &self,
            key: &SnapshotKey,
            min_version: ArtifactVersion,
        ) -> CoordinationResult<Versioned<IndexSchema>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            self.inner.fetch_latest(key, min_version).await
        }

        async fn current_version(
            &self,
            key: &SnapshotKey,
        ) -> CoordinationResult<Option<ArtifactVersion>> {
            self.inner.current_version(key).await
        }

        async fn publish(
            &self,
            key: &SnapshotKey,
            artifact: Arc<IndexSchema>,
            expected_version: Option<ArtifactVersion>,
        ) -> CoordinationResult<ArtifactVersion> {
            self.inner.publish(key, artifact, expected_version).await
        }

        async fn health_check(&self) -> CoordinationResult<()> {
            self.inner.health_check().await
        }
    }

    #[tokio::test]
    async fn test_first_access_loads_once() {
        let inner = store_at(3).await;
        let store = Arc::new(CountingStore::new(inner, Duration::ZERO));
        let coordinator = RefreshCoordinator::with_defaults(store.clone());

        assert_eq!(coordinator.ensure_at_least(&key(), UNVERSIONED).await.ok(), Some(3));
        assert_eq!(coordinator.ensure_at_least(&key(), 0).await.ok(), Some(3));
        assert_eq!(store.fetches(), 1);

        let stats = coordinator.stats();
        assert_eq!(stats.first_loads, 1);
        assert_eq!(stats.cache_hits, 1);
    }

    #[tokio::test]
    async fn test_scenario_refresh_then_failure_keeps_snapshot() {
        let inner = store_at(3).await;
        let store = Arc::new(CountingStore::new(inner.clone(), Duration::ZERO));
        let coordinator = RefreshCoordinator::with_defaults(store.clone());

        assert_eq!(coordinator.ensure_at_least(&key(), -1).await.ok(), Some(3));
        assert_eq!(store.fetches(), 1);

        inner.insert_at(key(), 5, schema()).await;
        assert_eq!(coordinator.ensure_at_least(&key(), 5).await.ok(), Some(5));
        assert_eq!(store.fetches(), 2);

        assert_eq!(coordinator.ensure_at_least(&key(), -1).await.ok(), Some(5));
        assert_eq!(store.fetches(), 2);

        inner.set_available(false);
        let err = coordinator
            .ensure_at_least(&key(), 9)
            .await
            .expect_err("store is down");
        match err {
            VellumError::RefreshUnavailable {
                requested,
                last_known_version,
                ..
            } => {
                assert_eq!(requested, 9);
                assert_eq!(last_known_version, 5);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(coordinator.cache().read(&key()).map(|s| s.version()), Some(5));
        assert_eq!(coordinator.in_flight(), 0);

        // The next refresh proceeds normally once the store is back.
        inner.set_available(true);
        inner.insert_at(key(), 9, schema()).await;
        assert_eq!(coordinator.ensure_at_least(&key(), 9).await.ok(), Some(9));
        assert_eq!(coordinator.stats().failures, 1);
    }

    #[tokio::test]
    async fn test_stale_after_refresh_returns_best_version() {
        let inner = store_at(4).await;
        let coordinator = RefreshCoordinator::with_defaults(inner);

        let ensured = coordinator
            .ensure(&key(), RefreshRequest::at_least(10))
            .await
            .expect("refresh runs");
        assert_eq!(ensured.version, 4);
        assert_eq!(ensured.outcome, RefreshOutcome::StaleAfterRefresh);
        assert_eq!(coordinator.stats().stale_after_refresh, 1);
    }

    #[tokio::test]
    async fn test_unmanaged_reports_sentinel_without_refresh() {
        let inner = Arc::new(InMemoryCoordinationStore::new());
        inner
            .insert_at(key(), 2, Arc::new(IndexSchema::new("books", "id").unmanaged()))
            .await;
        let store = Arc::new(CountingStore::new(inner, Duration::ZERO));
        let coordinator = RefreshCoordinator::with_defaults(store.clone());

        assert_eq!(coordinator.ensure_at_least(&key(), 100).await.ok(), Some(UNVERSIONED));
        assert_eq!(coordinator.ensure_at_least(&key(), 100).await.ok(), Some(UNVERSIONED));
        assert_eq!(store.fetches(), 1);
    }

    #[tokio::test]
    async fn test_first_load_failure_is_coordination_error() {
        let inner = Arc::new(InMemoryCoordinationStore::<IndexSchema>::new());
        let coordinator = RefreshCoordinator::with_defaults(inner);

        let err = coordinator.snapshot(&key()).await.expect_err("nothing stored");
        assert!(matches!(
            err,
            VellumError::Coordination(CoordinationError::NotFound { .. })
        ));
        assert!(coordinator.cache().is_empty());
        assert_eq!(coordinator.in_flight(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_callers_share_one_fetch() {
        let inner = store_at(3).await;
        let store = Arc::new(CountingStore::new(inner.clone(), Duration::from_millis(50)));
        let coordinator = RefreshCoordinator::with_defaults(store.clone());
        coordinator.snapshot(&key()).await.expect("first load");

        inner.insert_at(key(), 8, schema()).await;
        let mut handles = Vec::new();
        for _ in 0..16 {
            let c = coordinator.clone();
            handles.push(tokio::spawn(async move { c.ensure_at_least(&key(), 8).await }));
        }
        for handle in handles {
            assert_eq!(handle.await.expect("task").ok(), Some(8));
        }

        assert_eq!(store.fetches(), 2);
        let stats = coordinator.stats();
        assert_eq!(stats.refreshes, 1);
        // Stragglers arriving after the swap are plain hits.
        assert_eq!(stats.coalesced_waits + stats.cache_hits, 15);
    }

    #[tokio::test]
    async fn test_timeout_reports_last_known_version() {
        let inner = store_at(1).await;
        let store = Arc::new(CountingStore::new(inner.clone(), Duration::from_millis(200)));
        let coordinator = RefreshCoordinator::new(
            store,
            RefreshConfig::default().with_fetch_timeout(Duration::from_secs(5)),
        );
        coordinator.snapshot(&key()).await.expect("first load");

        let err = coordinator
            .ensure_at_least_within(&key(), 2, Duration::from_millis(10))
            .await
            .expect_err("times out");
        match err {
            VellumError::RefreshUnavailable {
                last_known_version,
                source: CoordinationError::Timeout { .. },
                ..
            } => assert_eq!(last_known_version, 1),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_evict_forces_reload() {
        let inner = store_at(2).await;
        let store = Arc::new(CountingStore::new(inner, Duration::ZERO));
        let coordinator = RefreshCoordinator::with_defaults(store.clone());

        coordinator.snapshot(&key()).await.expect("load");
        assert_eq!(coordinator.evict(&key()).map(|s| s.version()), Some(2));
        assert!(coordinator.evict(&key()).is_none());

        coordinator.snapshot(&key()).await.expect("reload");
        assert_eq!(store.fetches(), 2);
    }

    #[tokio::test]
    async fn test_poll_once_refreshes_behind_keys() {
        let inner = store_at(1).await;
        let coordinator = RefreshCoordinator::with_defaults(inner.clone());
        coordinator.snapshot(&key()).await.expect("load");

        assert_eq!(
            coordinator.poll_once().await,
            PollReport {
                checked: 1,
                refreshed: 0,
                failed: 0
            }
        );

        inner.insert_at(key(), 6, schema()).await;
        let report = coordinator.poll_once().await;
        assert_eq!(report.refreshed, 1);
        assert_eq!(coordinator.cache().read(&key()).map(|s| s.version()), Some(6));

        inner.set_available(false);
        assert_eq!(coordinator.poll_once().await.failed, 1);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(RefreshOutcome::Hit.as_str(), "hit");
        assert_eq!(
            RefreshOutcome::StaleAfterRefresh.as_str(),
            "stale_after_refresh"
        );
    }
}
