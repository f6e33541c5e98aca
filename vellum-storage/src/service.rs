//! Version query service.
//!
//! The externally callable surface over the refresh coordinator: version
//! queries with an optional minimum, artifact reads, and publishes that write
//! through the coordination store and then bring the local cache up to date.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info};
use vellum_core::{
    ArtifactVersion, CoordinationError, IndexSchema, RefreshConfig, RefreshRequest, Snapshot,
    SnapshotKey, VellumError, VellumResult, VersionedArtifact,
};

use crate::cache::{Ensured, PollReport, RefreshCoordinator, RefreshStatsSnapshot};
use crate::coordination::CoordinationStore;

/// Version queries, artifact reads and publishes for one artifact type.
pub struct VersionQueryService<A: VersionedArtifact> {
    coordinator: RefreshCoordinator<A>,
}

impl<A: VersionedArtifact> Clone for VersionQueryService<A> {
    fn clone(&self) -> Self {
        Self {
            coordinator: self.coordinator.clone(),
        }
    }
}

impl<A: VersionedArtifact> VersionQueryService<A> {
    pub fn new(store: Arc<dyn CoordinationStore<A>>, config: RefreshConfig) -> Self {
        Self {
            coordinator: RefreshCoordinator::new(store, config),
        }
    }

    pub fn coordinator(&self) -> &RefreshCoordinator<A> {
        &self.coordinator
    }

    /// Version satisfying `min_version`, refreshing first if needed.
    ///
    /// `min_version <= 0` never triggers a refresh. Unmanaged artifacts report
    /// [`vellum_core::UNVERSIONED`].
    pub async fn get_version(
        &self,
        key: &SnapshotKey,
        min_version: ArtifactVersion,
    ) -> VellumResult<ArtifactVersion> {
        self.coordinator.ensure_at_least(key, min_version).await
    }

    /// Like [`get_version`](Self::get_version), reporting how the answer was
    /// obtained and honoring the request's timeout.
    pub async fn get_version_with(
        &self,
        key: &SnapshotKey,
        request: RefreshRequest,
    ) -> VellumResult<Ensured> {
        self.coordinator.ensure(key, request).await
    }

    /// Current snapshot, loading it on first access.
    pub async fn get_snapshot(&self, key: &SnapshotKey) -> VellumResult<Arc<Snapshot<A>>> {
        self.coordinator.snapshot(key).await
    }

    /// Cached version without any I/O.
    pub fn cached_version(&self, key: &SnapshotKey) -> Option<ArtifactVersion> {
        self.coordinator.cache().read(key).map(|s| s.version())
    }

    /// Write `artifact` through the coordination store, then refresh the
    /// local cache to the new version.
    ///
    /// With `expected_version` set the write is a compare-and-set and fails
    /// with a version conflict if another writer got there first.
    pub async fn publish(
        &self,
        key: &SnapshotKey,
        artifact: A,
        expected_version: Option<ArtifactVersion>,
    ) -> VellumResult<ArtifactVersion> {
        artifact.validate()?;

        let artifact = Arc::new(artifact);
        let timeout = self.coordinator.config().fetch_timeout;
        let published = tokio::time::timeout(
            timeout,
            self.coordinator
                .store()
                .publish(key, Arc::clone(&artifact), expected_version),
        )
        .await
        .unwrap_or_else(|_| {
            Err(CoordinationError::Timeout {
                key: key.to_string(),
                after: timeout,
            })
        })?;

        info!(key = %key, version = published, "Published artifact");

        // Install what was written rather than re-reading it. A concurrent
        // writer's newer snapshot, if already cached, is kept.
        let installed = self
            .coordinator
            .cache()
            .swap_if_newer(key, Arc::new(Snapshot::new(published, artifact)));
        if installed.version() > published {
            debug!(key = %key, published, cached = installed.version(), "Cache already ahead of publish");
        }
        Ok(published)
    }

    /// Drop the cached snapshot for `key`. Returns the evicted version.
    pub fn evict(&self, key: &SnapshotKey) -> Option<ArtifactVersion> {
        self.coordinator.evict(key).map(|s| s.version())
    }

    pub fn stats(&self) -> RefreshStatsSnapshot {
        self.coordinator.stats()
    }

    /// Number of keys with a cached snapshot.
    pub fn cached_keys(&self) -> usize {
        self.coordinator.cache().len()
    }

    pub async fn poll_once(&self) -> PollReport {
        self.coordinator.poll_once().await
    }

    /// Check the coordination store is reachable within the fetch timeout.
    pub async fn health_check(&self) -> VellumResult<()> {
        let timeout = self.coordinator.config().fetch_timeout;
        tokio::time::timeout(timeout, self.coordinator.store().health_check())
            .await
            .unwrap_or_else(|_| {
                Err(CoordinationError::Unavailable {
                    reason: format!("health check timed out after {:?}", timeout),
                })
            })
            .map_err(VellumError::from)
    }
}

impl VersionQueryService<IndexSchema> {
    async fn schema(&self, key: &SnapshotKey) -> VellumResult<Arc<IndexSchema>> {
        self.get_snapshot(key)
            .await
            .map(|snapshot| Arc::clone(snapshot.artifact()))
    }

    /// Full schema rendered as named properties.
    pub async fn schema_info(&self, key: &SnapshotKey) -> VellumResult<Value> {
        Ok(self.schema(key).await?.named_properties())
    }

    pub async fn schema_similarity(&self, key: &SnapshotKey) -> VellumResult<Value> {
        Ok(self.schema(key).await?.similarity.named_properties())
    }

    pub async fn schema_unique_key(&self, key: &SnapshotKey) -> VellumResult<String> {
        Ok(self.schema(key).await?.unique_key.clone())
    }

    /// Schema format version (not the coordination version).
    pub async fn schema_format_version(&self, key: &SnapshotKey) -> VellumResult<f32> {
        Ok(self.schema(key).await?.format_version)
    }
}
