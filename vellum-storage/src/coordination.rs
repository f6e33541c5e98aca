//! Coordination store abstraction.
//!
//! The coordination store is the durable source of truth for every artifact's
//! current version and content. Nodes only ever read through it; the cache
//! layer never assumes the store is reachable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use vellum_core::{ArtifactVersion, CoordinationError, SnapshotKey, Versioned};

/// Result type for coordination store calls.
pub type CoordinationResult<T> = Result<T, CoordinationError>;

/// Source of truth for versioned artifacts.
///
/// Implementations must be safe to call concurrently. The cache guarantees at
/// most one in-flight `fetch_latest` per key per node, but different keys and
/// different nodes call in parallel.
#[async_trait]
pub trait CoordinationStore<A>: Send + Sync + 'static
where
    A: Send + Sync + 'static,
{
    /// Fetch the latest stored artifact for `key`.
    ///
    /// `min_version` is a hint: an implementation backed by a lagging replica
    /// may use it to wait or sync before answering. The returned version may
    /// still be lower than `min_version`.
    async fn fetch_latest(
        &self,
        key: &SnapshotKey,
        min_version: ArtifactVersion,
    ) -> CoordinationResult<Versioned<A>>;

    /// Current version for `key` without transferring the artifact.
    ///
    /// Returns `Ok(None)` when nothing is stored under the key.
    async fn current_version(&self, key: &SnapshotKey)
        -> CoordinationResult<Option<ArtifactVersion>>;

    /// Store a new artifact version.
    ///
    /// With `expected_version = Some(v)` the write only succeeds if the
    /// stored version is exactly `v`. Returns the newly assigned version.
    async fn publish(
        &self,
        key: &SnapshotKey,
        artifact: Arc<A>,
        expected_version: Option<ArtifactVersion>,
    ) -> CoordinationResult<ArtifactVersion>;

    /// Check that the store is reachable.
    async fn health_check(&self) -> CoordinationResult<()>;
}

/// In-memory coordination store.
///
/// Versions start at 0 on first publish and increase by one per publish.
/// Uses tokio::sync::RwLock for safe async access.
pub struct InMemoryCoordinationStore<A> {
    entries: tokio::sync::RwLock<HashMap<SnapshotKey, Versioned<A>>>,
    available: AtomicBool,
}

impl<A> Default for InMemoryCoordinationStore<A> {
    fn default() -> Self {
        Self {
            entries: tokio::sync::RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }
}

impl<A> InMemoryCoordinationStore<A> {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate the store becoming (un)reachable.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> CoordinationResult<()> {
        if self.is_available() {
            Ok(())
        } else {
            Err(CoordinationError::Unavailable {
                reason: "in-memory store marked unavailable".to_string(),
            })
        }
    }

    /// Install an artifact at an exact version, bypassing compare-and-set.
    pub async fn insert_at(&self, key: SnapshotKey, version: ArtifactVersion, artifact: Arc<A>) {
        self.entries
            .write()
            .await
            .insert(key, Versioned::new(version, artifact));
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl<A> CoordinationStore<A> for InMemoryCoordinationStore<A>
where
    A: Send + Sync + 'static,
{
    async fn fetch_latest(
        &self,
        key: &SnapshotKey,
        _min_version: ArtifactVersion,
    ) -> CoordinationResult<Versioned<A>> {
        self.check_available()?;
        self.entries
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| CoordinationError::NotFound {
                key: key.to_string(),
            })
    }

    async fn current_version(
        &self,
        key: &SnapshotKey,
    ) -> CoordinationResult<Option<ArtifactVersion>> {
        self.check_available()?;
        Ok(self.entries.read().await.get(key).map(|v| v.version))
    }

    async fn publish(
        &self,
        key: &SnapshotKey,
        artifact: Arc<A>,
        expected_version: Option<ArtifactVersion>,
    ) -> CoordinationResult<ArtifactVersion> {
        self.check_available()?;
        let mut entries = self.entries.write().await;
        let current = entries.get(key).map(|v| v.version);

        if let Some(expected) = expected_version {
            if current != Some(expected) {
                return Err(CoordinationError::VersionConflict {
                    key: key.to_string(),
                    expected,
                    actual: current,
                });
            }
        }

        let next = current.map_or(0, |v| v + 1);
        entries.insert(key.clone(), Versioned::new(next, artifact));
        Ok(next)
    }

    async fn health_check(&self) -> CoordinationResult<()> {
        self.check_available()
    }
}
