//! Immutable versioned snapshots of a coordinated artifact.
//!
//! A [`Snapshot`] is never mutated after construction. Refreshing a cache entry
//! always builds a brand-new snapshot and swaps the handle, so a reader holding
//! an `Arc<Snapshot<A>>` keeps a consistent view for as long as it needs one.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

use crate::error::ValidationError;
use crate::{ArtifactVersion, Timestamp, UNVERSIONED};

/// Whether an artifact's version is tracked by the coordination store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Versioning {
    /// The coordination store owns the version; refresh requests apply.
    Coordinated,
    /// A node-local artifact with no coordinated version. Version queries
    /// report [`UNVERSIONED`] and never trigger a refresh.
    Local,
}

/// Capability every cacheable artifact exposes.
///
/// The cache never inspects the concrete artifact type to decide whether a
/// refresh applies; it asks the artifact.
pub trait VersionedArtifact: Send + Sync + 'static {
    fn versioning(&self) -> Versioning;

    /// Structural check run before an artifact is published.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

/// An artifact as returned by the coordination store.
#[derive(Debug)]
pub struct Versioned<A> {
    pub version: ArtifactVersion,
    pub artifact: Arc<A>,
}

impl<A> Versioned<A> {
    pub fn new(version: ArtifactVersion, artifact: Arc<A>) -> Self {
        Self { version, artifact }
    }
}

impl<A> Clone for Versioned<A> {
    fn clone(&self) -> Self {
        Self {
            version: self.version,
            artifact: Arc::clone(&self.artifact),
        }
    }
}

/// A caller's freshness demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshRequest {
    /// Minimum acceptable version. `<= 0` means no refresh obligation.
    pub min_version: ArtifactVersion,
    /// Per-request fetch timeout; the configured default applies when `None`.
    pub timeout: Option<Duration>,
}

impl Default for RefreshRequest {
    fn default() -> Self {
        Self {
            min_version: UNVERSIONED,
            timeout: None,
        }
    }
}

impl RefreshRequest {
    pub fn at_least(min_version: ArtifactVersion) -> Self {
        Self {
            min_version,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn requires_refresh_check(&self) -> bool {
        crate::requires_refresh_check(self.min_version)
    }
}

/// Immutable `(version, artifact, loaded_at)` triple held by the cache.
#[derive(Debug)]
pub struct Snapshot<A> {
    version: ArtifactVersion,
    artifact: Arc<A>,
    loaded_at: Timestamp,
}

impl<A> Snapshot<A> {
    /// Create a snapshot loaded now.
    pub fn new(version: ArtifactVersion, artifact: Arc<A>) -> Self {
        Self::with_loaded_at(version, artifact, Utc::now())
    }

    /// Create a snapshot with an explicit load timestamp.
    pub fn with_loaded_at(version: ArtifactVersion, artifact: Arc<A>, loaded_at: Timestamp) -> Self {
        Self {
            version,
            artifact,
            loaded_at,
        }
    }

    pub fn version(&self) -> ArtifactVersion {
        self.version
    }

    pub fn artifact(&self) -> &Arc<A> {
        &self.artifact
    }

    pub fn loaded_at(&self) -> Timestamp {
        self.loaded_at
    }

    /// How long ago this snapshot was loaded.
    pub fn age(&self) -> Duration {
        (Utc::now() - self.loaded_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Check if this snapshot is strictly newer than another.
    pub fn is_newer_than(&self, other: &Snapshot<A>) -> bool {
        self.version > other.version
    }

    /// Check if this snapshot satisfies a minimum version requirement.
    ///
    /// Requirements `<= 0` are always satisfied.
    pub fn satisfies(&self, min_version: ArtifactVersion) -> bool {
        !crate::requires_refresh_check(min_version) || self.version >= min_version
    }
}

impl<A: VersionedArtifact> Snapshot<A> {
    pub fn versioning(&self) -> Versioning {
        self.artifact.versioning()
    }

    pub fn is_coordinated(&self) -> bool {
        self.versioning() == Versioning::Coordinated
    }

    /// Version as reported to callers: the coordinated version, or
    /// [`UNVERSIONED`] for local artifacts.
    pub fn reported_version(&self) -> ArtifactVersion {
        match self.versioning() {
            Versioning::Coordinated => self.version,
            Versioning::Local => UNVERSIONED,
        }
    }
}

impl<A> From<Versioned<A>> for Snapshot<A> {
    fn from(v: Versioned<A>) -> Self {
        Snapshot::new(v.version, v.artifact)
    }
}
