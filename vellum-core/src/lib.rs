//! Vellum Core - Snapshot and Schema Types
//!
//! Pure data structures shared by every Vellum crate: snapshot keys, immutable
//! versioned snapshots, the index schema artifact, refresh configuration and
//! the error taxonomy. This crate performs no I/O.

pub mod config;
pub mod error;
pub mod key;
pub mod schema;
pub mod snapshot;

use chrono::{DateTime, Utc};

pub use config::RefreshConfig;
pub use error::{
    ConfigError, CoordinationError, ValidationError, VellumError, VellumResult,
};
pub use key::{KeyParseError, KeyScope, SnapshotKey};
pub use schema::{FieldDefinition, IndexSchema, SimilarityConfig};
pub use snapshot::{RefreshRequest, Snapshot, Versioned, VersionedArtifact, Versioning};

// ============================================================================
// VERSION TYPES
// ============================================================================

/// Coordination version number of a stored artifact.
///
/// The coordination store assigns `0` to the first published version and
/// increments by one on each subsequent publish.
pub type ArtifactVersion = i32;

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Sentinel version reported for artifacts that are not coordination-managed.
///
/// Also the default `refreshIfBelowVersion`, meaning "no refresh obligation".
pub const UNVERSIONED: ArtifactVersion = -1;

/// Returns true if `min_version` places an obligation on the cache.
///
/// Any value `<= 0` means "whatever is cached is fine".
pub fn requires_refresh_check(min_version: ArtifactVersion) -> bool {
    min_version > 0
}
