//! Error types for Vellum operations

use std::time::Duration;
use thiserror::Error;

use crate::ArtifactVersion;

/// Coordination store errors.
///
/// These are the failures a remote fetch or publish can report. They are
/// `Clone` so a single fetch outcome can be handed to every coalesced waiter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoordinationError {
    #[error("Coordination store unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Fetch of {key} timed out after {after:?}")]
    Timeout { key: String, after: Duration },

    #[error("No artifact stored under {key}")]
    NotFound { key: String },

    #[error("Version conflict on {key}: expected {expected}, found {actual:?}")]
    VersionConflict {
        key: String,
        expected: ArtifactVersion,
        actual: Option<ArtifactVersion>,
    },
}

impl CoordinationError {
    /// Returns true for failures where the store could not answer at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Timeout { .. })
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Validation errors for keys and artifacts.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Duplicate field definition: {name}")]
    DuplicateField { name: String },

    #[error("Unique key {unique_key} does not name a defined field")]
    UnknownUniqueKey { unique_key: String },
}

/// Master error type for all Vellum errors.
#[derive(Debug, Clone, Error)]
pub enum VellumError {
    #[error("Coordination error: {0}")]
    Coordination(#[from] CoordinationError),

    /// A refresh was required but could not complete. The cached snapshot is
    /// untouched and `last_known_version` is still being served.
    #[error(
        "Refresh of {key} to version {requested} failed, last known version {last_known_version}: {source}"
    )]
    RefreshUnavailable {
        key: String,
        requested: ArtifactVersion,
        last_known_version: ArtifactVersion,
        source: CoordinationError,
    },

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl VellumError {
    /// The underlying coordination failure, if any.
    pub fn coordination(&self) -> Option<&CoordinationError> {
        match self {
            Self::Coordination(e) => Some(e),
            Self::RefreshUnavailable { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Result type alias for Vellum operations.
pub type VellumResult<T> = Result<T, VellumError>;

// =============================================================================
// TESTS
// =============================================================================
