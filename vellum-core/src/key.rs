//! Snapshot keys identifying which logical artifact a cache entry holds.
//!
//! A node caches one schema snapshot per core or per collection. The key
//! carries that scope explicitly so `cores/books` and `collections/books`
//! never alias each other in the cache.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// KEY SCOPE
// ============================================================================

/// Which kind of container owns the cached artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyScope {
    /// A single core hosted on this node.
    Core,
    /// A collection spanning many nodes.
    Collection,
}

impl KeyScope {
    /// Path segment used in REST routes and key display.
    pub fn as_path_segment(&self) -> &'static str {
        match self {
            KeyScope::Core => "cores",
            KeyScope::Collection => "collections",
        }
    }

    /// Parse a REST path segment (`cores` or `collections`).
    pub fn from_path_segment(s: &str) -> Result<Self, KeyParseError> {
        match s {
            "cores" => Ok(KeyScope::Core),
            "collections" => Ok(KeyScope::Collection),
            _ => Err(KeyParseError::UnknownScope(s.to_string())),
        }
    }
}

impl fmt::Display for KeyScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_path_segment())
    }
}

impl FromStr for KeyScope {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_path_segment(s)
    }
}

// ============================================================================
// SNAPSHOT KEY
// ============================================================================

/// Error when parsing or constructing an invalid snapshot key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyParseError {
    UnknownScope(String),
    EmptyName,
    InvalidName(String),
    Malformed(String),
}

impl fmt::Display for KeyParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyParseError::UnknownScope(s) => {
                write!(f, "Unknown key scope '{}', expected cores or collections", s)
            }
            KeyParseError::EmptyName => write!(f, "Key name must not be empty"),
            KeyParseError::InvalidName(n) => write!(f, "Key name '{}' must not contain '/'", n),
            KeyParseError::Malformed(s) => write!(f, "Malformed snapshot key: {}", s),
        }
    }
}

impl std::error::Error for KeyParseError {}

/// Identity of one cached artifact: a scope plus a container name.
///
/// Deserialization applies the same name checks as [`SnapshotKey::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "RawSnapshotKey")]
pub struct SnapshotKey {
    scope: KeyScope,
    name: String,
}

#[derive(Deserialize)]
struct RawSnapshotKey {
    scope: KeyScope,
    name: String,
}

impl TryFrom<RawSnapshotKey> for SnapshotKey {
    type Error = KeyParseError;

    fn try_from(raw: RawSnapshotKey) -> Result<Self, Self::Error> {
        Self::new(raw.scope, raw.name)
    }
}

impl SnapshotKey {
    /// Create a key, validating the name.
    pub fn new(scope: KeyScope, name: impl Into<String>) -> Result<Self, KeyParseError> {
        let name = name.into();
        if name.is_empty() {
            return Err(KeyParseError::EmptyName);
        }
        if name.contains('/') {
            return Err(KeyParseError::InvalidName(name));
        }
        Ok(Self { scope, name })
    }

    /// Key for a collection.
    pub fn collection(name: impl Into<String>) -> Result<Self, KeyParseError> {
        Self::new(KeyScope::Collection, name)
    }

    /// Key for a core.
    pub fn core(name: impl Into<String>) -> Result<Self, KeyParseError> {
        Self::new(KeyScope::Core, name)
    }

    /// Build a key from the `(scope, name)` pair of a REST path.
    pub fn from_path(scope: &str, name: &str) -> Result<Self, KeyParseError> {
        Self::new(KeyScope::from_path_segment(scope)?, name)
    }

    pub fn scope(&self) -> KeyScope {
        self.scope
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope.as_path_segment(), self.name)
    }
}

impl FromStr for SnapshotKey {
    type Err = KeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (scope, name) = s
            .split_once('/')
            .ok_or_else(|| KeyParseError::Malformed(s.to_string()))?;
        Self::from_path(scope, name)
    }
}
