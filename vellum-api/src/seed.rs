//! Startup schema seeding.
//!
//! Publishes schema files to the coordination store so a fresh node has
//! schemas to serve:
//!
//! - `<dir>/<collection>.json` seeds `collections/<collection>`
//! - `<dir>/cores/<core>.json` seeds `cores/<core>`
//!
//! Collections go first, then cores, each in file name order. Anything
//! without a `.json` extension is skipped.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};
use vellum_core::{ArtifactVersion, IndexSchema, KeyParseError, KeyScope, SnapshotKey, VellumError};

use crate::error::ApiError;
use crate::state::SchemaService;

/// Subdirectory holding core schemas.
const CORES_DIR: &str = "cores";

/// Seeding failures. Any one aborts startup.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid schema file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid schema key from {}: {source}", path.display())]
    Key {
        path: PathBuf,
        #[source]
        source: KeyParseError,
    },

    #[error("Failed to publish {key}: {source}")]
    Publish {
        key: SnapshotKey,
        #[source]
        source: VellumError,
    },
}

impl From<SeedError> for ApiError {
    fn from(err: SeedError) -> Self {
        ApiError::internal_error(err.to_string())
    }
}

/// One published seed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seeded {
    pub key: SnapshotKey,
    pub version: ArtifactVersion,
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> SeedError {
    let path = path.to_path_buf();
    move |source| SeedError::Io { path, source }
}

/// `.json` files directly under `dir`, sorted.
async fn schema_files(dir: &Path) -> Result<Vec<PathBuf>, SeedError> {
    let mut entries = tokio::fs::read_dir(dir).await.map_err(io_err(dir))?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_err(dir))? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("json") {
            files.push(path);
        } else {
            debug!(path = %path.display(), "Skipping non-schema file");
        }
    }
    files.sort();
    Ok(files)
}

async fn seed_file(
    service: &SchemaService,
    scope: KeyScope,
    path: PathBuf,
) -> Result<Seeded, SeedError> {
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let key = SnapshotKey::new(scope, name).map_err(|source| SeedError::Key {
        path: path.clone(),
        source,
    })?;

    let raw = tokio::fs::read(&path).await.map_err(io_err(&path))?;
    let schema: IndexSchema = serde_json::from_slice(&raw).map_err(|source| SeedError::Parse {
        path: path.clone(),
        source,
    })?;

    let version = service
        .publish(&key, schema, None)
        .await
        .map_err(|source| SeedError::Publish {
            key: key.clone(),
            source,
        })?;
    info!(key = %key, version, path = %path.display(), "Seeded schema");
    Ok(Seeded { key, version })
}

/// Publish every schema file in `dir` and its `cores` subdirectory.
pub async fn seed_schemas(service: &SchemaService, dir: &Path) -> Result<Vec<Seeded>, SeedError> {
    let mut plan: Vec<(KeyScope, PathBuf)> = schema_files(dir)
        .await?
        .into_iter()
        .map(|path| (KeyScope::Collection, path))
        .collect();

    let cores = dir.join(CORES_DIR);
    if tokio::fs::metadata(&cores).await.is_ok_and(|m| m.is_dir()) {
        plan.extend(
            schema_files(&cores)
                .await?
                .into_iter()
                .map(|path| (KeyScope::Core, path)),
        );
    }

    let mut seeded = Vec::with_capacity(plan.len());
    for (scope, path) in plan {
        seeded.push(seed_file(service, scope, path).await?);
    }
    Ok(seeded)
}
