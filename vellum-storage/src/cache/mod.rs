//! Versioned snapshot cache with coordinated refresh.
//!
//! Each key maps to one immutable [`Snapshot`](vellum_core::Snapshot). Readers
//! get an `Arc` handle and keep a consistent view for as long as they hold it;
//! refreshes build a new snapshot and swap the handle only if it is newer.
//!
//! # Layers
//!
//! - [`SnapshotCache`]: atomic read and swap-if-newer, no I/O.
//! - [`RefreshCoordinator`]: "ensure version >= V" with one fetch per key at a
//!   time, shared by every concurrent caller.
//! - [`schema_watch_task`]: optional background poll that refreshes ahead of
//!   demand.
//!
//! # Example
//!
//! ```ignore
//! let coordinator = RefreshCoordinator::with_defaults(store);
//!
//! // No obligation: answer from cache (loading on first access).
//! let v = coordinator.ensure_at_least(&key, -1).await?;
//!
//! // Demand at least version 7, refreshing if the cache is behind.
//! let v = coordinator.ensure_at_least(&key, 7).await?;
//! ```

pub mod coordinator;
pub mod snapshot_cache;
pub mod stats;
pub mod watch;

pub use coordinator::{Ensured, PollReport, RefreshCoordinator, RefreshOutcome};
pub use snapshot_cache::SnapshotCache;
pub use stats::{RefreshStats, RefreshStatsSnapshot};
pub use watch::{schema_watch_task, WatchMetrics, WatchSnapshot};
