//! Vellum Storage - Coordination Store and Snapshot Cache
//!
//! Defines the coordination store abstraction, the versioned snapshot cache
//! with single-flight refresh, and the version query service built on them.

pub mod cache;
pub mod coordination;
pub mod service;

pub use cache::{
    schema_watch_task, Ensured, PollReport, RefreshCoordinator, RefreshOutcome, RefreshStats,
    RefreshStatsSnapshot, SnapshotCache, WatchMetrics, WatchSnapshot,
};
pub use coordination::{CoordinationResult, CoordinationStore, InMemoryCoordinationStore};
pub use service::VersionQueryService;
