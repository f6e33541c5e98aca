//! Shared application state for Axum routers.

use std::sync::Arc;
use std::time::Instant;

use vellum_core::IndexSchema;
use vellum_storage::VersionQueryService;

/// Version query service specialised to index schemas.
pub type SchemaService = VersionQueryService<IndexSchema>;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    /// Schema cache front. Every handler reads and publishes through it.
    pub service: Arc<SchemaService>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(service: Arc<SchemaService>) -> Self {
        Self {
            service,
            start_time: Instant::now(),
        }
    }
}

crate::impl_from_ref!(Arc<SchemaService>, service);
crate::impl_from_ref!(Instant, start_time);
