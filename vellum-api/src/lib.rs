//! Vellum API - REST Layer for the Schema Version Cache
//!
//! Exposes the schema admin surface over Axum: schema reads, publishes and
//! the coordination-version endpoint that lets callers demand a minimum
//! schema version before proceeding. Health checks and Prometheus metrics are
//! served alongside.

pub mod config;
pub mod constants;
pub mod error;
pub mod extractors;
pub mod macros;
pub mod routes;
pub mod seed;
pub mod state;
pub mod telemetry;
pub mod types;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_api_router;
pub use seed::{seed_schemas, SeedError, Seeded};
pub use state::{AppState, SchemaService};
pub use types::*;
