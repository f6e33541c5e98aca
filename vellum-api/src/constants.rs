//! Constants for the Vellum API
//!
//! This module contains all constant values used throughout the API.
//! Centralizing constants makes them easy to find, modify, and test.

// ============================================================================
// SERVER
// ============================================================================

/// Default bind host
pub const DEFAULT_BIND_HOST: &str = "0.0.0.0";

/// Default listen port
pub const DEFAULT_PORT: u16 = 8983;

/// Prefix for every versioned REST route
pub const API_PREFIX: &str = "/api/v1";

/// Upper bound on concurrently served requests
pub const DEFAULT_MAX_CONCURRENT_REQUESTS: usize = 1024;

// ============================================================================
// CORS
// ============================================================================

/// Default CORS max age in seconds (24 hours)
pub const DEFAULT_CORS_MAX_AGE_SECS: u64 = 86400;

// ============================================================================
// REFRESH
// ============================================================================

/// Default bound on a coordination-store fetch, in milliseconds
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 10_000;

/// Largest per-request fetch timeout a caller may ask for, in milliseconds
pub const MAX_REQUEST_TIMEOUT_MS: u64 = 60_000;

/// Default watch poll interval, in milliseconds
pub const DEFAULT_WATCH_INTERVAL_MS: u64 = 30_000;

// ============================================================================
// OBSERVABILITY
// ============================================================================

/// Header carrying the per-request correlation id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Default log filter when RUST_LOG is unset
pub const DEFAULT_LOG_FILTER: &str = "vellum_api=debug,vellum_storage=debug,tower_http=info,info";
