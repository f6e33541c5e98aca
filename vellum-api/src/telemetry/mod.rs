//! Vellum Telemetry - Observability Infrastructure
//!
//! Structured logging setup, Prometheus metrics and the per-request
//! observability middleware for the API layer.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics, metrics_handler, VellumMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracing, LogFormat, TelemetryConfig};
