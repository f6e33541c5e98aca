//! REST API Routes Module
//!
//! Includes:
//! - Schema read routes and the coordination-version endpoint
//! - Health check endpoints (Kubernetes-compatible)
//! - Prometheus metrics
//! - CORS support for browser-based admin clients

pub mod health;
pub mod schema;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn,
    routing::get,
    Router,
};
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::constants::API_PREFIX;
use crate::state::{AppState, SchemaService};
use crate::telemetry::{metrics_handler, observability_middleware};

pub use health::create_router as health_router;
pub use schema::create_router as schema_router;

fn cors_layer(config: &ApiConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::PUT, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.is_production() {
        let config = config.clone();
        layer.allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &axum::http::request::Parts| {
                origin
                    .to_str()
                    .map(|o| config.is_origin_allowed(o))
                    .unwrap_or(false)
            },
        ))
    } else {
        layer.allow_origin(Any)
    }
}

/// Build the full API router.
///
/// Layers, outermost first: CORS, HTTP tracing, observability middleware,
/// concurrency limit.
pub fn create_api_router(service: Arc<SchemaService>, config: &ApiConfig) -> Router {
    let state = AppState::new(service);

    Router::new()
        .nest(API_PREFIX, schema_router())
        .nest("/health", health_router())
        .route("/metrics", get(metrics_handler))
        .with_state(state)
        .layer(ConcurrencyLimitLayer::new(config.max_concurrent_requests.max(1)))
        .layer(from_fn(observability_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(config))
}
