//! Schema REST API Routes
//!
//! Read-only schema views plus the coordination-version endpoint. Every
//! handler goes through the schema service, so a first request for a core or
//! collection loads its schema from the coordination store.
//!
//! `{scope}` is `cores` or `collections`.

use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use vellum_core::{RefreshRequest, SnapshotKey, VellumResult};
use vellum_storage::Ensured;

use crate::{
    constants::MAX_REQUEST_TIMEOUT_MS,
    error::{ApiError, ApiResult},
    extractors::{ApiJson, ApiQuery, SchemaKey},
    state::{AppState, SchemaService},
    telemetry::metrics,
    types::{
        FormatVersionResponse, PublishSchemaRequest, PublishSchemaResponse, SchemaResponse,
        SimilarityResponse, UniqueKeyResponse, ZkVersionQuery, ZkVersionRequest,
        ZkVersionResponse,
    },
};

fn record_outcome(result: &VellumResult<Ensured>) {
    if let Some(metrics) = metrics() {
        let outcome = match result {
            Ok(ensured) => ensured.outcome.as_str(),
            Err(_) => "failed",
        };
        metrics.record_refresh(outcome);
    }
}

async fn ensure_version(
    service: &SchemaService,
    key: &SnapshotKey,
    request: RefreshRequest,
) -> ApiResult<ZkVersionResponse> {
    let result = service.get_version_with(key, request).await;
    record_outcome(&result);
    let ensured = result?;
    Ok(ZkVersionResponse {
        version: ensured.version,
    })
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// GET /api/v1/{scope}/{name}/schema - Full schema
pub async fn get_schema(
    State(service): State<Arc<SchemaService>>,
    SchemaKey(key): SchemaKey,
) -> ApiResult<impl IntoResponse> {
    let schema = service.schema_info(&key).await?;
    Ok(Json(SchemaResponse { schema }))
}

/// PUT /api/v1/{scope}/{name}/schema - Publish a new schema version
pub async fn put_schema(
    State(service): State<Arc<SchemaService>>,
    SchemaKey(key): SchemaKey,
    ApiJson(req): ApiJson<PublishSchemaRequest>,
) -> ApiResult<impl IntoResponse> {
    let version = service
        .publish(&key, req.schema, req.expected_version)
        .await?;
    Ok(Json(PublishSchemaResponse { version }))
}

/// GET /api/v1/{scope}/{name}/schema/similarity
pub async fn get_similarity(
    State(service): State<Arc<SchemaService>>,
    SchemaKey(key): SchemaKey,
) -> ApiResult<impl IntoResponse> {
    let similarity = service.schema_similarity(&key).await?;
    Ok(Json(SimilarityResponse { similarity }))
}

/// GET /api/v1/{scope}/{name}/schema/uniquekey
pub async fn get_unique_key(
    State(service): State<Arc<SchemaService>>,
    SchemaKey(key): SchemaKey,
) -> ApiResult<impl IntoResponse> {
    let unique_key = service.schema_unique_key(&key).await?;
    Ok(Json(UniqueKeyResponse { unique_key }))
}

/// GET /api/v1/{scope}/{name}/schema/version - Schema format version
pub async fn get_format_version(
    State(service): State<Arc<SchemaService>>,
    SchemaKey(key): SchemaKey,
) -> ApiResult<impl IntoResponse> {
    let version = service.schema_format_version(&key).await?;
    Ok(Json(FormatVersionResponse { version }))
}

/// GET /api/v1/{scope}/{name}/schema/zkversion?refreshIfBelowVersion=N
///
/// Coordination version, refreshed first if the cached one is below `N`.
pub async fn get_zk_version(
    State(service): State<Arc<SchemaService>>,
    SchemaKey(key): SchemaKey,
    ApiQuery(query): ApiQuery<ZkVersionQuery>,
) -> ApiResult<impl IntoResponse> {
    let request = RefreshRequest::at_least(query.refresh_if_below_version);
    Ok(Json(ensure_version(&service, &key, request).await?))
}

/// POST /api/v1/{scope}/{name}/schema/zkversion
///
/// Same as the GET form with an optional per-request fetch timeout.
pub async fn post_zk_version(
    State(service): State<Arc<SchemaService>>,
    SchemaKey(key): SchemaKey,
    ApiJson(req): ApiJson<ZkVersionRequest>,
) -> ApiResult<impl IntoResponse> {
    let mut request = RefreshRequest::at_least(req.refresh_if_below_version);

    if let Some(timeout_ms) = req.timeout_ms {
        if timeout_ms == 0 || timeout_ms > MAX_REQUEST_TIMEOUT_MS {
            return Err(ApiError::invalid_input(format!(
                "timeoutMs must be between 1 and {}",
                MAX_REQUEST_TIMEOUT_MS
            )));
        }
        request = request.with_timeout(Duration::from_millis(timeout_ms));
    }

    Ok(Json(ensure_version(&service, &key, request).await?))
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the schema router, to be nested under the API prefix.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/:scope/:name/schema", get(get_schema).put(put_schema))
        .route("/:scope/:name/schema/similarity", get(get_similarity))
        .route("/:scope/:name/schema/uniquekey", get(get_unique_key))
        .route("/:scope/:name/schema/version", get(get_format_version))
        .route(
            "/:scope/:name/schema/zkversion",
            get(get_zk_version).post(post_zk_version),
        )
}
