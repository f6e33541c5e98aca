//! Request extractors that reject with [`ApiError`].
//!
//! Axum's stock `Path`, `Query` and `Json` extractors answer malformed input
//! with plain-text bodies. These wrappers run the stock extractor and convert
//! its rejection so every 400 carries the usual JSON error shape.

use axum::{
    async_trait,
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts, Path, Query, Request,
    },
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use vellum_core::SnapshotKey;

use crate::error::{ApiError, ErrorCode};

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::invalid_input(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::invalid_input(format!("Invalid query string: {}", rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::new(
            ErrorCode::InvalidFormat,
            format!("Invalid path: {}", rejection.body_text()),
        )
    }
}

/// Snapshot key taken from the `/:scope/:name` path segments.
///
/// ```rust,ignore
/// async fn get_schema(SchemaKey(key): SchemaKey) -> ApiResult<impl IntoResponse> {
///     // key is a validated `collections/<name>` or `cores/<name>`
/// }
/// ```
#[derive(Debug, Clone)]
pub struct SchemaKey(pub SnapshotKey);

#[async_trait]
impl<S> FromRequestParts<S> for SchemaKey
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path((scope, name)): Path<(String, String)> =
            Path::from_request_parts(parts, state).await?;
        Ok(SchemaKey(SnapshotKey::from_path(&scope, &name)?))
    }
}

/// `Query<T>` with a JSON [`ApiError`] rejection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state).await?;
        Ok(ApiQuery(value))
    }
}

/// `Json<T>` with a JSON [`ApiError`] rejection.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(ApiJson(value))
    }
}
