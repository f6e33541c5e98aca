//! Request and response bodies for the schema routes.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vellum_core::{ArtifactVersion, IndexSchema, UNVERSIONED};

// ============================================================================
// REQUESTS
// ============================================================================

/// Body of `PUT .../schema`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishSchemaRequest {
    pub schema: IndexSchema,
    /// Compare-and-set guard. Absent means unconditional.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_version: Option<ArtifactVersion>,
}

fn unversioned() -> ArtifactVersion {
    UNVERSIONED
}

/// Query string of `GET .../schema/zkversion`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZkVersionQuery {
    #[serde(default = "unversioned")]
    pub refresh_if_below_version: ArtifactVersion,
}

/// Body of `POST .../schema/zkversion`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZkVersionRequest {
    #[serde(default = "unversioned")]
    pub refresh_if_below_version: ArtifactVersion,
    /// Per-request fetch timeout in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

// ============================================================================
// RESPONSES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaResponse {
    pub schema: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimilarityResponse {
    pub similarity: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UniqueKeyResponse {
    pub unique_key: String,
}

/// Schema format version.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FormatVersionResponse {
    pub version: f32,
}

/// Coordination version. `-1` means the schema is not coordination-managed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZkVersionResponse {
    pub version: ArtifactVersion,
}

/// Version assigned by a publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishSchemaResponse {
    pub version: ArtifactVersion,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_zk_version_query_defaults_to_sentinel() -> Result<(), serde_json::Error> {
        let query: ZkVersionQuery = serde_json::from_value(json!({}))?;
        assert_eq!(query.refresh_if_below_version, -1);

        let request: ZkVersionRequest =
            serde_json::from_value(json!({"refreshIfBelowVersion": 4, "timeoutMs": 250}))?;
        assert_eq!(request.refresh_if_below_version, 4);
        assert_eq!(request.timeout_ms, Some(250));
        Ok(())
    }

    #[test]
    fn test_publish_request_shape() -> Result<(), serde_json::Error> {
        let request: PublishSchemaRequest = serde_json::from_value(json!({
            "schema": {
                "name": "books",
                "version": 1.6,
                "uniqueKey": "id",
                "fields": [{"name": "id", "type": "string"}]
            },
            "expectedVersion": 2
        }))?;
        assert_eq!(request.expected_version, Some(2));
        assert_eq!(request.schema.unique_key, "id");

        let unconditional: PublishSchemaRequest = serde_json::from_value(json!({
            "schema": request.schema
        }))?;
        assert!(unconditional.expected_version.is_none());
        Ok(())
    }

    #[test]
    fn test_unique_key_response_is_camel_case() -> Result<(), serde_json::Error> {
        let body = serde_json::to_value(UniqueKeyResponse {
            unique_key: "id".to_string(),
        })?;
        assert_eq!(body, json!({"uniqueKey": "id"}));
        Ok(())
    }
}
