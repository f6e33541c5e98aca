//! Index schema artifact.
//!
//! The schema is the concrete artifact the node caches. Only the parts the
//! admin surface reads are modeled here: name, format version, unique key,
//! similarity and the flat field list. Field type and analyzer semantics
//! belong to the index layer.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashSet};

use crate::error::ValidationError;
use crate::snapshot::{VersionedArtifact, Versioning};

/// Default similarity implementation name.
pub const DEFAULT_SIMILARITY_CLASS: &str = "solr.BM25SimilarityFactory";

/// Scoring similarity configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityConfig {
    /// Similarity implementation name.
    pub class: String,
    /// Implementation-specific parameters.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, Value>,
}

impl Default for SimilarityConfig {
    fn default() -> Self {
        Self {
            class: DEFAULT_SIMILARITY_CLASS.to_string(),
            params: BTreeMap::new(),
        }
    }
}

impl SimilarityConfig {
    pub fn new(class: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Render as a flat JSON object: `class` plus every parameter.
    pub fn named_properties(&self) -> Value {
        let mut map = Map::new();
        map.insert("class".to_string(), Value::String(self.class.clone()));
        for (k, v) in &self.params {
            map.insert(k.clone(), v.clone());
        }
        Value::Object(map)
    }
}

/// A single field definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default = "default_true")]
    pub indexed: bool,
    #[serde(default = "default_true")]
    pub stored: bool,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub multi_valued: bool,
}

fn default_true() -> bool {
    true
}

impl FieldDefinition {
    /// Indexed and stored, single-valued, optional.
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            indexed: true,
            stored: true,
            required: false,
            multi_valued: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn multi_valued(mut self) -> Self {
        self.multi_valued = true;
        self
    }

    pub fn unstored(mut self) -> Self {
        self.stored = false;
        self
    }
}

/// Index schema as held by the coordination store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSchema {
    pub name: String,
    /// Schema format version, not the coordination version.
    #[serde(rename = "version")]
    pub format_version: f32,
    pub unique_key: String,
    #[serde(default)]
    pub similarity: SimilarityConfig,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
    /// Whether the schema is stored in and versioned by the coordination
    /// store. A classic file-based schema is not.
    #[serde(default = "default_true")]
    pub managed: bool,
}

impl IndexSchema {
    pub fn new(name: impl Into<String>, unique_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            format_version: 1.6,
            unique_key: unique_key.into(),
            similarity: SimilarityConfig::default(),
            fields: Vec::new(),
            managed: true,
        }
    }

    pub fn with_field(mut self, field: FieldDefinition) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_similarity(mut self, similarity: SimilarityConfig) -> Self {
        self.similarity = similarity;
        self
    }

    pub fn with_format_version(mut self, format_version: f32) -> Self {
        self.format_version = format_version;
        self
    }

    /// Mark the schema as node-local (not coordination-managed).
    pub fn unmanaged(mut self) -> Self {
        self.managed = false;
        self
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Render the schema as a JSON object for the admin surface.
    pub fn named_properties(&self) -> Value {
        json!({
            "name": self.name,
            "version": self.format_version,
            "uniqueKey": self.unique_key,
            "similarity": self.similarity.named_properties(),
            "fields": self.fields,
        })
    }

    /// Check structural consistency.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "name".to_string(),
            });
        }
        if !(self.format_version.is_finite() && self.format_version > 0.0) {
            return Err(ValidationError::InvalidValue {
                field: "version".to_string(),
                reason: format!("format version must be positive, got {}", self.format_version),
            });
        }
        if self.similarity.class.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "similarity.class".to_string(),
            });
        }

        let mut seen = HashSet::with_capacity(self.fields.len());
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(ValidationError::RequiredFieldMissing {
                    field: "fields[].name".to_string(),
                });
            }
            if !seen.insert(field.name.as_str()) {
                return Err(ValidationError::DuplicateField {
                    name: field.name.clone(),
                });
            }
        }

        if !seen.contains(self.unique_key.as_str()) {
            return Err(ValidationError::UnknownUniqueKey {
                unique_key: self.unique_key.clone(),
            });
        }
        Ok(())
    }
}

impl VersionedArtifact for IndexSchema {
    fn versioning(&self) -> Versioning {
        if self.managed {
            Versioning::Coordinated
        } else {
            Versioning::Local
        }
    }

    fn validate(&self) -> Result<(), ValidationError> {
        IndexSchema::validate(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn books() -> IndexSchema {
        IndexSchema::new("books", "id")
            .with_field(FieldDefinition::new("id", "string").required())
            .with_field(FieldDefinition::new("title", "text_general"))
            .with_field(FieldDefinition::new("tags", "string").multi_valued())
    }

    #[test]
    fn test_validate_accepts_well_formed_schema() {
        assert_eq!(books().validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_unknown_unique_key() {
        let mut schema = books();
        schema.unique_key = "isbn".to_string();
        assert!(matches!(
            schema.validate(),
            Err(ValidationError::UnknownUniqueKey { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_field() {
        let schema = books().with_field(FieldDefinition::new("title", "string"));
        assert_eq!(
            schema.validate(),
            Err(ValidationError::DuplicateField {
                name: "title".to_string()
            })
        );
    }

    #[test]
    fn test_validate_rejects_bad_format_version() {
        let schema = books().with_format_version(0.0);
        assert!(matches!(
            schema.validate(),
            Err(ValidationError::InvalidValue { .. })
        ));
        let schema = books().with_format_version(f32::NAN);
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let mut schema = books();
        schema.name = "  ".to_string();
        assert!(matches!(
            schema.validate(),
            Err(ValidationError::RequiredFieldMissing { .. })
        ));
    }

    #[test]
    fn test_versioning_follows_managed_flag() {
        assert_eq!(books().versioning(), Versioning::Coordinated);
        assert_eq!(books().unmanaged().versioning(), Versioning::Local);
    }

    #[test]
    fn test_named_properties_shape() {
        let schema = books().with_similarity(
            SimilarityConfig::new("solr.DFRSimilarityFactory").with_param("basicModel", "G"),
        );
        let props = schema.named_properties();
        assert_eq!(props["name"], "books");
        assert_eq!(props["uniqueKey"], "id");
        assert_eq!(props["similarity"]["class"], "solr.DFRSimilarityFactory");
        assert_eq!(props["similarity"]["basicModel"], "G");
        assert_eq!(props["fields"].as_array().map(Vec::len), Some(3));
        assert_eq!(props["fields"][2]["multiValued"], true);
        assert_eq!(props["fields"][0]["type"], "string");
    }

    #[test]
    fn test_deserialize_applies_defaults() -> Result<(), serde_json::Error> {
        let schema: IndexSchema = serde_json::from_value(json!({
            "name": "minimal",
            "version": 1.6,
            "uniqueKey": "id",
            "fields": [{"name": "id", "type": "string"}]
        }))?;
        assert!(schema.managed);
        assert_eq!(schema.similarity.class, DEFAULT_SIMILARITY_CLASS);
        assert!(schema.fields[0].indexed && schema.fields[0].stored);
        assert!(!schema.fields[0].multi_valued);
        assert_eq!(schema.validate(), Ok(()));
        Ok(())
    }
}
