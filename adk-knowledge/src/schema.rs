//! Collection descriptors and the schema payload sent to the engine.
//!
//! [`build_schema`] is a pure function: it turns a [`CollectionDescriptor`]
//! into the [`CollectionSchema`] the engine expects when a collection is
//! created. It never talks to the network.

use serde::{Deserialize, Serialize};

use crate::error::{KnowledgeError, Result};

/// Name of the document id field.
pub const ID_FIELD: &str = "id";
/// Name of the searchable text field.
pub const CONTENT_FIELD: &str = "content";
/// Name of the opaque metadata object field.
pub const METADATA_FIELD: &str = "metadata";
/// Name of the vector field.
pub const EMBEDDING_FIELD: &str = "embedding";

/// The function used to rank vector similarity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Cosine distance (`1 - cosine similarity`).
    #[default]
    Cosine,
    /// Euclidean (L2) distance.
    Euclidean,
    /// Inner product distance (`1 - a·b`).
    #[serde(alias = "ip")]
    DotProduct,
    /// A metric reported by the engine that this crate does not model.
    #[serde(other, skip_serializing)]
    Other,
}

/// Tuning for the engine's graph-based approximate nearest neighbour index.
///
/// These values are advisory: the engine applies them, the adapter never
/// enforces them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Maximum number of vectors the index is sized for.
    pub max_elements: usize,
    /// Number of bidirectional links per node.
    pub m: usize,
    /// Candidate list size while building the graph.
    pub ef_construction: usize,
    /// Candidate list size while searching the graph.
    pub ef: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        Self { max_elements: 1_000_000, m: 16, ef_construction: 100, ef: 64 }
    }
}

/// Build-time index parameters as attached to the embedding field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HnswParams {
    #[serde(rename = "M")]
    pub m: usize,
    pub ef_construction: usize,
}

impl From<&HnswConfig> for HnswParams {
    fn from(config: &HnswConfig) -> Self {
        Self { m: config.m, ef_construction: config.ef_construction }
    }
}

/// Engine field types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "string")]
    String,
    #[serde(rename = "string[]")]
    StringArray,
    #[serde(rename = "int32")]
    Int32,
    #[serde(rename = "int64")]
    Int64,
    #[serde(rename = "float")]
    Float,
    #[serde(rename = "float[]")]
    FloatArray,
    #[serde(rename = "bool")]
    Bool,
    #[serde(rename = "object")]
    Object,
    #[serde(rename = "auto")]
    Auto,
    /// A type reported by the engine that this crate does not model.
    #[serde(other)]
    Other,
}

/// A single field definition in a collection schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub optional: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub facet: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_dim: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vec_dist: Option<DistanceMetric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hnsw_params: Option<HnswParams>,
}

impl Field {
    /// Create a required, non-faceted field.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            optional: None,
            facet: None,
            num_dim: None,
            vec_dist: None,
            hnsw_params: None,
        }
    }

    /// Mark the field optional so documents may omit it.
    pub fn optional(mut self) -> Self {
        self.optional = Some(true);
        self
    }

    /// Mark the field as a facet.
    pub fn facet(mut self) -> Self {
        self.facet = Some(true);
        self
    }
}

/// The collection definition payload submitted to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub name: String,
    pub fields: Vec<Field>,
    #[serde(default)]
    pub enable_nested_fields: bool,
}

impl CollectionSchema {
    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// The vector field, if the schema declares one.
    pub fn embedding_field(&self) -> Option<&Field> {
        self.fields.iter().find(|f| f.num_dim.is_some())
    }
}

/// Abstract description of a vector collection.
///
/// # Example
///
/// ```rust,ignore
/// use adk_knowledge::{CollectionDescriptor, DistanceMetric};
///
/// let descriptor = CollectionDescriptor::new("docs", 512)
///     .with_distance(DistanceMetric::DotProduct);
/// let schema = adk_knowledge::build_schema(&descriptor);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionDescriptor {
    /// Unique collection name.
    pub name: String,
    /// Embedding dimensionality, fixed for the lifetime of the collection.
    pub dimensions: usize,
    /// Distance metric used for vector ranking.
    #[serde(default)]
    pub distance: DistanceMetric,
    /// Index tuning; `None` leaves the engine defaults in place.
    #[serde(default)]
    pub hnsw: Option<HnswConfig>,
    /// Caller-supplied fields appended after the baseline fields.
    #[serde(default)]
    pub extra_fields: Vec<Field>,
}

impl CollectionDescriptor {
    /// Create a cosine-distance descriptor with default index tuning.
    pub fn new(name: impl Into<String>, dimensions: usize) -> Self {
        Self {
            name: name.into(),
            dimensions,
            distance: DistanceMetric::default(),
            hnsw: Some(HnswConfig::default()),
            extra_fields: Vec::new(),
        }
    }

    /// Set the distance metric.
    pub fn with_distance(mut self, distance: DistanceMetric) -> Self {
        self.distance = distance;
        self
    }

    /// Set the index tuning parameters.
    pub fn with_hnsw(mut self, hnsw: HnswConfig) -> Self {
        self.hnsw = Some(hnsw);
        self
    }

    /// Leave index tuning to the engine.
    pub fn without_hnsw(mut self) -> Self {
        self.hnsw = None;
        self
    }

    /// Append an extra field to the schema.
    pub fn with_field(mut self, field: Field) -> Self {
        self.extra_fields.push(field);
        self
    }

    /// Check that the descriptor can be turned into a schema.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::ConfigError`] if the name is empty or the
    /// dimensionality is zero.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(KnowledgeError::ConfigError("collection name must not be empty".into()));
        }
        if self.dimensions == 0 {
            return Err(KnowledgeError::ConfigError(format!(
                "collection '{}' must have a dimensionality greater than zero",
                self.name
            )));
        }
        if self.distance == DistanceMetric::Other {
            return Err(KnowledgeError::ConfigError(format!(
                "collection '{}' must use a cosine, euclidean or dot_product distance",
                self.name
            )));
        }
        Ok(())
    }
}

/// Build the engine's collection definition for a descriptor.
///
/// Always emits `id`, `content`, `metadata` and `embedding`, in that order,
/// followed by the descriptor's extra fields. The embedding field is optional
/// so documents with empty content can be stored without a vector.
pub fn build_schema(descriptor: &CollectionDescriptor) -> CollectionSchema {
    let mut embedding = Field::new(EMBEDDING_FIELD, FieldType::FloatArray).optional();
    embedding.num_dim = Some(descriptor.dimensions);
    embedding.vec_dist = Some(descriptor.distance);
    embedding.hnsw_params = descriptor.hnsw.as_ref().map(HnswParams::from);

    let mut fields = vec![
        Field::new(ID_FIELD, FieldType::String),
        Field::new(CONTENT_FIELD, FieldType::String),
        Field::new(METADATA_FIELD, FieldType::Object).optional(),
        embedding,
    ];
    fields.extend(descriptor.extra_fields.iter().cloned());

    CollectionSchema { name: descriptor.name.clone(), fields, enable_nested_fields: true }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn baseline_fields_come_first() {
        let schema = build_schema(
            &CollectionDescriptor::new("docs", 3)
                .with_field(Field::new("source", FieldType::String).facet()),
        );
        let names: Vec<&str> = schema.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["id", "content", "metadata", "embedding", "source"]);
        assert!(schema.enable_nested_fields);
    }

    #[test]
    fn embedding_field_wire_format() {
        let schema = build_schema(
            &CollectionDescriptor::new("docs", 512).with_distance(DistanceMetric::DotProduct),
        );
        let value = serde_json::to_value(schema.embedding_field().unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "embedding",
                "type": "float[]",
                "optional": true,
                "num_dim": 512,
                "vec_dist": "dot_product",
                "hnsw_params": {"M": 16, "ef_construction": 100}
            })
        );
    }

    #[test]
    fn no_hnsw_params_without_tuning() {
        let schema = build_schema(&CollectionDescriptor::new("docs", 8).without_hnsw());
        assert!(schema.embedding_field().unwrap().hnsw_params.is_none());
    }

    #[test]
    fn engine_reported_metrics_decode_leniently() {
        let ip: Field = serde_json::from_value(
            json!({"name": "embedding", "type": "float[]", "num_dim": 3, "vec_dist": "ip"}),
        )
        .unwrap();
        assert_eq!(ip.vec_dist, Some(DistanceMetric::DotProduct));

        let unknown: Field = serde_json::from_value(
            json!({"name": "embedding", "type": "float[]", "vec_dist": "manhattan"}),
        )
        .unwrap();
        assert_eq!(unknown.vec_dist, Some(DistanceMetric::Other));
        assert!(
            CollectionDescriptor::new("docs", 3)
                .with_distance(DistanceMetric::Other)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn validate_rejects_empty_name_and_zero_dimensions() {
        assert!(CollectionDescriptor::new("", 3).validate().is_err());
        assert!(CollectionDescriptor::new("docs", 0).validate().is_err());
        assert!(CollectionDescriptor::new("docs", 3).validate().is_ok());
    }
}
