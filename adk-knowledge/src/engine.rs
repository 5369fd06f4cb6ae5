//! The boundary with the remote document/vector engine.
//!
//! [`SearchEngine`] models the engine's request/response protocol:
//! collection create/retrieve/delete by name, single-document upsert by id,
//! and a multi-search call taking one or more [`SearchQuery`] descriptors.
//! Backends translate these calls into their own transport.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::filter::FilterExpression;
use crate::schema::{CollectionSchema, Field};

/// A similarity clause on a vector field.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
    /// The vector field to search.
    pub field: String,
    /// The query vector.
    pub vector: Vec<f32>,
    /// Number of nearest neighbours to consider. `None` uses the engine default.
    pub k: Option<usize>,
    /// Search-time candidate list size. `None` uses the index default.
    pub ef: Option<usize>,
}

impl fmt::Display for VectorQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self.vector.iter().map(|v| v.to_string()).collect();
        write!(f, "{}:([{}]", self.field, values.join(","))?;
        if let Some(k) = self.k {
            write!(f, ", k:{k}")?;
        }
        if let Some(ef) = self.ef {
            write!(f, ", ef:{ef}")?;
        }
        f.write_str(")")
    }
}

/// One query descriptor inside a multi-search request.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    /// Collection to search.
    pub collection: String,
    /// Lexical term; `*` matches every document.
    pub q: String,
    /// Field the lexical term is matched against.
    pub query_by: Option<String>,
    /// Optional similarity clause.
    pub vector_query: Option<VectorQuery>,
    /// Optional filter applied before ranking.
    pub filter_by: Option<FilterExpression>,
    /// Maximum number of hits.
    pub limit: usize,
}

impl SearchQuery {
    /// The wildcard lexical term.
    pub const WILDCARD: &'static str = "*";

    /// Whether the lexical part matches every document.
    pub fn is_wildcard(&self) -> bool {
        self.q.trim() == Self::WILDCARD
    }
}

/// The result of one query descriptor.
///
/// Engines report per-query failures inside an otherwise successful
/// multi-search response; those surface as `error` (and `code`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Raw hits, in engine ranking order.
    #[serde(default)]
    pub hits: Vec<Value>,
    /// Total number of matching documents, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub found: Option<u64>,
    /// Engine-reported error for this query.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Status code accompanying `error`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<u16>,
}

/// Summary of a collection as reported by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Collection name.
    pub name: String,
    /// Number of stored documents.
    #[serde(default)]
    pub num_documents: u64,
    /// Declared fields.
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// A remote (or in-process) document/vector engine.
///
/// # Example
///
/// ```rust,ignore
/// use adk_knowledge::{InMemoryEngine, SearchEngine, build_schema, CollectionDescriptor};
///
/// let engine = InMemoryEngine::new();
/// engine.create_collection(&build_schema(&CollectionDescriptor::new("docs", 3))).await?;
/// let info = engine.retrieve_collection("docs").await?;
/// ```
#[async_trait]
pub trait SearchEngine: Send + Sync {
    /// Backend name used in logs and errors.
    fn backend(&self) -> &str;

    /// Create a collection from a schema.
    async fn create_collection(&self, schema: &CollectionSchema) -> Result<CollectionInfo>;

    /// Describe a collection. Fails with `NotFound` if it does not exist.
    async fn retrieve_collection(&self, name: &str) -> Result<CollectionInfo>;

    /// Delete a collection and its documents. Fails with `NotFound` if it does not exist.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// List all collections.
    async fn list_collections(&self) -> Result<Vec<CollectionInfo>>;

    /// Create or replace a single document, keyed by its `id` field.
    async fn upsert_document(&self, collection: &str, document: &Value) -> Result<()>;

    /// Fetch a stored document by id. Fails with `NotFound` if it does not exist.
    async fn retrieve_document(&self, collection: &str, id: &str) -> Result<Value>;

    /// Run several queries in one round-trip, returning one response per query.
    async fn multi_search(&self, searches: &[SearchQuery]) -> Result<Vec<SearchResponse>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_query_renders_optional_parameters() {
        let mut query =
            VectorQuery { field: "embedding".into(), vector: vec![1.0, 0.5], k: None, ef: None };
        assert_eq!(query.to_string(), "embedding:([1,0.5])");

        query.k = Some(5);
        query.ef = Some(64);
        assert_eq!(query.to_string(), "embedding:([1,0.5], k:5, ef:64)");
    }

    #[test]
    fn search_response_tolerates_missing_fields() {
        let response: SearchResponse =
            serde_json::from_str(r#"{"error": "Could not find a field", "code": 404}"#).unwrap();
        assert!(response.hits.is_empty());
        assert_eq!(response.code, Some(404));
    }
}
