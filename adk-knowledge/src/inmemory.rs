//! In-process search engine.
//!
//! This module provides [`InMemoryEngine`], a [`SearchEngine`] that keeps
//! collections in a `HashMap` behind a `tokio::sync::RwLock`. It follows the
//! same protocol as a remote engine: schemas are enforced on write, unknown
//! filter fields are reported as per-query errors, vector ranking honours
//! the collection's distance metric, and hybrid queries are ranked by
//! reciprocal-rank fusion inside the engine. It is suitable for development,
//! testing, and small-scale use cases.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde_json::{Map, Value, json};
use tokio::sync::RwLock;

use crate::engine::{CollectionInfo, SearchEngine, SearchQuery, SearchResponse, VectorQuery};
use crate::error::{KnowledgeError, Result};
use crate::filter::FilterExpression;
use crate::schema::{CollectionSchema, DistanceMetric, ID_FIELD};

const BACKEND: &str = "inmemory";

/// Weight of the lexical rank in hybrid fusion.
const KEYWORD_WEIGHT: f64 = 0.7;
/// Weight of the vector rank in hybrid fusion.
const VECTOR_WEIGHT: f64 = 0.3;

#[derive(Debug)]
struct StoredCollection {
    schema: CollectionSchema,
    /// Documents in insertion order; upserts replace in place.
    documents: Vec<Value>,
}

/// A [`SearchEngine`] that keeps everything in memory.
///
/// # Example
///
/// ```rust,ignore
/// use adk_knowledge::{InMemoryEngine, KnowledgeStore};
///
/// let store = KnowledgeStore::builder()
///     .engine(Arc::new(InMemoryEngine::new()))
///     .descriptor(CollectionDescriptor::new("docs", 3))
///     .embedding_provider(Arc::new(my_embedder))
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryEngine {
    collections: RwLock<HashMap<String, StoredCollection>>,
}

impl InMemoryEngine {
    /// Create a new empty in-memory engine.
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(resource: impl Into<String>) -> KnowledgeError {
    KnowledgeError::NotFound { backend: BACKEND.to_string(), resource: resource.into() }
}

fn rejected(status: u16, message: impl Into<String>) -> KnowledgeError {
    KnowledgeError::EngineError {
        backend: BACKEND.to_string(),
        status: Some(status),
        message: message.into(),
    }
}

fn info(collection: &StoredCollection) -> CollectionInfo {
    CollectionInfo {
        name: collection.schema.name.clone(),
        num_documents: collection.documents.len() as u64,
        fields: collection.schema.fields.clone(),
    }
}

fn document_id(document: &Value) -> Option<&str> {
    document.get(ID_FIELD).and_then(Value::as_str)
}

/// Check a document against the schema before it is stored.
fn validate_document(schema: &CollectionSchema, document: &Map<String, Value>) -> Result<()> {
    for field in &schema.fields {
        let value = document.get(&field.name).filter(|v| !v.is_null());
        let Some(value) = value else {
            if field.optional.unwrap_or(false) {
                continue;
            }
            return Err(rejected(
                400,
                format!(
                    "Field `{}` has been declared in the schema, but is not found in the document.",
                    field.name
                ),
            ));
        };
        if let Some(dimensions) = field.num_dim {
            let valid = value.as_array().is_some_and(|items| {
                items.len() == dimensions && items.iter().all(Value::is_number)
            });
            if !valid {
                return Err(rejected(
                    400,
                    format!("Field `{}` must be an array of {dimensions} numbers.", field.name),
                ));
            }
        }
    }
    Ok(())
}

/// Resolve a possibly dotted field path in a stored document.
///
/// The first segment must be declared in the schema; nested segments are
/// only allowed when nested fields are enabled.
fn resolve_field<'a>(
    schema: &CollectionSchema,
    document: &'a Value,
    path: &str,
) -> std::result::Result<Option<&'a Value>, String> {
    let mut segments = path.split('.');
    let root = segments.next().unwrap_or_default();
    if root != ID_FIELD && schema.field(root).is_none() {
        return Err(format!("Could not find a filter field named `{path}` in the schema."));
    }
    if path.contains('.') && !schema.enable_nested_fields {
        return Err(format!("Nested field `{path}` requires nested fields to be enabled."));
    }
    let mut current = document.get(root);
    for segment in segments {
        current = current.and_then(|v| v.get(segment));
    }
    Ok(current)
}

fn passes_filter(
    schema: &CollectionSchema,
    document: &Value,
    filter: Option<&FilterExpression>,
) -> std::result::Result<bool, String> {
    let Some(filter) = filter else {
        return Ok(true);
    };
    for predicate in filter.predicates() {
        match resolve_field(schema, document, predicate.field())? {
            Some(actual) if predicate.accepts(actual) => {}
            _ => return Ok(false),
        }
    }
    Ok(true)
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Lexical score: distinct query tokens matched (high bits), then term frequency.
fn text_match(query_tokens: &HashSet<String>, text: &str) -> Option<u64> {
    let tokens = tokenize(text);
    let matched: HashSet<&String> = tokens.iter().filter(|t| query_tokens.contains(*t)).collect();
    if matched.is_empty() {
        return None;
    }
    let frequency = tokens.iter().filter(|t| query_tokens.contains(*t)).count() as u64;
    Some(((matched.len() as u64) << 32) | frequency.min(u32::MAX as u64))
}

/// Lower is closer. Unmodelled metrics rank last.
fn distance(metric: DistanceMetric, a: &[f32], b: &[f32]) -> f64 {
    let dot: f64 = a.iter().zip(b).map(|(x, y)| f64::from(*x) * f64::from(*y)).sum();
    match metric {
        DistanceMetric::Cosine => {
            let norm_a: f64 = a.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
            let norm_b: f64 = b.iter().map(|x| f64::from(*x).powi(2)).sum::<f64>().sqrt();
            if norm_a == 0.0 || norm_b == 0.0 {
                return 1.0;
            }
            1.0 - dot / (norm_a * norm_b)
        }
        DistanceMetric::Euclidean => {
            let sum: f64 =
                a.iter().zip(b).map(|(x, y)| (f64::from(*x) - f64::from(*y)).powi(2)).sum();
            sum.sqrt()
        }
        DistanceMetric::DotProduct => 1.0 - dot,
        DistanceMetric::Other => f64::INFINITY,
    }
}

fn embedding_of(document: &Value, field: &str) -> Option<Vec<f32>> {
    document
        .get(field)?
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|x| x as f32))
        .collect()
}

#[derive(Default)]
struct Scored {
    text_match: Option<u64>,
    vector_distance: Option<f64>,
    fusion: Option<f64>,
}

fn run_query(
    collection: &StoredCollection,
    query: &SearchQuery,
) -> std::result::Result<SearchResponse, (u16, String)> {
    let schema = &collection.schema;

    let mut candidates: Vec<(usize, &Value)> = Vec::new();
    for (position, document) in collection.documents.iter().enumerate() {
        if passes_filter(schema, document, query.filter_by.as_ref()).map_err(|e| (404, e))? {
            candidates.push((position, document));
        }
    }

    // Lexical ranking: best score first, insertion order breaks ties.
    let lexical: Option<Vec<(usize, u64)>> = if query.is_wildcard() {
        None
    } else {
        let field = query
            .query_by
            .as_deref()
            .ok_or((400, "Parameter `query_by` is required.".to_string()))?;
        if schema.field(field).is_none() {
            return Err((404, format!("Could not find a field named `{field}` in the schema.")));
        }
        let query_tokens: HashSet<String> = tokenize(&query.q).into_iter().collect();
        let mut ranked: Vec<(usize, u64)> = candidates
            .iter()
            .filter_map(|(position, document)| {
                let text = document.get(field).and_then(Value::as_str)?;
                text_match(&query_tokens, text).map(|score| (*position, score))
            })
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        Some(ranked)
    };

    // Vector ranking: nearest first, limited to k.
    let semantic: Option<Vec<(usize, f64)>> = match &query.vector_query {
        None => None,
        Some(vector_query) => Some(rank_by_distance(schema, &candidates, vector_query)?),
    };

    let mut scored: Vec<(usize, Scored)> = match (&lexical, &semantic) {
        (None, None) => candidates.iter().map(|(p, _)| (*p, Scored::default())).collect(),
        (Some(lexical), None) => lexical
            .iter()
            .map(|(p, score)| (*p, Scored { text_match: Some(*score), ..Default::default() }))
            .collect(),
        (None, Some(semantic)) => semantic
            .iter()
            .map(|(p, d)| (*p, Scored { vector_distance: Some(*d), ..Default::default() }))
            .collect(),
        (Some(lexical), Some(semantic)) => fuse(lexical, semantic),
    };

    let found = scored.len() as u64;
    scored.truncate(query.limit);

    let hits = scored
        .into_iter()
        .map(|(position, scored)| {
            let mut hit = Map::new();
            hit.insert("document".to_string(), collection.documents[position].clone());
            if let Some(score) = scored.text_match {
                hit.insert("text_match".to_string(), json!(score));
            }
            if let Some(distance) = scored.vector_distance {
                hit.insert("vector_distance".to_string(), json!(distance));
            }
            if let Some(fusion) = scored.fusion {
                hit.insert("hybrid_search_info".to_string(), json!({"rank_fusion_score": fusion}));
            }
            Value::Object(hit)
        })
        .collect();

    Ok(SearchResponse { hits, found: Some(found), error: None, code: None })
}

fn rank_by_distance(
    schema: &CollectionSchema,
    candidates: &[(usize, &Value)],
    vector_query: &VectorQuery,
) -> std::result::Result<Vec<(usize, f64)>, (u16, String)> {
    let field = schema
        .field(&vector_query.field)
        .filter(|f| f.num_dim.is_some())
        .ok_or_else(|| (400, format!("Field `{}` is not a vector field.", vector_query.field)))?;
    let dimensions = field.num_dim.unwrap_or_default();
    if vector_query.vector.len() != dimensions {
        return Err((
            400,
            format!("Query field `{}` must have {dimensions} dimensions.", vector_query.field),
        ));
    }
    let metric = field.vec_dist.unwrap_or_default();

    let mut ranked: Vec<(usize, f64)> = candidates
        .iter()
        .filter_map(|(position, document)| {
            let embedding = embedding_of(document, &vector_query.field)?;
            Some((*position, distance(metric, &vector_query.vector, &embedding)))
        })
        .collect();
    ranked.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0)));
    if let Some(k) = vector_query.k {
        ranked.truncate(k);
    }
    Ok(ranked)
}

/// Weighted reciprocal-rank fusion of the lexical and vector rankings.
fn fuse(lexical: &[(usize, u64)], semantic: &[(usize, f64)]) -> Vec<(usize, Scored)> {
    let mut fused: HashMap<usize, Scored> = HashMap::new();
    for (rank, (position, score)) in lexical.iter().enumerate() {
        let entry = fused.entry(*position).or_default();
        entry.text_match = Some(*score);
        *entry.fusion.get_or_insert(0.0) += KEYWORD_WEIGHT / (rank + 1) as f64;
    }
    for (rank, (position, distance)) in semantic.iter().enumerate() {
        let entry = fused.entry(*position).or_default();
        entry.vector_distance = Some(*distance);
        *entry.fusion.get_or_insert(0.0) += VECTOR_WEIGHT / (rank + 1) as f64;
    }
    let mut fused: Vec<(usize, Scored)> = fused.into_iter().collect();
    fused.sort_by(|a, b| {
        let (fa, fb) = (a.1.fusion.unwrap_or_default(), b.1.fusion.unwrap_or_default());
        fb.partial_cmp(&fa).unwrap_or(Ordering::Equal).then(a.0.cmp(&b.0))
    });
    fused
}

#[async_trait]
impl SearchEngine for InMemoryEngine {
    fn backend(&self) -> &str {
        BACKEND
    }

    async fn create_collection(&self, schema: &CollectionSchema) -> Result<CollectionInfo> {
        let mut collections = self.collections.write().await;
        if collections.contains_key(&schema.name) {
            return Err(rejected(
                409,
                format!("A collection with name `{}` already exists.", schema.name),
            ));
        }
        let unsupported = schema.fields.iter().find(|f| f.vec_dist == Some(DistanceMetric::Other));
        if let Some(field) = unsupported {
            return Err(rejected(
                400,
                format!("Field `{}` has an unsupported distance metric.", field.name),
            ));
        }
        let collection = StoredCollection { schema: schema.clone(), documents: Vec::new() };
        let created = info(&collection);
        collections.insert(schema.name.clone(), collection);
        Ok(created)
    }

    async fn retrieve_collection(&self, name: &str) -> Result<CollectionInfo> {
        let collections = self.collections.read().await;
        collections.get(name).map(info).ok_or_else(|| not_found(format!("collections/{name}")))
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name).map(|_| ()).ok_or_else(|| not_found(format!("collections/{name}")))
    }

    async fn list_collections(&self) -> Result<Vec<CollectionInfo>> {
        let collections = self.collections.read().await;
        let mut listed: Vec<CollectionInfo> = collections.values().map(info).collect();
        listed.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(listed)
    }

    async fn upsert_document(&self, collection: &str, document: &Value) -> Result<()> {
        let mut collections = self.collections.write().await;
        let stored = collections
            .get_mut(collection)
            .ok_or_else(|| not_found(format!("collections/{collection}")))?;

        let object = document
            .as_object()
            .ok_or_else(|| rejected(400, "Document must be a JSON object."))?;
        let id = document_id(document)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| rejected(400, "Document `id` must be a non-empty string."))?;
        validate_document(&stored.schema, object)?;

        match stored.documents.iter().position(|d| document_id(d) == Some(id)) {
            Some(position) => stored.documents[position] = document.clone(),
            None => stored.documents.push(document.clone()),
        }
        Ok(())
    }

    async fn retrieve_document(&self, collection: &str, id: &str) -> Result<Value> {
        let collections = self.collections.read().await;
        let stored = collections
            .get(collection)
            .ok_or_else(|| not_found(format!("collections/{collection}")))?;
        stored
            .documents
            .iter()
            .find(|d| document_id(d) == Some(id))
            .cloned()
            .ok_or_else(|| not_found(format!("collections/{collection}/documents/{id}")))
    }

    async fn multi_search(&self, searches: &[SearchQuery]) -> Result<Vec<SearchResponse>> {
        let collections = self.collections.read().await;
        let responses = searches
            .iter()
            .map(|query| {
                let outcome = match collections.get(&query.collection) {
                    Some(collection) => run_query(collection, query),
                    None => Err((404, format!("Collection `{}` not found.", query.collection))),
                };
                outcome.unwrap_or_else(|(code, error)| SearchResponse {
                    error: Some(error),
                    code: Some(code),
                    ..Default::default()
                })
            })
            .collect();
        Ok(responses)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Filters, compile_filters};
    use crate::schema::{CollectionDescriptor, build_schema};

    async fn engine_with(docs: Vec<Value>) -> InMemoryEngine {
        let engine = InMemoryEngine::new();
        let schema = build_schema(&CollectionDescriptor::new("docs", 2));
        engine.create_collection(&schema).await.unwrap();
        for doc in docs {
            engine.upsert_document("docs", &doc).await.unwrap();
        }
        engine
    }

    fn query(q: &str) -> SearchQuery {
        SearchQuery {
            collection: "docs".into(),
            q: q.into(),
            query_by: Some("content".into()),
            vector_query: None,
            filter_by: None,
            limit: 10,
        }
    }

    fn ids(response: &SearchResponse) -> Vec<&str> {
        response.hits.iter().filter_map(|h| h["document"]["id"].as_str()).collect()
    }

    #[tokio::test]
    async fn duplicate_collection_is_rejected() {
        let engine = engine_with(vec![]).await;
        let err = engine
            .create_collection(&build_schema(&CollectionDescriptor::new("docs", 2)))
            .await
            .unwrap_err();
        assert!(matches!(err, KnowledgeError::EngineError { status: Some(409), .. }));
    }

    #[tokio::test]
    async fn wrong_dimensionality_is_rejected_on_write() {
        let engine = engine_with(vec![]).await;
        let err = engine
            .upsert_document("docs", &json!({"id": "a", "content": "x", "embedding": [1.0]}))
            .await
            .unwrap_err();
        assert!(matches!(err, KnowledgeError::EngineError { status: Some(400), .. }));
    }

    #[tokio::test]
    async fn keyword_ranks_by_matched_tokens() {
        let engine = engine_with(vec![
            json!({"id": "a", "content": "red apple"}),
            json!({"id": "b", "content": "red apple pie"}),
            json!({"id": "c", "content": "green pear"}),
        ])
        .await;
        let responses = engine.multi_search(&[query("apple pie")]).await.unwrap();
        assert_eq!(ids(&responses[0]), vec!["b", "a"]);
        assert_eq!(responses[0].found, Some(2));
    }

    #[tokio::test]
    async fn unknown_filter_field_is_a_query_error() {
        let engine = engine_with(vec![json!({"id": "a", "content": "x"})]).await;
        let filters: Filters = json!({"colour": "red"}).as_object().cloned().unwrap();
        let mut q = query("*");
        q.filter_by = compile_filters(Some(&filters));
        let responses = engine.multi_search(&[q]).await.unwrap();
        assert_eq!(responses[0].code, Some(404));
        assert!(responses[0].hits.is_empty());
    }

    #[tokio::test]
    async fn nested_metadata_filters_apply() {
        let engine = engine_with(vec![
            json!({"id": "a", "content": "x", "metadata": {"topic": "rust"}}),
            json!({"id": "b", "content": "y", "metadata": {"topic": "go"}}),
        ])
        .await;
        let filters: Filters =
            json!({"metadata.topic": ["rust", "zig"]}).as_object().cloned().unwrap();
        let mut q = query("*");
        q.filter_by = compile_filters(Some(&filters));
        let responses = engine.multi_search(&[q]).await.unwrap();
        assert_eq!(ids(&responses[0]), vec!["a"]);
    }

    #[tokio::test]
    async fn hybrid_fuses_both_rankings() {
        let engine = engine_with(vec![
            json!({"id": "a", "content": "apple", "embedding": [0.0, 1.0]}),
            json!({"id": "b", "content": "banana", "embedding": [1.0, 0.0]}),
        ])
        .await;
        let mut q = query("apple");
        q.vector_query = Some(VectorQuery {
            field: "embedding".into(),
            vector: vec![1.0, 0.0],
            k: None,
            ef: None,
        });
        let responses = engine.multi_search(&[q]).await.unwrap();
        // "a" wins the lexical rank (weight 0.7), "b" the vector rank (0.3).
        assert_eq!(ids(&responses[0]), vec!["a", "b"]);
        let hit = &responses[0].hits[0];
        assert!(hit["text_match"].is_number());
        assert!(hit["hybrid_search_info"]["rank_fusion_score"].is_number());
    }

    #[test]
    fn distances_follow_metric() {
        let a = [1.0, 0.0];
        let b = [0.0, 1.0];
        assert!((distance(DistanceMetric::Cosine, &a, &a)).abs() < 1e-9);
        assert!((distance(DistanceMetric::Cosine, &a, &b) - 1.0).abs() < 1e-9);
        assert!((distance(DistanceMetric::Euclidean, &a, &b) - 2f64.sqrt()).abs() < 1e-9);
        assert!((distance(DistanceMetric::DotProduct, &a, &a)).abs() < 1e-9);
    }
}
