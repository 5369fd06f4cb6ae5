//! Maps raw engine hits into [`Document`]s.
//!
//! A hit is an object holding the stored `document` plus whatever relevance
//! signals the engine attached to it. Relevance values are placed in the
//! output metadata under the reserved keys below. The stored metadata object
//! is merged back verbatim, and every other stored field except `id`,
//! `content` and `embedding` is kept in metadata as well, so nothing the
//! engine returns is silently dropped.
//!
//! A hit without a string `id` is skipped and logged; the rest of the batch
//! is still returned.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::warn;

use crate::document::Document;
use crate::schema::{CONTENT_FIELD, EMBEDDING_FIELD, ID_FIELD, METADATA_FIELD};

/// Metadata key for the engine-reported vector distance (lower is closer).
pub const VECTOR_DISTANCE_KEY: &str = "vector_distance";
/// Metadata key for the engine-reported lexical score (higher is better).
pub const TEXT_MATCH_KEY: &str = "text_match";
/// Metadata key for the engine's fused hybrid score (higher is better).
pub const RANK_FUSION_SCORE_KEY: &str = "rank_fusion_score";

/// Convert raw hits into documents, preserving engine order.
pub fn normalize(hits: Vec<Value>) -> Vec<Document> {
    hits.into_iter()
        .enumerate()
        .filter_map(|(index, hit)| match normalize_hit(hit) {
            Ok(document) => Some(document),
            Err(reason) => {
                warn!(hit.index = index, reason, "skipping malformed search hit");
                None
            }
        })
        .collect()
}

fn normalize_hit(hit: Value) -> Result<Document, &'static str> {
    let Value::Object(mut hit) = hit else {
        return Err("hit is not an object");
    };
    let Some(Value::Object(mut stored)) = hit.remove("document") else {
        return Err("hit carries no document object");
    };
    let id = match stored.remove(ID_FIELD) {
        Some(Value::String(id)) if !id.is_empty() => id,
        _ => return Err("document has no string id"),
    };
    let content = match stored.remove(CONTENT_FIELD) {
        Some(Value::String(content)) => content,
        _ => String::new(),
    };
    let embedding = stored.remove(EMBEDDING_FIELD).and_then(decode_embedding);

    let mut metadata: HashMap<String, Value> = HashMap::new();
    if let Some(Value::Object(user)) = stored.remove(METADATA_FIELD) {
        metadata.extend(user);
    }
    metadata.extend(stored);
    attach_relevance(&hit, &mut metadata);

    Ok(Document { id, content, embedding, metadata })
}

fn attach_relevance(hit: &Map<String, Value>, metadata: &mut HashMap<String, Value>) {
    if let Some(distance) = hit.get(VECTOR_DISTANCE_KEY).filter(|v| v.is_number()) {
        metadata.insert(VECTOR_DISTANCE_KEY.to_string(), distance.clone());
    }
    if let Some(score) = hit.get(TEXT_MATCH_KEY).filter(|v| v.is_number()) {
        metadata.insert(TEXT_MATCH_KEY.to_string(), score.clone());
    }
    let fusion = hit
        .get("hybrid_search_info")
        .and_then(|info| info.get(RANK_FUSION_SCORE_KEY))
        .filter(|v| v.is_number());
    if let Some(score) = fusion {
        metadata.insert(RANK_FUSION_SCORE_KEY.to_string(), score.clone());
    }
}

fn decode_embedding(value: Value) -> Option<Vec<f32>> {
    let Value::Array(items) = value else {
        return None;
    };
    if items.is_empty() {
        return None;
    }
    items.iter().map(|v| v.as_f64().map(|x| x as f32)).collect()
}
