//! Data types for documents, search modes, and ingestion reports.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A document stored in, or retrieved from, a knowledge store collection.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier within the collection. An empty id is replaced by a
    /// generated UUID at ingest time.
    pub id: String,
    /// The text body. May be empty for documents used only through vector search.
    pub content: String,
    /// The vector embedding. Computed at ingest time when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    /// Opaque metadata, passed through verbatim and used as the source of filters.
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Document {
    /// Create a document with the given id and content.
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { id: id.into(), content: content.into(), ..Default::default() }
    }

    /// Attach a precomputed embedding.
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// The retrieval strategy used for a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchMode {
    /// Pure vector similarity over the embedding field.
    #[default]
    Vector,
    /// Pure lexical matching over the content field.
    Keyword,
    /// Lexical and vector clauses in one request, ranked by engine-side fusion.
    Hybrid,
}

impl SearchMode {
    /// The lowercase name used in logs and tool arguments.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vector => "vector",
            Self::Keyword => "keyword",
            Self::Hybrid => "hybrid",
        }
    }

    /// Parse a mode name as accepted in tool arguments.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "vector" => Some(Self::Vector),
            "keyword" => Some(Self::Keyword),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a single document made it into the collection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestStatus {
    /// The document was stored.
    Stored,
    /// The document was not stored.
    Failed {
        /// Why the document was rejected.
        reason: String,
    },
}

/// The ingestion outcome of one document in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestOutcome {
    /// The document id (generated if the caller left it empty).
    pub id: String,
    /// Whether the document was stored.
    #[serde(flatten)]
    pub status: IngestStatus,
}

impl IngestOutcome {
    pub(crate) fn stored(id: impl Into<String>) -> Self {
        Self { id: id.into(), status: IngestStatus::Stored }
    }

    pub(crate) fn failed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { id: id.into(), status: IngestStatus::Failed { reason: reason.into() } }
    }

    /// Whether the document was stored.
    pub fn is_stored(&self) -> bool {
        matches!(self.status, IngestStatus::Stored)
    }
}

/// Per-document ledger of a batch insert, in input order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IngestReport {
    /// One outcome per input document.
    pub outcomes: Vec<IngestOutcome>,
}

impl IngestReport {
    /// Number of documents in the batch.
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Whether the batch was empty.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Outcomes of documents that were stored.
    pub fn succeeded(&self) -> impl Iterator<Item = &IngestOutcome> {
        self.outcomes.iter().filter(|o| o.is_stored())
    }

    /// Outcomes of documents that failed.
    pub fn failed(&self) -> impl Iterator<Item = &IngestOutcome> {
        self.outcomes.iter().filter(|o| !o.is_stored())
    }

    /// Ids of documents that failed.
    pub fn failed_ids(&self) -> Vec<&str> {
        self.failed().map(|o| o.id.as_str()).collect()
    }

    /// Whether every document was stored.
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(IngestOutcome::is_stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_partitions_outcomes() {
        let report = IngestReport {
            outcomes: vec![
                IngestOutcome::stored("a"),
                IngestOutcome::failed("b", "embedding failed"),
                IngestOutcome::stored("c"),
            ],
        };
        assert_eq!(report.len(), 3);
        assert_eq!(report.succeeded().count(), 2);
        assert_eq!(report.failed_ids(), vec!["b"]);
        assert!(!report.is_success());
    }

    #[test]
    fn outcome_serializes_flat() {
        let json = serde_json::to_value(IngestOutcome::failed("x", "nope")).unwrap();
        assert_eq!(json, serde_json::json!({"id": "x", "status": "failed", "reason": "nope"}));
    }

    #[test]
    fn search_mode_parses_case_insensitively() {
        assert_eq!(SearchMode::parse("Hybrid"), Some(SearchMode::Hybrid));
        assert_eq!(SearchMode::parse("semantic"), None);
        assert_eq!(SearchMode::default(), SearchMode::Vector);
    }

    #[test]
    fn document_skips_missing_embedding() {
        let json = serde_json::to_value(Document::new("a", "apple")).unwrap();
        assert!(json.get("embedding").is_none());
    }
}
