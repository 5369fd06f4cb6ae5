//! Knowledge search as an agent tool call.
//!
//! The [`KnowledgeSearchTool`] exposes [`KnowledgeStore`] search through the
//! name / description / JSON-schema / execute shape that agent frameworks
//! use for tools.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use adk_knowledge::KnowledgeSearchTool;
//!
//! let tool = KnowledgeSearchTool::new(Arc::new(store));
//!
//! // The agent calls the tool with:
//! // { "query": "How do I configure X?", "limit": 3, "filters": {"metadata.topic": "setup"} }
//! let results = tool.execute(args).await?;
//! ```

use std::sync::Arc;

use serde_json::{Value, json};
use tracing::{error, info};

use crate::document::SearchMode;
use crate::error::{KnowledgeError, Result};
use crate::store::KnowledgeStore;

/// A search tool backed by a [`KnowledgeStore`].
pub struct KnowledgeSearchTool {
    store: Arc<KnowledgeStore>,
}

impl KnowledgeSearchTool {
    /// Create a tool that searches `store`.
    pub fn new(store: Arc<KnowledgeStore>) -> Self {
        Self { store }
    }

    /// The tool name presented to the agent.
    pub fn name(&self) -> &str {
        "search_knowledge_base"
    }

    /// The tool description presented to the agent.
    pub fn description(&self) -> &str {
        "Search the knowledge base for documents relevant to a query"
    }

    /// JSON schema of the arguments accepted by [`execute`](Self::execute).
    pub fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "The text to search for"
                },
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "description": "Maximum number of documents to return. Uses the store default if omitted."
                },
                "filters": {
                    "type": "object",
                    "description": "Exact-match constraints, e.g. {\"metadata.filename\": \"guide.md\"}. A list value matches any of its elements."
                },
                "mode": {
                    "type": "string",
                    "enum": ["vector", "keyword", "hybrid"],
                    "description": "Retrieval strategy. Uses the store default if omitted."
                }
            },
            "required": ["query"]
        })
    }

    /// Run a search and return the matching documents as a JSON array.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::ConfigError`] when an argument is missing
    /// or malformed. A failed search is not an error: it yields `[]`.
    pub async fn execute(&self, args: Value) -> Result<Value> {
        let query = args
            .get("query")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                KnowledgeError::ConfigError("missing required 'query' parameter".into())
            })?;

        let limit = match args.get("limit") {
            None | Some(Value::Null) => self.store.config().default_limit,
            Some(value) => value
                .as_u64()
                .filter(|n| *n > 0)
                .map(|n| n as usize)
                .ok_or_else(|| {
                    KnowledgeError::ConfigError("'limit' must be a positive integer".into())
                })?,
        };

        let mode = match args.get("mode") {
            None | Some(Value::Null) => self.store.config().search_mode,
            Some(value) => value.as_str().and_then(SearchMode::parse).ok_or_else(|| {
                KnowledgeError::ConfigError(format!("unknown search mode {value}"))
            })?,
        };

        let filters = match args.get("filters") {
            None | Some(Value::Null) => None,
            Some(Value::Object(filters)) => Some(filters),
            Some(_) => {
                return Err(KnowledgeError::ConfigError("'filters' must be an object".into()));
            }
        };

        info!(query, limit, strategy = %mode, "knowledge search tool called");
        let documents = self.store.search_with_mode(query, mode, limit, filters).await;

        serde_json::to_value(&documents).map_err(|e| {
            error!(error = %e, "failed to serialize search results");
            KnowledgeError::MalformedResponse(format!("failed to serialize results: {e}"))
        })
    }
}
