//! Error types for the `adk-knowledge` crate.

use thiserror::Error;

/// Errors that can occur in knowledge store operations.
#[derive(Debug, Error)]
pub enum KnowledgeError {
    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The search engine rejected a request or could not be reached.
    #[error("Engine error ({backend}): {message}")]
    EngineError {
        /// The engine backend that produced the error.
        backend: String,
        /// HTTP-style status code reported by the engine, when there is one.
        status: Option<u16>,
        /// A description of the failure.
        message: String,
    },

    /// The requested collection or document does not exist.
    #[error("Not found ({backend}): {resource}")]
    NotFound {
        /// The engine backend that reported the missing resource.
        backend: String,
        /// The collection or document that was looked up.
        resource: String,
    },

    /// An embedding does not match the collection's declared dimensionality.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The collection dimensionality.
        expected: usize,
        /// The length of the offending embedding.
        actual: usize,
    },

    /// The engine returned a payload that could not be decoded.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// A collection could not be provisioned.
    #[error("Provisioning error ({collection}): {message}")]
    ProvisioningError {
        /// The collection being created or dropped.
        collection: String,
        /// A description of the failure.
        message: String,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// An error reading source files.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl KnowledgeError {
    /// Whether this error reports a missing collection or document.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether the failed call may succeed if sent again.
    ///
    /// Transport failures (no status) and server-side `5xx` responses are
    /// retryable. Client errors and everything raised locally are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::EngineError { status: None, .. } => true,
            Self::EngineError { status: Some(code), .. } => *code >= 500,
            _ => false,
        }
    }
}

/// A convenience result type for knowledge store operations.
pub type Result<T> = std::result::Result<T, KnowledgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn engine_error(status: Option<u16>) -> KnowledgeError {
        KnowledgeError::EngineError {
            backend: "typesense".into(),
            status,
            message: "boom".into(),
        }
    }

    #[test]
    fn retryable_covers_transport_and_server_errors() {
        assert!(engine_error(None).is_retryable());
        assert!(engine_error(Some(503)).is_retryable());
        assert!(!engine_error(Some(400)).is_retryable());
        assert!(!KnowledgeError::ConfigError("bad".into()).is_retryable());
    }

    #[test]
    fn not_found_is_detected() {
        let err = KnowledgeError::NotFound { backend: "inmemory".into(), resource: "docs".into() };
        assert!(err.is_not_found());
        assert!(!engine_error(Some(404)).is_not_found());
        assert_eq!(err.to_string(), "Not found (inmemory): docs");
    }
}
