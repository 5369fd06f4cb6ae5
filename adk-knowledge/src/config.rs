//! Configuration for the knowledge store and the Typesense transport.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::document::SearchMode;
use crate::error::{KnowledgeError, Result};

/// Behaviour of a [`KnowledgeStore`](crate::KnowledgeStore).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnowledgeConfig {
    /// Strategy used by [`KnowledgeStore::search`](crate::KnowledgeStore::search).
    pub search_mode: SearchMode,
    /// Result cap used when a caller does not supply one.
    pub default_limit: usize,
    /// Number of documents ingested concurrently. `1` ingests sequentially.
    pub ingest_concurrency: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self { search_mode: SearchMode::Vector, default_limit: 5, ingest_concurrency: 1 }
    }
}

impl KnowledgeConfig {
    /// Create a new builder for constructing a [`KnowledgeConfig`].
    pub fn builder() -> KnowledgeConfigBuilder {
        KnowledgeConfigBuilder::default()
    }

    /// Check the invariants the builder enforces.
    ///
    /// Needed for configs built as struct literals or deserialized from a
    /// file, which bypass [`KnowledgeConfigBuilder::build`].
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::ConfigError`] if `default_limit` or
    /// `ingest_concurrency` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.default_limit == 0 {
            return Err(KnowledgeError::ConfigError(
                "default_limit must be greater than zero".to_string(),
            ));
        }
        if self.ingest_concurrency == 0 {
            return Err(KnowledgeError::ConfigError(
                "ingest_concurrency must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`KnowledgeConfig`].
#[derive(Debug, Clone, Default)]
pub struct KnowledgeConfigBuilder {
    config: KnowledgeConfig,
}

impl KnowledgeConfigBuilder {
    /// Set the search strategy.
    pub fn search_mode(mut self, mode: SearchMode) -> Self {
        self.config.search_mode = mode;
        self
    }

    /// Set the default result cap.
    pub fn default_limit(mut self, limit: usize) -> Self {
        self.config.default_limit = limit;
        self
    }

    /// Set how many documents are ingested at once.
    pub fn ingest_concurrency(mut self, concurrency: usize) -> Self {
        self.config.ingest_concurrency = concurrency;
        self
    }

    /// Build the [`KnowledgeConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::ConfigError`] if `default_limit` or
    /// `ingest_concurrency` is zero.
    pub fn build(self) -> Result<KnowledgeConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Connection settings for a Typesense-compatible engine node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TypesenseConfig {
    /// API key sent with every request.
    pub api_key: String,
    /// Node host name.
    pub host: String,
    /// Node port.
    pub port: u16,
    /// `http` or `https`.
    pub protocol: String,
    /// Per-request timeout.
    #[serde(with = "duration_secs")]
    pub connection_timeout: Duration,
    /// Delay between retries of a failed request.
    #[serde(with = "duration_secs")]
    pub retry_interval: Duration,
    /// Retries after the first attempt.
    pub num_retries: usize,
}

impl Default for TypesenseConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            host: "localhost".to_string(),
            port: 8108,
            protocol: "http".to_string(),
            connection_timeout: Duration::from_secs(2),
            retry_interval: Duration::from_millis(100),
            num_retries: 3,
        }
    }
}

impl TypesenseConfig {
    /// Create a new builder for constructing a [`TypesenseConfig`].
    pub fn builder() -> TypesenseConfigBuilder {
        TypesenseConfigBuilder::default()
    }

    /// Read the node from `TYPESENSE_API_KEY`, `TYPESENSE_HOST`,
    /// `TYPESENSE_PORT` and `TYPESENSE_PROTOCOL`.
    ///
    /// Only the API key is mandatory; the rest fall back to a local node.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("TYPESENSE_API_KEY").map_err(|_| {
            KnowledgeError::ConfigError("TYPESENSE_API_KEY environment variable not set".into())
        })?;
        let mut builder = Self::builder().api_key(api_key);
        if let Ok(host) = std::env::var("TYPESENSE_HOST") {
            builder = builder.host(host);
        }
        if let Ok(port) = std::env::var("TYPESENSE_PORT") {
            let port = port.parse::<u16>().map_err(|e| {
                KnowledgeError::ConfigError(format!("invalid TYPESENSE_PORT '{port}': {e}"))
            })?;
            builder = builder.port(port);
        }
        if let Ok(protocol) = std::env::var("TYPESENSE_PROTOCOL") {
            builder = builder.protocol(protocol);
        }
        builder.build()
    }

    /// The base URL of the node, without a trailing slash.
    pub fn base_url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }
}

/// Builder for constructing a validated [`TypesenseConfig`].
#[derive(Debug, Clone, Default)]
pub struct TypesenseConfigBuilder {
    config: TypesenseConfig,
}

impl TypesenseConfigBuilder {
    /// Set the API key.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = key.into();
        self
    }

    /// Set the host.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    /// Set the port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    /// Set the protocol (`http` or `https`).
    pub fn protocol(mut self, protocol: impl Into<String>) -> Self {
        self.config.protocol = protocol.into();
        self
    }

    /// Set the per-request timeout.
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout = timeout;
        self
    }

    /// Set the delay between retries.
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.config.retry_interval = interval;
        self
    }

    /// Set the number of retries after the first attempt.
    pub fn num_retries(mut self, retries: usize) -> Self {
        self.config.num_retries = retries;
        self
    }

    /// Build the [`TypesenseConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::ConfigError`] if the API key or host is
    /// empty, or the protocol is neither `http` nor `https`.
    pub fn build(self) -> Result<TypesenseConfig> {
        if self.config.api_key.is_empty() {
            return Err(KnowledgeError::ConfigError("api_key must not be empty".to_string()));
        }
        if self.config.host.is_empty() {
            return Err(KnowledgeError::ConfigError("host must not be empty".to_string()));
        }
        if !matches!(self.config.protocol.as_str(), "http" | "https") {
            return Err(KnowledgeError::ConfigError(format!(
                "protocol must be 'http' or 'https', got '{}'",
                self.config.protocol
            )));
        }
        Ok(self.config)
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
