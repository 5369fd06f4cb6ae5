//! Collection provisioning.
//!
//! [`CollectionManager`] owns the administrative calls against the engine:
//! existence probes, idempotent creation from a [`CollectionDescriptor`],
//! and drops that tolerate a collection which is already gone.

use std::sync::Arc;

use tracing::{error, info};

use crate::engine::{CollectionInfo, SearchEngine};
use crate::error::{KnowledgeError, Result};
use crate::schema::{CollectionDescriptor, build_schema};

/// Creates, probes and drops collections on a [`SearchEngine`].
#[derive(Clone)]
pub struct CollectionManager {
    engine: Arc<dyn SearchEngine>,
}

impl CollectionManager {
    /// Create a manager for `engine`.
    pub fn new(engine: Arc<dyn SearchEngine>) -> Self {
        Self { engine }
    }

    /// Whether `name` exists.
    ///
    /// A missing collection yields `false`. Any other failure is logged and
    /// also yields `false`.
    pub async fn exists(&self, name: &str) -> bool {
        match self.engine.retrieve_collection(name).await {
            Ok(_) => true,
            Err(e) if e.is_not_found() => false,
            Err(e) => {
                error!(collection = name, error = %e, "failed to probe collection");
                false
            }
        }
    }

    /// Create the collection described by `descriptor` unless it already exists.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::ConfigError`] for an invalid descriptor and
    /// [`KnowledgeError::ProvisioningError`] if the engine rejects the schema.
    pub async fn create(&self, descriptor: &CollectionDescriptor) -> Result<()> {
        descriptor.validate()?;
        let name = descriptor.name.as_str();

        match self.engine.retrieve_collection(name).await {
            Ok(_) => return Ok(()),
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(provisioning(name, e)),
        }

        let schema = build_schema(descriptor);
        match self.engine.create_collection(&schema).await {
            Ok(_) => {
                info!(
                    collection = name,
                    dimensions = descriptor.dimensions,
                    distance = ?descriptor.distance,
                    "created collection"
                );
                Ok(())
            }
            Err(e) => {
                // A concurrent creator got there first.
                if self.exists(name).await {
                    info!(collection = name, error = %e, "collection already created");
                    return Ok(());
                }
                Err(provisioning(name, e))
            }
        }
    }

    /// Delete `name` and all its documents. A missing collection is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`KnowledgeError::ProvisioningError`] for any other failure.
    pub async fn drop(&self, name: &str) -> Result<()> {
        match self.engine.delete_collection(name).await {
            Ok(()) => {
                info!(collection = name, "dropped collection");
                Ok(())
            }
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(provisioning(name, e)),
        }
    }

    /// Every collection on the engine.
    pub async fn list(&self) -> Result<Vec<CollectionInfo>> {
        self.engine.list_collections().await
    }

    /// The engine's description of `name`.
    pub async fn describe(&self, name: &str) -> Result<CollectionInfo> {
        self.engine.retrieve_collection(name).await
    }

    /// Number of documents stored in `name`.
    pub async fn document_count(&self, name: &str) -> Result<u64> {
        Ok(self.describe(name).await?.num_documents)
    }
}

fn provisioning(collection: &str, e: KnowledgeError) -> KnowledgeError {
    error!(collection, error = %e, "collection provisioning failed");
    KnowledgeError::ProvisioningError { collection: collection.to_string(), message: e.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inmemory::InMemoryEngine;

    fn manager() -> CollectionManager {
        CollectionManager::new(Arc::new(InMemoryEngine::new()))
    }

    #[tokio::test]
    async fn create_is_idempotent() {
        let manager = manager();
        let descriptor = CollectionDescriptor::new("docs", 3);
        manager.create(&descriptor).await.unwrap();
        manager.create(&descriptor).await.unwrap();
        assert!(manager.exists("docs").await);
        assert_eq!(manager.list().await.unwrap().len(), 1);
        assert_eq!(manager.document_count("docs").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn drop_tolerates_missing_collection() {
        let manager = manager();
        manager.drop("never-created").await.unwrap();
        manager.create(&CollectionDescriptor::new("docs", 3)).await.unwrap();
        manager.drop("docs").await.unwrap();
        assert!(!manager.exists("docs").await);
    }

    #[tokio::test]
    async fn invalid_descriptor_is_a_config_error() {
        let err = manager().create(&CollectionDescriptor::new("docs", 0)).await.unwrap_err();
        assert!(matches!(err, KnowledgeError::ConfigError(_)));
    }
}
