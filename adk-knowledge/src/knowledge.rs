//! Loading a directory of text files into a knowledge store.
//!
//! [`KnowledgeBase`] reads files with a [`TextReader`], splits them with a
//! [`Chunker`], and inserts the chunks into a [`KnowledgeStore`] according
//! to a [`LoadPolicy`].
//!
//! # Example
//!
//! ```rust,ignore
//! use adk_knowledge::{KnowledgeBase, LoadPolicy};
//!
//! let knowledge = KnowledgeBase::new(Arc::new(store), "./corpus");
//! let summary = knowledge.load(LoadPolicy::default()).await?;
//! println!("loaded {} chunks", summary.report.succeeded().count());
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::chunking::{Chunker, FixedSizeChunker};
use crate::document::IngestReport;
use crate::error::Result;
use crate::reader::TextReader;
use crate::store::KnowledgeStore;

/// How [`KnowledgeBase::load`] treats an existing collection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadPolicy {
    /// Drop and recreate the collection before loading.
    pub recreate: bool,
    /// Load into a collection that already holds documents.
    pub append: bool,
}

impl LoadPolicy {
    /// Drop and reload everything.
    pub fn recreate() -> Self {
        Self { recreate: true, append: false }
    }

    /// Add the files on top of what is already stored.
    pub fn append() -> Self {
        Self { recreate: false, append: true }
    }
}

/// What a load did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadSummary {
    /// Number of files read.
    pub files: usize,
    /// Whether the existing documents were kept without loading.
    pub reused: bool,
    /// Outcome per chunk. Empty when `reused`.
    pub report: IngestReport,
}

/// A directory of text files backed by a [`KnowledgeStore`].
pub struct KnowledgeBase {
    store: Arc<KnowledgeStore>,
    source_dir: PathBuf,
    reader: TextReader,
    chunker: Arc<dyn Chunker>,
}

impl KnowledgeBase {
    /// Load files from `source_dir` into `store`.
    ///
    /// Files are read with a [`TextReader`] rooted at `source_dir` and split
    /// into 500-character chunks overlapping by 50.
    pub fn new(store: Arc<KnowledgeStore>, source_dir: impl Into<PathBuf>) -> Self {
        let source_dir = source_dir.into();
        Self {
            store,
            reader: TextReader::new().with_base_dir(source_dir.clone()),
            source_dir,
            chunker: Arc::new(FixedSizeChunker::default()),
        }
    }

    /// Use a different reader.
    pub fn with_reader(mut self, reader: TextReader) -> Self {
        self.reader = reader;
        self
    }

    /// Use a different chunker.
    pub fn with_chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = chunker;
        self
    }

    /// The backing store.
    pub fn store(&self) -> &Arc<KnowledgeStore> {
        &self.store
    }

    /// Load the directory according to `policy`.
    ///
    /// With `recreate` the collection is dropped and rebuilt first. Files
    /// are loaded when the collection is empty (or was just recreated), or
    /// when `append` is set; otherwise the stored documents are reused.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection cannot be dropped or provisioned,
    /// or the source directory cannot be read.
    pub async fn load(&self, policy: LoadPolicy) -> Result<LoadSummary> {
        let store = self.store.as_ref();
        let collection = store.collection();
        if policy.recreate {
            info!(collection, "recreating collection");
            store.drop().await?;
        }
        store.create().await?;

        let stored = store.document_count().await?;
        if stored > 0 && !policy.append {
            info!(collection, stored, "reusing existing documents");
            return Ok(LoadSummary { files: 0, reused: true, report: IngestReport::default() });
        }

        let documents = self.reader.read_dir(&self.source_dir).await?;
        let files = documents.len();
        let chunks = documents.iter().flat_map(|d| self.chunker.chunk(d)).collect::<Vec<_>>();
        info!(collection, files, chunks = chunks.len(), "loading knowledge base");

        let report = store.insert(chunks).await?;
        Ok(LoadSummary { files, reused: false, report })
    }
}
