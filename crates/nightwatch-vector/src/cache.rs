//! Build-once cache around the persisted flow-log index.
//!
//! The first caller that finds no index on disk builds one and persists it;
//! every later caller (in this process or a later one) loads what is on disk.
//! A persisted index is never refreshed, so results go stale as new flow logs
//! arrive until the index directory is removed.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use nightwatch_core::error::{NightwatchError, Result};

use crate::chunker::{chunk_documents, Document};
use crate::embedding::DynEmbeddingService;
use crate::index::{SearchHit, VectorIndex};

/// What [`VectorIndexCache::ensure_built`] found or did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildOutcome {
    /// An index was already loaded or persisted; nothing was built.
    Existing,
    /// A fresh index was built from `chunks` chunks and persisted.
    Built { chunks: usize },
    /// The loader produced no documents; nothing was persisted.
    Empty,
}

/// Shared handle over the single on-disk index of a deployment.
pub struct VectorIndexCache {
    path: PathBuf,
    chunk_size: usize,
    embedder: Arc<dyn DynEmbeddingService>,
    /// Doubles as the build guard: check-then-build runs under this lock.
    index: Mutex<Option<Arc<VectorIndex>>>,
}

impl std::fmt::Debug for VectorIndexCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndexCache")
            .field("path", &self.path)
            .field("chunk_size", &self.chunk_size)
            .finish()
    }
}

impl VectorIndexCache {
    pub fn new(path: impl Into<PathBuf>, chunk_size: usize, embedder: Arc<dyn DynEmbeddingService>) -> Self {
        Self {
            path: path.into(),
            chunk_size,
            embedder,
            index: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether an index has been persisted at the cache location.
    pub fn is_persisted(&self) -> bool {
        VectorIndex::exists(&self.path)
    }

    /// Make sure an index is available, building it with `loader` only when
    /// nothing is persisted yet.
    ///
    /// `loader` is not called at all when an index exists.
    pub async fn ensure_built<F, Fut>(&self, loader: F) -> Result<BuildOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<Document>>>,
    {
        let mut slot = self.index.lock().await;
        if slot.is_some() {
            return Ok(BuildOutcome::Existing);
        }
        if VectorIndex::exists(&self.path) {
            *slot = Some(Arc::new(VectorIndex::load(&self.path)?));
            return Ok(BuildOutcome::Existing);
        }

        let documents = loader().await?;
        let chunks = chunk_documents(&documents, self.chunk_size);
        if chunks.is_empty() {
            info!(path = %self.path.display(), "No documents to index");
            return Ok(BuildOutcome::Empty);
        }

        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batch_boxed(&texts).await?;
        if vectors.len() != chunks.len() {
            return Err(NightwatchError::Search(format!(
                "embedded {} of {} chunks",
                vectors.len(),
                chunks.len()
            )));
        }

        let index = VectorIndex::new();
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            let mut metadata = chunk.metadata;
            if let Some(map) = metadata.as_object_mut() {
                map.insert("chars".to_string(), json!(chunk.text.chars().count()));
            }
            index.insert(Uuid::new_v4(), vector, chunk.text, metadata)?;
        }
        index.save(&self.path)?;

        let built = index.len();
        info!(path = %self.path.display(), chunks = built, "Vector index built");
        *slot = Some(Arc::new(index));
        Ok(BuildOutcome::Built { chunks: built })
    }

    /// Return the `k` chunks nearest to `query`.
    ///
    /// Loads the persisted index on first use. Fails when nothing has been
    /// built yet.
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let index = self.handle().await?;
        let vector = self.embedder.embed_boxed(query).await?;
        let hits = index.search(&vector, k)?;
        debug!(hits = hits.len(), k, "Index search complete");
        Ok(hits)
    }

    async fn handle(&self) -> Result<Arc<VectorIndex>> {
        let mut slot = self.index.lock().await;
        if let Some(index) = slot.as_ref() {
            return Ok(Arc::clone(index));
        }
        if !VectorIndex::exists(&self.path) {
            return Err(NightwatchError::Search(format!(
                "no index at {}",
                self.path.display()
            )));
        }
        let index = Arc::new(VectorIndex::load(&self.path)?);
        *slot = Some(Arc::clone(&index));
        Ok(index)
    }
}
