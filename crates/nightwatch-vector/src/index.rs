//! In-memory vector index with brute-force cosine similarity search and
//! JSON persistence.
//!
//! Search is O(n) over every stored chunk, which is fine for the few
//! thousand chunks a flow-log window produces.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use nightwatch_core::error::{NightwatchError, Result};

/// File holding the persisted index inside the index directory.
pub const INDEX_FILE_NAME: &str = "index.json";

const INDEX_FORMAT_VERSION: u32 = 1;

/// A single hit returned from a vector search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub id: Uuid,
    /// Cosine similarity score.
    pub score: f64,
    /// The chunk text that was embedded.
    pub text: String,
    pub metadata: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VectorEntry {
    embedding: Vec<f32>,
    text: String,
    metadata: Value,
}

#[derive(Serialize, Deserialize)]
struct PersistedIndex {
    version: u32,
    built_at: DateTime<Utc>,
    entries: Vec<PersistedEntry>,
}

#[derive(Serialize, Deserialize)]
struct PersistedEntry {
    id: Uuid,
    #[serde(flatten)]
    entry: VectorEntry,
}

/// In-memory vector index using brute-force cosine similarity.
///
/// Thread-safe via interior RwLock.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    entries: Arc<RwLock<HashMap<Uuid, VectorEntry>>>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert a chunk and its embedding. Overwrites any entry with the same ID.
    pub fn insert(&self, id: Uuid, embedding: Vec<f32>, text: String, metadata: Value) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|e| NightwatchError::Storage(format!("Lock poisoned: {}", e)))?;
        entries.insert(
            id,
            VectorEntry {
                embedding,
                text,
                metadata,
            },
        );
        Ok(())
    }

    /// Search for the k nearest chunks to the query vector by cosine similarity.
    ///
    /// Results are sorted by descending score.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        let entries = self
            .entries
            .read()
            .map_err(|e| NightwatchError::Storage(format!("Lock poisoned: {}", e)))?;

        let mut scored: Vec<SearchHit> = entries
            .iter()
            .map(|(id, entry)| SearchHit {
                id: *id,
                score: cosine_similarity(query, &entry.embedding),
                text: entry.text.clone(),
                metadata: entry.metadata.clone(),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        scored.truncate(k);

        Ok(scored)
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Location of the index file inside `dir`.
    pub fn file_path(dir: &Path) -> PathBuf {
        dir.join(INDEX_FILE_NAME)
    }

    /// Whether a persisted index exists in `dir`.
    pub fn exists(dir: &Path) -> bool {
        Self::file_path(dir).is_file()
    }

    /// Persist the index to `dir`, creating it if needed.
    ///
    /// Writes to a temporary file first and renames it into place so a
    /// reader never observes a half-written index.
    pub fn save(&self, dir: &Path) -> Result<()> {
        let entries = self
            .entries
            .read()
            .map_err(|e| NightwatchError::Storage(format!("Lock poisoned: {}", e)))?;

        let persisted = PersistedIndex {
            version: INDEX_FORMAT_VERSION,
            built_at: Utc::now(),
            entries: entries
                .iter()
                .map(|(id, entry)| PersistedEntry {
                    id: *id,
                    entry: entry.clone(),
                })
                .collect(),
        };

        std::fs::create_dir_all(dir)?;
        let target = Self::file_path(dir);
        let tmp = dir.join(format!("{}.tmp", INDEX_FILE_NAME));
        std::fs::write(&tmp, serde_json::to_vec(&persisted)?)?;
        std::fs::rename(&tmp, &target)?;

        info!(path = %target.display(), chunks = persisted.entries.len(), "Vector index saved");
        Ok(())
    }

    /// Load a previously persisted index from `dir`.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = Self::file_path(dir);
        let bytes = std::fs::read(&path)?;
        let persisted: PersistedIndex = serde_json::from_slice(&bytes)?;
        if persisted.version != INDEX_FORMAT_VERSION {
            return Err(NightwatchError::Storage(format!(
                "unsupported index version {} at {}",
                persisted.version,
                path.display()
            )));
        }

        let entries: HashMap<Uuid, VectorEntry> = persisted
            .entries
            .into_iter()
            .map(|p| (p.id, p.entry))
            .collect();

        info!(
            path = %path.display(),
            chunks = entries.len(),
            built_at = %persisted.built_at,
            "Vector index loaded"
        );
        Ok(Self {
            entries: Arc::new(RwLock::new(entries)),
        })
    }
}

impl Default for VectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude or the lengths differ.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();

    let mag_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let mag_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    dot / (mag_a * mag_b)
}
