//! Embedding service trait and implementations.
//!
//! - `AzureOpenAiEmbeddings` calls an Azure OpenAI embeddings deployment.
//!   This is the production embedding backend.
//! - `MockEmbedding` provides deterministic hash-based vectors for testing.

use std::collections::hash_map::DefaultHasher;
use std::future::Future;
use std::hash::{Hash, Hasher};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use nightwatch_core::config::{EmbeddingsConfig, LlmConfig};
use nightwatch_core::error::{NightwatchError, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Inputs sent per embeddings request.
pub const EMBED_BATCH_SIZE: usize = 16;

/// Service for generating text embeddings.
///
/// Used both when building the flow-log index and when embedding a query.
pub trait EmbeddingService: Send + Sync {
    /// Generate an embedding vector for the given text.
    fn embed(&self, text: &str) -> impl Future<Output = Result<Vec<f32>>> + Send;

    /// Embed several texts, preserving input order.
    fn embed_batch(&self, texts: &[String]) -> impl Future<Output = Result<Vec<Vec<f32>>>> + Send {
        async move {
            let mut vectors = Vec::with_capacity(texts.len());
            for text in texts {
                vectors.push(self.embed(text).await?);
            }
            Ok(vectors)
        }
    }

    /// Return the dimensionality of vectors produced by this service.
    fn dimensions(&self) -> usize;
}

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Object-safe version of [`EmbeddingService`] for dynamic dispatch.
///
/// `EmbeddingService` returns `impl Future` and so cannot be a trait object.
/// Every `EmbeddingService` gets this trait through the blanket impl below,
/// which lets `Arc<dyn DynEmbeddingService>` be injected into the cache.
pub trait DynEmbeddingService: Send + Sync {
    fn embed_boxed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>>;

    fn embed_batch_boxed<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;

    fn dimensions(&self) -> usize;
}

impl<T: EmbeddingService> DynEmbeddingService for T {
    fn embed_boxed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, Result<Vec<f32>>> {
        Box::pin(self.embed(text))
    }

    fn embed_batch_boxed<'a>(&'a self, texts: &'a [String]) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
        Box::pin(self.embed_batch(texts))
    }

    fn dimensions(&self) -> usize {
        EmbeddingService::dimensions(self)
    }
}

// ---------------------------------------------------------------------------
// AzureOpenAiEmbeddings
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// Azure OpenAI embeddings client.
pub struct AzureOpenAiEmbeddings {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    dimensions: usize,
}

impl std::fmt::Debug for AzureOpenAiEmbeddings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureOpenAiEmbeddings")
            .field("url", &self.url)
            .field("dimensions", &self.dimensions)
            .finish()
    }
}

impl AzureOpenAiEmbeddings {
    /// Build from configuration. The endpoint and key fall back to the chat
    /// settings; `Ok(None)` means no endpoint is configured anywhere.
    pub fn from_config(config: &EmbeddingsConfig, llm: &LlmConfig) -> Result<Option<Self>> {
        let Some(endpoint) = config.endpoint.as_ref().or(llm.endpoint.as_ref()) else {
            return Ok(None);
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(llm.request_timeout_secs))
            .build()?;
        Ok(Some(Self {
            http,
            url: embeddings_url(endpoint, &config.deployment, &config.api_version),
            api_key: config.api_key.clone().or_else(|| llm.api_key.clone()),
            dimensions: config.dimensions,
        }))
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut request = self.http.post(&self.url).json(&EmbeddingRequest { input: texts });
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NightwatchError::Search(format!(
                "embeddings returned {}: {}",
                status, body
            )));
        }

        let parsed: EmbeddingResponse = response.json().await?;
        order_embeddings(parsed.data, texts.len())
    }
}

/// `{endpoint}/openai/deployments/{deployment}/embeddings?api-version=...`
pub fn embeddings_url(endpoint: &str, deployment: &str, api_version: &str) -> String {
    format!(
        "{}/openai/deployments/{}/embeddings?api-version={}",
        endpoint.trim_end_matches('/'),
        deployment,
        api_version
    )
}

/// The API may return data out of order; restore input order by `index`.
fn order_embeddings(mut data: Vec<EmbeddingDatum>, expected: usize) -> Result<Vec<Vec<f32>>> {
    if data.len() != expected {
        return Err(NightwatchError::Search(format!(
            "expected {} embeddings, got {}",
            expected,
            data.len()
        )));
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

impl EmbeddingService for AzureOpenAiEmbeddings {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(NightwatchError::Search("Cannot embed empty text".to_string()));
        }
        let mut vectors = self.request(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| NightwatchError::Search("embeddings returned no data".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(EMBED_BATCH_SIZE) {
            debug!(inputs = batch.len(), "Requesting embeddings");
            vectors.extend(self.request(batch).await?);
        }
        Ok(vectors)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// ---------------------------------------------------------------------------
// MockEmbedding - deterministic hash-based vectors for testing
// ---------------------------------------------------------------------------

/// Mock embedding service producing deterministic unit vectors.
///
/// Identical inputs always map to identical vectors. Clones share one call
/// counter so tests can assert whether anything was embedded.
#[derive(Debug, Clone)]
pub struct MockEmbedding {
    dimensions: usize,
    calls: Arc<AtomicUsize>,
}

impl Default for MockEmbedding {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEmbedding {
    pub fn new() -> Self {
        Self::with_dimensions(64)
    }

    pub fn with_dimensions(dimensions: usize) -> Self {
        Self {
            dimensions,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of texts embedded so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hash_to_vector(&self, text: &str) -> Vec<f32> {
        let mut result: Vec<f32> = (0..self.dimensions)
            .map(|i| {
                let mut hasher = DefaultHasher::new();
                text.hash(&mut hasher);
                i.hash(&mut hasher);
                let h = hasher.finish();
                (((h as f64) / (u64::MAX as f64)) * 2.0 - 1.0) as f32
            })
            .collect();

        let norm: f32 = result.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for val in &mut result {
                *val /= norm;
            }
        }
        result
    }
}

impl EmbeddingService for MockEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if text.is_empty() {
            return Err(NightwatchError::Search("Cannot embed empty text".to_string()));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.hash_to_vector(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
