//! Nightwatch vector crate: embeddings, the flow-log vector index, text
//! splitting and the build-once index cache.

pub mod cache;
pub mod chunker;
pub mod embedding;
pub mod index;

pub use cache::{BuildOutcome, VectorIndexCache};
pub use chunker::{chunk_documents, split_text, Document, IndexChunk};
pub use embedding::{AzureOpenAiEmbeddings, DynEmbeddingService, EmbeddingService, MockEmbedding};
pub use index::{SearchHit, VectorIndex};
