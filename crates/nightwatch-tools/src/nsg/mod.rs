//! NSG flow-log tools: blob access, ingestion, and the retrieval tool built
//! on the vector index.

pub mod ingest;
pub mod prompt;
pub mod storage;
pub mod tool;

pub use ingest::{decode_blob, ingest_flows, parse_flow_log};
pub use prompt::build_preview_prompt;
pub use storage::{AzureBlobStore, BlobInfo, BlobStore, MemoryBlobStore};
pub use tool::{warm_index, NsgFlowLogsTool};
