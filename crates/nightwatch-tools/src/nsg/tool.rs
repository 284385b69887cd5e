//! NSG flow-log retrieval tool.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use nightwatch_core::error::{NightwatchError, Result};
use nightwatch_core::time_range;
use nightwatch_core::types::{FlowRecord, TimeRange};
use nightwatch_vector::cache::{BuildOutcome, VectorIndexCache};
use nightwatch_vector::chunker::Document;

use crate::error::ToolError;
use crate::nsg::ingest::{ingest_flows, DEFAULT_PREVIEW_FILES};
use crate::nsg::prompt::build_preview_prompt;
use crate::nsg::storage::BlobStore;
use crate::tool::{Tool, ToolContext, ToolInput};

pub const NSG_TOOL_NAME: &str = "NSG Flow Logs";

/// Arguments accepted by [`NsgFlowLogsTool`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NsgQueryArgs {
    #[serde(default)]
    pub query: String,
    #[serde(default)]
    pub time_range: Option<String>,
    /// Blob limit for the preview path.
    #[serde(default)]
    pub max_files: Option<usize>,
}

/// Answers flow-log questions by similarity search over the cached index,
/// building the index on first use.
pub struct NsgFlowLogsTool {
    store: Arc<dyn BlobStore>,
    cache: Option<Arc<VectorIndexCache>>,
    index_max_files: usize,
    lookback_days: i64,
    top_k: usize,
}

impl NsgFlowLogsTool {
    pub fn new(
        store: Arc<dyn BlobStore>,
        cache: Option<Arc<VectorIndexCache>>,
        index_max_files: usize,
        lookback_days: i64,
        top_k: usize,
    ) -> Self {
        Self {
            store,
            cache,
            index_max_files,
            lookback_days,
            top_k,
        }
    }

    /// Needs a blob store. Without an index cache the tool answers every
    /// question with the preview prompt.
    pub fn register_instance(ctx: &ToolContext) -> Option<Self> {
        let Some(store) = ctx.blob_store.clone() else {
            info!(tool = NSG_TOOL_NAME, "Blob storage not configured; tool unavailable");
            return None;
        };
        Some(Self::new(
            store,
            ctx.index_cache.clone(),
            ctx.config.storage.max_files,
            ctx.config.log_analytics.default_lookback_days,
            ctx.config.index.top_k,
        ))
    }

    async fn preview(&self, question: Option<&str>, max_files: usize) -> std::result::Result<String, ToolError> {
        let flows = ingest_flows(self.store.as_ref(), max_files, None).await?;
        info!(tool = NSG_TOOL_NAME, records = flows.len(), "Parsed flow records for preview");
        Ok(build_preview_prompt(question, &flows)?)
    }

    async fn retrieve(
        &self,
        cache: &VectorIndexCache,
        question: &str,
        window: TimeRange,
    ) -> std::result::Result<String, ToolError> {
        let outcome = cache
            .ensure_built(|| async {
                let flows = ingest_flows(self.store.as_ref(), self.index_max_files, Some(&window)).await?;
                if flows.is_empty() {
                    return Ok(Vec::new());
                }
                let mut documents = vec![flow_document(&flows)];
                documents.push(Document::new(
                    build_preview_prompt(Some(question), &flows)?,
                    json!({"source": "preview"}),
                ));
                Ok::<_, NightwatchError>(documents)
            })
            .await?;

        let empty_message = match outcome {
            BuildOutcome::Empty => return Ok("No NSG flow logs found for the given time range.".to_string()),
            BuildOutcome::Existing => "No relevant results found in cached NSG logs.",
            BuildOutcome::Built { .. } => "No relevant results found after indexing NSG logs.",
        };

        let hits = cache.search(question, self.top_k).await?;
        if hits.is_empty() {
            return Ok(empty_message.to_string());
        }
        let joined: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        Ok(joined.join("\n").trim().to_string())
    }
}

/// All records as one document of index lines.
fn flow_document(flows: &[FlowRecord]) -> Document {
    let lines: Vec<String> = flows.iter().map(FlowRecord::to_index_line).collect();
    Document::new(
        lines.join("\n"),
        json!({"source": "nsg_flow_logs", "records": flows.len()}),
    )
}

/// Build the index ahead of the first question if none is persisted.
///
/// Indexes every record of the most recent blobs, without a time filter and
/// without the preview document. Returns `Ok(None)` when storage or the
/// index cache is not configured.
pub async fn warm_index(ctx: &ToolContext) -> Result<Option<BuildOutcome>> {
    let (Some(store), Some(cache)) = (ctx.blob_store.clone(), ctx.index_cache.clone()) else {
        return Ok(None);
    };
    if cache.is_persisted() {
        info!(path = %cache.path().display(), "Vector index already persisted; skipping warm-up");
        return Ok(Some(BuildOutcome::Existing));
    }

    info!(path = %cache.path().display(), "Building NSG flow vector index");
    let max_files = ctx.config.storage.max_files;
    let outcome = cache
        .ensure_built(|| async move {
            let flows = ingest_flows(store.as_ref(), max_files, None).await?;
            if flows.is_empty() {
                return Ok(Vec::new());
            }
            Ok::<_, NightwatchError>(vec![flow_document(&flows)])
        })
        .await?;

    match outcome {
        BuildOutcome::Empty => warn!("No flow logs found; skipping vector index creation"),
        BuildOutcome::Built { chunks } => info!(chunks, "Vector index ready"),
        BuildOutcome::Existing => {}
    }
    Ok(Some(outcome))
}

#[async_trait]
impl Tool for NsgFlowLogsTool {
    fn name(&self) -> &str {
        NSG_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Search Azure NSG flow logs with a question and an optional time range like 'last 7 days'."
    }

    async fn run(&self, input: &ToolInput) -> String {
        let args = match input.parse::<NsgQueryArgs>() {
            Ok(args) => args,
            Err(e) => return format!("Error querying NSG logs: {}", e),
        };
        let question = args.query.trim();

        let result = match (&self.cache, question.is_empty()) {
            (Some(cache), false) => {
                let window = time_range::resolve_or_default(
                    args.time_range.as_deref(),
                    self.lookback_days,
                    Utc::now(),
                );
                self.retrieve(cache, question, window).await
            }
            _ => {
                let max_files = args.max_files.unwrap_or(DEFAULT_PREVIEW_FILES);
                self.preview(Some(question), max_files).await
            }
        };

        result.unwrap_or_else(|e| {
            warn!(tool = NSG_TOOL_NAME, error = %e, "NSG query failed");
            format!("Error querying NSG logs: {}", e)
        })
    }
}

pub fn register(ctx: &ToolContext) -> Option<Arc<dyn Tool>> {
    NsgFlowLogsTool::register_instance(ctx).map(|t| Arc::new(t) as Arc<dyn Tool>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nsg::storage::MemoryBlobStore;
    use chrono::Duration;
    use nightwatch_core::config::NightwatchConfig;
    use nightwatch_vector::embedding::MockEmbedding;
    use serde_json::json;

    fn flow_log(tuples: &[&str]) -> String {
        json!({
            "records": [{
                "time": Utc::now().to_rfc3339(),
                "properties": {"flows": [{"flows": [{"flowTuples": tuples}]}]}
            }]
        })
        .to_string()
    }

    fn store_with(tuples: &[&str]) -> Arc<MemoryBlobStore> {
        Arc::new(MemoryBlobStore::new().with_blob(
            "PT1H.json",
            Utc::now() - Duration::minutes(5),
            flow_log(tuples),
        ))
    }

    fn cache(dir: &std::path::Path, embedder: MockEmbedding) -> Arc<VectorIndexCache> {
        Arc::new(VectorIndexCache::new(dir.join("idx"), 512, Arc::new(embedder)))
    }

    const TUPLES: &[&str] = &[
        "1717236000,10.0.0.4,52.1.1.1,44321,443,T,O,A",
        "1717236001,203.0.113.9,10.0.0.4,51000,22,T,I,D",
    ];

    #[tokio::test]
    async fn test_builds_index_then_answers_from_it() {
        let dir = tempfile::tempdir().unwrap();
        let cache = cache(dir.path(), MockEmbedding::new());
        let tool = NsgFlowLogsTool::new(store_with(TUPLES), Some(cache.clone()), 20, 7, 50);

        let answer = tool.run(&ToolInput::question("denied ssh from 203.0.113.9")).await;
        assert!(answer.contains("SRC: 203.0.113.9:51000 → DST: 10.0.0.4:22 | T | Inbound | Denied"));
        assert!(cache.is_persisted());
    }

    #[tokio::test]
    async fn test_existing_index_is_used_without_ingestion() {
        let dir = tempfile::tempdir().unwrap();
        let first = NsgFlowLogsTool::new(store_with(TUPLES), Some(cache(dir.path(), MockEmbedding::new())), 20, 7, 5);
        first.run(&ToolInput::question("anything")).await;

        // New logs arrive but the persisted index is reused as-is.
        let embedder = MockEmbedding::new();
        let second = NsgFlowLogsTool::new(
            store_with(&["1,198.51.100.1,10.0.0.4,1,2,U,I,A"]),
            Some(cache(dir.path(), embedder.clone())),
            20,
            7,
            5,
        );
        let answer = second.run(&ToolInput::question("198.51.100.1")).await;
        assert!(!answer.contains("198.51.100.1"));
        assert_eq!(embedder.calls(), 1);
    }

    #[tokio::test]
    async fn test_no_logs_in_window() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryBlobStore::new());
        let tool = NsgFlowLogsTool::new(store, Some(cache(dir.path(), MockEmbedding::new())), 20, 7, 5);
        let answer = tool.run(&ToolInput::question("denied flows")).await;
        assert_eq!(answer, "No NSG flow logs found for the given time range.");
    }

    #[tokio::test]
    async fn test_old_records_filtered_by_time_range() {
        let dir = tempfile::tempdir().unwrap();
        let old = json!({
            "records": [{
                "time": (Utc::now() - Duration::days(10)).to_rfc3339(),
                "properties": {"flows": [{"flows": [{"flowTuples": TUPLES}]}]}
            }]
        })
        .to_string();
        let store = Arc::new(MemoryBlobStore::new().with_blob("old.json", Utc::now(), old));
        let tool = NsgFlowLogsTool::new(store, Some(cache(dir.path(), MockEmbedding::new())), 20, 7, 5);
        let answer = tool
            .run(&ToolInput::new(json!({"query": "denied", "time_range": "last 7 days"})))
            .await;
        assert_eq!(answer, "No NSG flow logs found for the given time range.");
    }

    #[tokio::test]
    async fn test_ingestion_error_is_rendered() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryBlobStore::new().with_blob("bad.json", Utc::now(), "{ nope"));
        let tool = NsgFlowLogsTool::new(store, Some(cache(dir.path(), MockEmbedding::new())), 20, 7, 5);
        let answer = tool.run(&ToolInput::question("denied")).await;
        assert!(answer.starts_with("Error querying NSG logs: "));
    }

    #[tokio::test]
    async fn test_empty_query_returns_preview() {
        let tool = NsgFlowLogsTool::new(store_with(TUPLES), None, 20, 7, 5);
        let answer = tool.run(&ToolInput::new(json!({"max_files": 1}))).await;
        assert!(answer.contains("Azure NSG"));
        assert!(answer.contains("\"srcIP\": \"203.0.113.9\""));
    }

    #[tokio::test]
    async fn test_warm_index_then_skip() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = MockEmbedding::new();
        let ctx = ToolContext::new(NightwatchConfig::default())
            .with_blob_store(store_with(TUPLES))
            .with_index_cache(cache(dir.path(), embedder.clone()));

        let outcome = warm_index(&ctx).await.unwrap();
        assert_eq!(outcome, Some(BuildOutcome::Built { chunks: 1 }));
        let outcome = warm_index(&ctx).await.unwrap();
        assert_eq!(outcome, Some(BuildOutcome::Existing));
        assert_eq!(embedder.calls(), 1);
    }

    #[tokio::test]
    async fn test_warm_index_unconfigured() {
        let ctx = ToolContext::default();
        assert_eq!(warm_index(&ctx).await.unwrap(), None);
    }

    #[test]
    fn test_registration_requires_blob_store() {
        assert!(register(&ToolContext::default()).is_none());
        let ctx = ToolContext::default().with_blob_store(store_with(TUPLES));
        assert_eq!(register(&ctx).unwrap().name(), "NSG Flow Logs");
    }
}
