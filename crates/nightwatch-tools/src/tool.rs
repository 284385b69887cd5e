//! The tool contract and the dependencies injected into tools.

use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use nightwatch_core::config::NightwatchConfig;
use nightwatch_core::llm::CompletionService;
use nightwatch_vector::cache::VectorIndexCache;

use crate::error::ToolError;
use crate::kql::client::LogQueryService;
use crate::nsg::storage::BlobStore;

/// Keyword arguments passed to a tool run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolInput {
    pub data: Value,
}

impl ToolInput {
    pub fn new(data: Value) -> Self {
        Self { data }
    }

    /// Input carrying only a natural-language question.
    pub fn question(query: impl Into<String>) -> Self {
        let mut map = Map::new();
        map.insert("query".to_string(), Value::String(query.into()));
        Self {
            data: Value::Object(map),
        }
    }

    /// A string field, trimmed, treating empty values as absent.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data
            .get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Deserialize the input into a tool-specific argument struct.
    /// A missing payload is treated as an empty object.
    pub fn parse<T: DeserializeOwned>(&self) -> Result<T, ToolError> {
        let data = match &self.data {
            Value::Null => Value::Object(Map::new()),
            other => other.clone(),
        };
        serde_json::from_value(data).map_err(|e| ToolError::InvalidInput(e.to_string()))
    }
}

/// A named capability that answers a query with text.
///
/// `run` never fails: every error is rendered into the returned string.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique, human-readable name used for routing.
    fn name(&self) -> &str;

    /// One-line description of what the tool answers.
    fn description(&self) -> &str;

    async fn run(&self, input: &ToolInput) -> String;
}

/// Load-time constructor for a tool. Returning `None` means the tool is not
/// available in this environment and is skipped.
pub type ToolFactory = fn(&ToolContext) -> Option<Arc<dyn Tool>>;

/// Shared clients and configuration handed to every [`ToolFactory`].
///
/// Clients are `None` when their configuration is absent.
#[derive(Clone, Default)]
pub struct ToolContext {
    pub config: NightwatchConfig,
    pub llm: Option<Arc<dyn CompletionService>>,
    pub log_query: Option<Arc<dyn LogQueryService>>,
    pub blob_store: Option<Arc<dyn BlobStore>>,
    pub index_cache: Option<Arc<VectorIndexCache>>,
}

impl ToolContext {
    pub fn new(config: NightwatchConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn with_llm(mut self, llm: Arc<dyn CompletionService>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_log_query(mut self, client: Arc<dyn LogQueryService>) -> Self {
        self.log_query = Some(client);
        self
    }

    pub fn with_blob_store(mut self, store: Arc<dyn BlobStore>) -> Self {
        self.blob_store = Some(store);
        self
    }

    pub fn with_index_cache(mut self, cache: Arc<VectorIndexCache>) -> Self {
        self.index_cache = Some(cache);
        self
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("llm", &self.llm.is_some())
            .field("log_query", &self.log_query.is_some())
            .field("blob_store", &self.blob_store.is_some())
            .field("index_cache", &self.index_cache.is_some())
            .finish()
    }
}
