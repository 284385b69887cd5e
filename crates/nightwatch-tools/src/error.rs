//! Error types for the tool layer.
//!
//! Tools never return these to callers; each `Tool::run` renders them into
//! the answer text.

use nightwatch_core::error::NightwatchError;

/// Errors raised while a tool is answering a query.
#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Query execution failed: {0}")]
    QueryExecution(String),
    #[error("Ingestion failed: {0}")]
    Ingestion(String),
    #[error("Index error: {0}")]
    Index(String),
    #[error(transparent)]
    Core(#[from] NightwatchError),
}
