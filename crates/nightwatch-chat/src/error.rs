//! Error types for the conversational interface.

use nightwatch_core::error::NightwatchError;

/// Errors from the chat engine.
///
/// The orchestrator turns routing and unknown-tool failures into fallback
/// answers, so none of these reach the conversation boundary.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("no route found: {0}")]
    Routing(String),
    #[error("tool not found: {0}")]
    UnknownTool(String),
    #[error(transparent)]
    Core(#[from] NightwatchError),
}
