pub mod config;
pub mod error;
pub mod llm;
pub mod time_range;
pub mod types;

pub use config::NightwatchConfig;
pub use error::{NightwatchError, Result};
pub use llm::{AzureOpenAiClient, CompletionService, LlmMessage, MockCompletion};
pub use types::*;
