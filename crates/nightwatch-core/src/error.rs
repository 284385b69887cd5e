use thiserror::Error;

/// Top-level error type for the Nightwatch system.
///
/// Each crate defines its own error type for its bounded context and
/// implements `From<NightwatchError>` so that `?` works across crate
/// boundaries. Tools never let these escape: they are rendered into the
/// answer text at the tool-run boundary.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NightwatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing configuration: {0}")]
    MissingConfiguration(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Query execution error: {0}")]
    QueryExecution(String),

    #[error("Ingestion error: {0}")]
    Ingestion(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for NightwatchError {
    fn from(err: toml::de::Error) -> Self {
        NightwatchError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for NightwatchError {
    fn from(err: toml::ser::Error) -> Self {
        NightwatchError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for NightwatchError {
    fn from(err: serde_json::Error) -> Self {
        NightwatchError::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for NightwatchError {
    fn from(err: reqwest::Error) -> Self {
        NightwatchError::Http(err.to_string())
    }
}

/// A specialized `Result` type for Nightwatch operations.
pub type Result<T> = std::result::Result<T, NightwatchError>;
