use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{NightwatchError, Result};

/// Default on-disk location of the flow-log vector index.
pub const DEFAULT_INDEX_PATH: &str = ".nsg_vector_index";

/// Top-level configuration for Nightwatch.
///
/// Loaded from `~/.nightwatch/config.toml` by default, then overlaid with
/// the process environment (see [`NightwatchConfig::apply_env_overrides`]).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NightwatchConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub embeddings: EmbeddingsConfig,
    #[serde(default)]
    pub log_analytics: LogAnalyticsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub index: IndexConfig,
}

impl NightwatchConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: NightwatchConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| NightwatchError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Overlay values from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Overlay values from an arbitrary key lookup. Empty values are ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let set = |slot: &mut Option<String>, key: &str| {
            if let Some(value) = get(key) {
                *slot = Some(value);
            }
        };
        set(&mut self.llm.endpoint, "AZURE_OPENAI_ENDPOINT");
        set(&mut self.llm.deployment, "AZURE_OPENAI_DEPLOYMENT_NAME");
        set(&mut self.llm.api_key, "AZURE_OPENAI_API_KEY");
        set(&mut self.embeddings.api_key, "AZURE_OPENAI_EMBEDDINGS_API_KEY");
        set(&mut self.log_analytics.workspace_id, "AZURE_LOG_ANALYTICS_WORKSPACE_ID");
        set(&mut self.log_analytics.access_token, "AZURE_LOG_ANALYTICS_TOKEN");
        set(&mut self.storage.account_url, "AZURE_STORAGE_ACCOUNT_URL");
        set(&mut self.storage.container, "AZURE_STORAGE_CONTAINER");
        set(&mut self.storage.sas_token, "AZURE_STORAGE_SAS_TOKEN");

        if let Some(v) = get("AZURE_OPENAI_API_VERSION") {
            self.llm.api_version = v;
        }
        if let Some(v) = get("AZURE_OPENAI_EMBEDDINGS_DEPLOYMENT_NAME") {
            self.embeddings.deployment = v;
        }
        if let Some(v) = get("AZURE_OPENAI_EMBEDDINGS_API_VERSION") {
            self.embeddings.api_version = v;
        }
        if let Some(v) = get("NIGHTWATCH_INDEX_PATH") {
            self.index.path = v;
        }
        if let Some(v) = get("DEFAULT_LOOKBACK_DAYS") {
            match v.trim().parse::<i64>() {
                Ok(days) if days > 0 => self.log_analytics.default_lookback_days = days,
                _ => warn!(value = %v, "Ignoring invalid DEFAULT_LOOKBACK_DAYS"),
            }
        }
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Chat-completion endpoint used for routing and KQL translation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Azure OpenAI resource endpoint, e.g. `https://my-res.openai.azure.com`.
    pub endpoint: Option<String>,
    /// Chat deployment name.
    pub deployment: Option<String>,
    pub api_version: String,
    pub api_key: Option<String>,
    /// HTTP client timeout applied to every completion and embedding call.
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            deployment: None,
            api_version: "2024-02-01".to_string(),
            api_key: None,
            request_timeout_secs: 60,
        }
    }
}

/// Embedding endpoint used to build and query the flow-log index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    /// Falls back to `llm.endpoint` when unset.
    pub endpoint: Option<String>,
    pub deployment: String,
    pub api_version: String,
    pub api_key: Option<String>,
    /// Vector width produced by the deployment.
    pub dimensions: usize,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            deployment: "text-embedding-3-large".to_string(),
            api_version: "2024-02-01".to_string(),
            api_key: None,
            dimensions: 3072,
        }
    }
}

/// Log Analytics workspace used by the KQL tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogAnalyticsConfig {
    pub endpoint: String,
    /// Default workspace when a request does not name one.
    pub workspace_id: Option<String>,
    /// Bearer token presented to the query API.
    pub access_token: Option<String>,
    /// Lookback window applied when no time range resolves.
    pub default_lookback_days: i64,
}

impl Default for LogAnalyticsConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://api.loganalytics.io".to_string(),
            workspace_id: None,
            access_token: None,
            default_lookback_days: 7,
        }
    }
}

/// Blob storage holding NSG flow logs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// e.g. `https://myaccount.blob.core.windows.net`
    pub account_url: Option<String>,
    pub container: Option<String>,
    /// SAS token appended to every request (without the leading `?`).
    pub sas_token: Option<String>,
    /// Most-recent blobs read when building the index.
    pub max_files: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            account_url: None,
            container: None,
            sas_token: None,
            max_files: 20,
        }
    }
}

/// Flow-log vector index settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Directory holding the persisted index.
    pub path: String,
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Nearest chunks returned per query.
    pub top_k: usize,
    /// Build the index at startup when none is persisted.
    pub eager_build: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            path: DEFAULT_INDEX_PATH.to_string(),
            chunk_size: 512,
            top_k: 5,
            eager_build: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = NightwatchConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.llm.api_version, "2024-02-01");
        assert_eq!(config.llm.request_timeout_secs, 60);
        assert_eq!(config.embeddings.deployment, "text-embedding-3-large");
        assert_eq!(config.embeddings.dimensions, 3072);
        assert_eq!(config.log_analytics.endpoint, "https://api.loganalytics.io");
        assert_eq!(config.log_analytics.default_lookback_days, 7);
        assert_eq!(config.storage.max_files, 20);
        assert_eq!(config.index.path, DEFAULT_INDEX_PATH);
        assert_eq!(config.index.chunk_size, 512);
        assert_eq!(config.index.top_k, 5);
        assert!(config.index.eager_build);
        assert!(config.log_analytics.workspace_id.is_none());
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let file = create_temp_config(
            r#"
[log_analytics]
workspace_id = "ws-123"

[index]
top_k = 3
"#,
        );
        let config = NightwatchConfig::load(file.path()).unwrap();
        assert_eq!(config.log_analytics.workspace_id.as_deref(), Some("ws-123"));
        assert_eq!(config.log_analytics.default_lookback_days, 7);
        assert_eq!(config.index.top_k, 3);
        assert_eq!(config.index.chunk_size, 512);
        assert_eq!(config.general.log_level, "info");
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        assert!(NightwatchConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = NightwatchConfig::load_or_default(Path::new("/nonexistent/config.toml"));
        assert_eq!(config.index.path, DEFAULT_INDEX_PATH);
    }

    #[test]
    fn test_save_creates_parent_dirs_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");

        let mut config = NightwatchConfig::default();
        config.storage.container = Some("insights-logs-networksecuritygroupflowevent".into());
        config.save(&path).unwrap();

        let reloaded = NightwatchConfig::load(&path).unwrap();
        assert_eq!(
            reloaded.storage.container.as_deref(),
            Some("insights-logs-networksecuritygroupflowevent")
        );
    }

    #[test]
    fn test_env_overrides_fill_settings() {
        let mut config = NightwatchConfig::default();
        config.apply_overrides(lookup_from(&[
            ("AZURE_OPENAI_ENDPOINT", "https://res.openai.azure.com"),
            ("AZURE_OPENAI_DEPLOYMENT_NAME", "gpt-4o"),
            ("AZURE_OPENAI_EMBEDDINGS_DEPLOYMENT_NAME", "text-embedding-3-small"),
            ("AZURE_LOG_ANALYTICS_WORKSPACE_ID", "ws-env"),
            ("AZURE_STORAGE_ACCOUNT_URL", "https://acct.blob.core.windows.net"),
            ("AZURE_STORAGE_CONTAINER", "flows"),
            ("DEFAULT_LOOKBACK_DAYS", "14"),
            ("NIGHTWATCH_INDEX_PATH", "/tmp/idx"),
        ]));

        assert_eq!(config.llm.endpoint.as_deref(), Some("https://res.openai.azure.com"));
        assert_eq!(config.llm.deployment.as_deref(), Some("gpt-4o"));
        assert_eq!(config.embeddings.deployment, "text-embedding-3-small");
        assert_eq!(config.log_analytics.workspace_id.as_deref(), Some("ws-env"));
        assert_eq!(config.storage.container.as_deref(), Some("flows"));
        assert_eq!(config.log_analytics.default_lookback_days, 14);
        assert_eq!(config.index.path, "/tmp/idx");
    }

    #[test]
    fn test_env_overrides_ignore_empty_and_invalid() {
        let mut config = NightwatchConfig::default();
        config.log_analytics.workspace_id = Some("from-file".into());
        config.apply_overrides(lookup_from(&[
            ("AZURE_LOG_ANALYTICS_WORKSPACE_ID", "   "),
            ("DEFAULT_LOOKBACK_DAYS", "seven"),
        ]));

        assert_eq!(config.log_analytics.workspace_id.as_deref(), Some("from-file"));
        assert_eq!(config.log_analytics.default_lookback_days, 7);
    }

    #[test]
    fn test_serialization_round_trip() {
        let config = NightwatchConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let back: NightwatchConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.index.path, config.index.path);
        assert_eq!(back.embeddings.dimensions, config.embeddings.dimensions);
    }
}
