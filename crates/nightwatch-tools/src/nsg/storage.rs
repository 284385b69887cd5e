//! Blob storage boundary for flow-log files.
//!
//! - `AzureBlobStore` lists and downloads blobs over the Blob REST API.
//! - `MemoryBlobStore` keeps blobs in memory for tests and offline runs.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use nightwatch_core::config::{LlmConfig, StorageConfig};
use nightwatch_core::error::{NightwatchError, Result};

/// Listing entry for one blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    pub name: String,
    pub last_modified: DateTime<Utc>,
}

/// A single container of flow-log blobs.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn list_blobs(&self) -> Result<Vec<BlobInfo>>;

    async fn download_blob(&self, name: &str) -> Result<Vec<u8>>;
}

// ---------------------------------------------------------------------------
// AzureBlobStore
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EnumerationResults {
    #[serde(default)]
    blobs: BlobList,
    #[serde(default)]
    next_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BlobList {
    #[serde(rename = "Blob", default)]
    items: Vec<BlobItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BlobItem {
    name: String,
    properties: BlobProperties,
}

#[derive(Debug, Deserialize)]
struct BlobProperties {
    #[serde(rename = "Last-Modified")]
    last_modified: String,
}

/// Parse one page of a container listing. Returns the entries and the
/// continuation marker, if any.
fn parse_listing(xml: &str) -> Result<(Vec<BlobInfo>, Option<String>)> {
    let page: EnumerationResults = quick_xml::de::from_str(xml)
        .map_err(|e| NightwatchError::Storage(format!("invalid blob listing: {}", e)))?;

    let mut blobs = Vec::with_capacity(page.blobs.items.len());
    for item in page.blobs.items {
        let last_modified = DateTime::parse_from_rfc2822(&item.properties.last_modified)
            .map_err(|e| {
                NightwatchError::Storage(format!(
                    "invalid Last-Modified '{}' for {}: {}",
                    item.properties.last_modified, item.name, e
                ))
            })?
            .with_timezone(&Utc);
        blobs.push(BlobInfo {
            name: item.name,
            last_modified,
        });
    }

    let marker = page.next_marker.filter(|m| !m.trim().is_empty());
    Ok((blobs, marker))
}

/// Azure Blob Storage container reached over REST, authorised by an
/// optional SAS token.
pub struct AzureBlobStore {
    http: reqwest::Client,
    container_url: String,
    sas_token: Option<String>,
}

impl std::fmt::Debug for AzureBlobStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureBlobStore")
            .field("container_url", &self.container_url)
            .finish()
    }
}

impl AzureBlobStore {
    /// Build from configuration. `Ok(None)` when the account URL or container
    /// is not configured.
    pub fn from_config(config: &StorageConfig, llm: &LlmConfig) -> Result<Option<Self>> {
        let (Some(account_url), Some(container)) = (&config.account_url, &config.container) else {
            return Ok(None);
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(llm.request_timeout_secs))
            .build()?;
        Ok(Some(Self {
            http,
            container_url: format!("{}/{}", account_url.trim_end_matches('/'), container),
            sas_token: config
                .sas_token
                .as_ref()
                .map(|t| t.trim_start_matches('?').to_string())
                .filter(|t| !t.is_empty()),
        }))
    }

    fn with_sas(&self, url: String) -> String {
        match &self.sas_token {
            Some(sas) => format!("{}?{}", url, sas),
            None => url,
        }
    }

    async fn fetch(&self, request: reqwest::RequestBuilder, what: &str) -> Result<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NightwatchError::Storage(format!("{} returned {}: {}", what, status, body)));
        }
        Ok(response)
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    async fn list_blobs(&self) -> Result<Vec<BlobInfo>> {
        let mut blobs = Vec::new();
        let mut marker: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(self.with_sas(self.container_url.clone()))
                .query(&[("restype", "container"), ("comp", "list")]);
            if let Some(m) = &marker {
                request = request.query(&[("marker", m.as_str())]);
            }

            let body = self.fetch(request, "blob listing").await?.text().await?;
            let (page, next) = parse_listing(&body)?;
            debug!(page = page.len(), "Listed blob page");
            blobs.extend(page);

            match next {
                Some(next) => marker = Some(next),
                None => break,
            }
        }
        Ok(blobs)
    }

    async fn download_blob(&self, name: &str) -> Result<Vec<u8>> {
        let url = self.with_sas(format!("{}/{}", self.container_url, name.trim_start_matches('/')));
        let response = self.fetch(self.http.get(url), "blob download").await?;
        Ok(response.bytes().await?.to_vec())
    }
}

// ---------------------------------------------------------------------------
// MemoryBlobStore
// ---------------------------------------------------------------------------

/// In-memory container. Blobs are listed in insertion order.
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    blobs: Mutex<Vec<(BlobInfo, Vec<u8>)>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a blob.
    pub fn insert(&self, name: impl Into<String>, last_modified: DateTime<Utc>, data: impl Into<Vec<u8>>) {
        let info = BlobInfo {
            name: name.into(),
            last_modified,
        };
        if let Ok(mut blobs) = self.blobs.lock() {
            blobs.retain(|(existing, _)| existing.name != info.name);
            blobs.push((info, data.into()));
        }
    }

    pub fn with_blob(self, name: impl Into<String>, last_modified: DateTime<Utc>, data: impl Into<Vec<u8>>) -> Self {
        self.insert(name, last_modified, data);
        self
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn list_blobs(&self) -> Result<Vec<BlobInfo>> {
        let blobs = self
            .blobs
            .lock()
            .map_err(|e| NightwatchError::Storage(format!("Lock poisoned: {}", e)))?;
        Ok(blobs.iter().map(|(info, _)| info.clone()).collect())
    }

    async fn download_blob(&self, name: &str) -> Result<Vec<u8>> {
        let blobs = self
            .blobs
            .lock()
            .map_err(|e| NightwatchError::Storage(format!("Lock poisoned: {}", e)))?;
        blobs
            .iter()
            .find(|(info, _)| info.name == name)
            .map(|(_, data)| data.clone())
            .ok_or_else(|| NightwatchError::Storage(format!("blob not found: {}", name)))
    }
}
