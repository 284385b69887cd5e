//! Chat-completion boundary.
//!
//! - `AzureOpenAiClient` calls an Azure OpenAI chat deployment over REST.
//! - `MockCompletion` replays scripted responses for tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::LlmConfig;
use crate::error::{NightwatchError, Result};

/// A single chat message sent to the completion service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: String,
    pub content: String,
}

impl LlmMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Anything that turns a message list into completion text.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, messages: &[LlmMessage]) -> Result<String>;
}

// ---------------------------------------------------------------------------
// AzureOpenAiClient
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct CompletionRequest<'a> {
    messages: &'a [LlmMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Azure OpenAI chat-completions client.
pub struct AzureOpenAiClient {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for AzureOpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureOpenAiClient")
            .field("url", &self.url)
            .finish()
    }
}

impl AzureOpenAiClient {
    /// Build a client from configuration.
    ///
    /// Returns `Ok(None)` when the endpoint or deployment is not configured.
    pub fn from_config(config: &LlmConfig) -> Result<Option<Self>> {
        let (Some(endpoint), Some(deployment)) = (&config.endpoint, &config.deployment) else {
            return Ok(None);
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Some(Self::with_client(
            http,
            endpoint,
            deployment,
            &config.api_version,
            config.api_key.clone(),
        )))
    }

    pub fn with_client(
        http: reqwest::Client,
        endpoint: &str,
        deployment: &str,
        api_version: &str,
        api_key: Option<String>,
    ) -> Self {
        Self {
            http,
            url: chat_completions_url(endpoint, deployment, api_version),
            api_key,
        }
    }
}

/// `{endpoint}/openai/deployments/{deployment}/chat/completions?api-version=...`
pub fn chat_completions_url(endpoint: &str, deployment: &str, api_version: &str) -> String {
    format!(
        "{}/openai/deployments/{}/chat/completions?api-version={}",
        endpoint.trim_end_matches('/'),
        deployment,
        api_version
    )
}

#[async_trait]
impl CompletionService for AzureOpenAiClient {
    async fn complete(&self, messages: &[LlmMessage]) -> Result<String> {
        let mut request = self.http.post(&self.url).json(&CompletionRequest {
            messages,
            temperature: 0.0,
        });
        if let Some(key) = &self.api_key {
            request = request.header("api-key", key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NightwatchError::Llm(format!("completion returned {}: {}", status, body)));
        }

        let parsed: CompletionResponse = response.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| NightwatchError::Llm("completion returned no choices".to_string()))?;
        debug!(chars = content.len(), "Completion received");
        Ok(content)
    }
}

// ---------------------------------------------------------------------------
// MockCompletion
// ---------------------------------------------------------------------------

/// Scripted completion service for tests.
///
/// Responses are returned in order; once the script runs out the last
/// response repeats. A failing mock returns `NightwatchError::Llm` on every
/// call.
#[derive(Debug, Default)]
pub struct MockCompletion {
    responses: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
    fail: bool,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<LlmMessage>>>,
}

impl MockCompletion {
    pub fn new<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Number of `complete` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Message lists passed to each call, in order.
    pub fn requests(&self) -> Vec<Vec<LlmMessage>> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionService for MockCompletion {
    async fn complete(&self, messages: &[LlmMessage]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(messages.to_vec());
        }
        if self.fail {
            return Err(NightwatchError::Llm("mock completion failure".to_string()));
        }

        let mut responses = self
            .responses
            .lock()
            .map_err(|e| NightwatchError::Llm(format!("Lock poisoned: {}", e)))?;
        let mut last = self
            .last
            .lock()
            .map_err(|e| NightwatchError::Llm(format!("Lock poisoned: {}", e)))?;

        match responses.pop_front() {
            Some(next) => {
                *last = Some(next.clone());
                Ok(next)
            }
            None => Ok(last.clone().unwrap_or_default()),
        }
    }
}
