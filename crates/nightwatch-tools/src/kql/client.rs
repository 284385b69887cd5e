//! Log Analytics query boundary.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use nightwatch_core::config::{LlmConfig, LogAnalyticsConfig};
use nightwatch_core::error::{NightwatchError, Result};
use nightwatch_core::types::TimeRange;

/// Outcome reported by the query service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryStatus {
    Success,
    PartialError,
    Failure,
}

impl std::fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            QueryStatus::Success => "Success",
            QueryStatus::PartialError => "PartialError",
            QueryStatus::Failure => "Failure",
        };
        write!(f, "{}", s)
    }
}

/// One result table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub status: QueryStatus,
    pub tables: Vec<QueryTable>,
}

impl QueryResponse {
    pub fn success(tables: Vec<QueryTable>) -> Self {
        Self {
            status: QueryStatus::Success,
            tables,
        }
    }
}

/// Executes KQL against a workspace over a time span.
#[async_trait]
pub trait LogQueryService: Send + Sync {
    async fn execute_query(
        &self,
        workspace_id: &str,
        query: &str,
        timespan: &TimeRange,
    ) -> Result<QueryResponse>;
}

/// Render one cell the way it appears in answers: strings unquoted, null empty.
pub fn render_cell(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Render a whole row as `[a, b, c]`.
pub fn render_row(row: &[Value]) -> String {
    let cells: Vec<String> = row.iter().map(render_cell).collect();
    format!("[{}]", cells.join(", "))
}

// ---------------------------------------------------------------------------
// LogAnalyticsClient
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct QueryBody<'a> {
    query: &'a str,
    timespan: String,
}

#[derive(Deserialize)]
struct WireResponse {
    #[serde(default)]
    tables: Vec<WireTable>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Deserialize)]
struct WireTable {
    #[serde(default)]
    name: String,
    #[serde(default)]
    columns: Vec<WireColumn>,
    #[serde(default)]
    rows: Vec<Vec<Value>>,
}

#[derive(Deserialize)]
struct WireColumn {
    name: String,
}

/// REST client for the Log Analytics query API.
pub struct LogAnalyticsClient {
    http: reqwest::Client,
    endpoint: String,
    access_token: Option<String>,
}

impl std::fmt::Debug for LogAnalyticsClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogAnalyticsClient")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl LogAnalyticsClient {
    pub fn from_config(config: &LogAnalyticsConfig, llm: &LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(llm.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    fn query_url(&self, workspace_id: &str) -> String {
        format!("{}/v1/workspaces/{}/query", self.endpoint, workspace_id)
    }
}

fn into_response(wire: WireResponse) -> QueryResponse {
    let status = if wire.error.is_some() {
        QueryStatus::PartialError
    } else {
        QueryStatus::Success
    };
    QueryResponse {
        status,
        tables: wire
            .tables
            .into_iter()
            .map(|t| QueryTable {
                name: t.name,
                columns: t.columns.into_iter().map(|c| c.name).collect(),
                rows: t.rows,
            })
            .collect(),
    }
}

#[async_trait]
impl LogQueryService for LogAnalyticsClient {
    async fn execute_query(
        &self,
        workspace_id: &str,
        query: &str,
        timespan: &TimeRange,
    ) -> Result<QueryResponse> {
        info!(workspace = %workspace_id, timespan = %timespan.to_iso_interval(), "Executing KQL");
        debug!(query, "KQL text");

        let mut request = self.http.post(self.query_url(workspace_id)).json(&QueryBody {
            query,
            timespan: timespan.to_iso_interval(),
        });
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NightwatchError::QueryExecution(format!("{}: {}", status, body)));
        }

        let wire: WireResponse = response.json().await?;
        Ok(into_response(wire))
    }
}
