//! Natural-language or raw KQL against a Log Analytics workspace.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use nightwatch_core::llm::{CompletionService, LlmMessage};
use nightwatch_core::time_range;
use nightwatch_core::types::TimeRange;

use crate::error::ToolError;
use crate::kql::client::{render_row, LogQueryService, QueryStatus};
use crate::kql::prompt::build_translation_prompt;
use crate::kql::tabular::needs_translation;
use crate::tool::{Tool, ToolContext, ToolInput};

pub const KQL_TOOL_NAME: &str = "Azure KQL Query";

/// Rows shown when summarisation is off.
const RAW_ROW_LIMIT: usize = 5;

fn default_summarize() -> bool {
    true
}

/// Arguments accepted by [`KqlQueryTool`].
#[derive(Debug, Clone, Deserialize)]
pub struct KqlQueryArgs {
    /// Natural-language question or raw KQL.
    #[serde(default)]
    pub query: String,
    /// KQL drafted by the router; preferred over `query` when present.
    #[serde(default)]
    pub kql: Option<String>,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default)]
    pub time_range: Option<String>,
    #[serde(default = "default_summarize")]
    pub summarize: bool,
}

impl KqlQueryArgs {
    fn effective_query(&self) -> Option<&str> {
        self.kql
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .or_else(|| Some(self.query.trim()).filter(|q| !q.is_empty()))
    }
}

/// Translates questions to KQL when needed, runs them and summarises the
/// first result table.
pub struct KqlQueryTool {
    log_query: Arc<dyn LogQueryService>,
    llm: Arc<dyn CompletionService>,
    default_workspace: Option<String>,
    lookback_days: i64,
}

impl KqlQueryTool {
    pub fn new(
        log_query: Arc<dyn LogQueryService>,
        llm: Arc<dyn CompletionService>,
        default_workspace: Option<String>,
        lookback_days: i64,
    ) -> Self {
        Self {
            log_query,
            llm,
            default_workspace,
            lookback_days,
        }
    }

    /// Available whenever a query client and a completion client exist.
    /// A missing workspace id is reported per run instead.
    pub fn register_instance(ctx: &ToolContext) -> Option<Self> {
        let log_query = ctx.log_query.clone()?;
        let llm = ctx.llm.clone()?;
        Some(Self::new(
            log_query,
            llm,
            ctx.config.log_analytics.workspace_id.clone(),
            ctx.config.log_analytics.default_lookback_days,
        ))
    }

    async fn translate(&self, question: &str, time_phrase: Option<&str>) -> Result<String, ToolError> {
        let prompt = build_translation_prompt(question, time_phrase);
        let completion = self.llm.complete(&[LlmMessage::user(prompt)]).await?;
        Ok(completion.trim().to_string())
    }

    async fn answer(&self, args: &KqlQueryArgs) -> Result<String, ToolError> {
        let workspace_id = args
            .workspace_id
            .as_deref()
            .or(self.default_workspace.as_deref())
            .map(str::trim)
            .filter(|w| !w.is_empty())
            .ok_or_else(|| ToolError::MissingConfiguration("workspace id".to_string()))?;

        let question = args
            .effective_query()
            .ok_or_else(|| ToolError::InvalidInput("no query provided".to_string()))?;

        let now = Utc::now();
        let window = match args.time_range.as_deref() {
            Some(phrase) => time_range::resolve_or_default(Some(phrase), self.lookback_days, now),
            None => TimeRange::lookback_days(self.lookback_days, now),
        };

        let kql = if needs_translation(question) {
            self.translate(question, args.time_range.as_deref()).await?
        } else {
            question.to_string()
        };
        info!(tool = KQL_TOOL_NAME, kql = %kql, "Final KQL");

        let response = self
            .log_query
            .execute_query(workspace_id, &kql, &window)
            .await
            .map_err(|e| ToolError::QueryExecution(e.to_string()))?;

        if response.status != QueryStatus::Success {
            return Ok(format!("Query failed: {}", response.status));
        }

        let Some(table) = response.tables.first() else {
            return Ok("Query succeeded but returned no results.".to_string());
        };
        if table.rows.is_empty() {
            return Ok("Query succeeded but returned no results.".to_string());
        }

        let columns = table.columns.join(", ");
        if args.summarize {
            Ok(format!(
                "Found {} rows.\n\nColumns: {}\n\nSample:\n{}",
                table.rows.len(),
                columns,
                render_row(&table.rows[0])
            ))
        } else {
            let rows: Vec<String> = table
                .rows
                .iter()
                .take(RAW_ROW_LIMIT)
                .map(|row| render_row(row))
                .collect();
            Ok(format!("Raw Results:\nColumns: {}\n\n{}", columns, rows.join("\n")))
        }
    }
}

#[async_trait]
impl Tool for KqlQueryTool {
    fn name(&self) -> &str {
        KQL_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Run KQL queries against Azure Log Analytics. Accepts natural language or raw KQL."
    }

    async fn run(&self, input: &ToolInput) -> String {
        let result = match input.parse::<KqlQueryArgs>() {
            Ok(args) => self.answer(&args).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(answer) => answer,
            Err(ToolError::MissingConfiguration(_)) => {
                warn!(tool = KQL_TOOL_NAME, "No workspace id configured");
                "Workspace ID is missing. Please provide one or set AZURE_LOG_ANALYTICS_WORKSPACE_ID."
                    .to_string()
            }
            Err(e) => {
                warn!(tool = KQL_TOOL_NAME, error = %e, "KQL query failed");
                format!("Error running KQL query: {}", e)
            }
        }
    }
}

pub fn register(ctx: &ToolContext) -> Option<Arc<dyn Tool>> {
    KqlQueryTool::register_instance(ctx).map(|t| Arc::new(t) as Arc<dyn Tool>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kql::client::{QueryResponse, QueryTable};
    use chrono::Duration;
    use nightwatch_core::error::{NightwatchError, Result};
    use nightwatch_core::llm::MockCompletion;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records every call and replies with a canned response.
    struct StubLogQuery {
        reply: Mutex<Option<Result<QueryResponse>>>,
        calls: Mutex<Vec<(String, String, TimeRange)>>,
    }

    impl StubLogQuery {
        fn new(reply: Result<QueryResponse>) -> Arc<Self> {
            Arc::new(Self {
                reply: Mutex::new(Some(reply)),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, String, TimeRange)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl LogQueryService for StubLogQuery {
        async fn execute_query(&self, workspace_id: &str, query: &str, timespan: &TimeRange) -> Result<QueryResponse> {
            self.calls
                .lock()
                .unwrap()
                .push((workspace_id.to_string(), query.to_string(), *timespan));
            self.reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Ok(QueryResponse::success(vec![])))
        }
    }

    fn table(rows: Vec<Vec<serde_json::Value>>) -> QueryResponse {
        QueryResponse::success(vec![QueryTable {
            name: "PrimaryResult".to_string(),
            columns: vec!["clientIP_s".to_string(), "count_".to_string()],
            rows,
        }])
    }

    fn tool(stub: Arc<StubLogQuery>, llm: Arc<MockCompletion>, workspace: Option<&str>) -> KqlQueryTool {
        KqlQueryTool::new(stub, llm, workspace.map(String::from), 7)
    }

    #[tokio::test]
    async fn test_missing_workspace() {
        let stub = StubLogQuery::new(Ok(table(vec![])));
        let llm = Arc::new(MockCompletion::new(["AzureDiagnostics"]));
        let answer = tool(stub.clone(), llm.clone(), None)
            .run(&ToolInput::question("anything"))
            .await;
        assert!(answer.starts_with("Workspace ID is missing"));
        assert!(stub.calls().is_empty());
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_translation_then_no_results() {
        let stub = StubLogQuery::new(Ok(table(vec![])));
        let llm = Arc::new(MockCompletion::new(["  AzureDiagnostics | where httpStatus_d != 200  "]));
        let answer = tool(stub.clone(), llm.clone(), Some("ws-1"))
            .run(&ToolInput::question("show failed API calls in the last 3 days"))
            .await;

        assert_eq!(answer, "Query succeeded but returned no results.");
        assert_eq!(llm.calls(), 1);
        let prompt = &llm.requests()[0][0].content;
        assert!(prompt.contains("show failed API calls in the last 3 days"));
        assert!(prompt.contains("Time range: \"last 7 days\""));

        let calls = stub.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "ws-1");
        assert_eq!(calls[0].1, "AzureDiagnostics | where httpStatus_d != 200");
        assert_eq!(calls[0].2.duration(), Duration::days(7));
    }

    #[tokio::test]
    async fn test_raw_kql_skips_translation() {
        let stub = StubLogQuery::new(Ok(table(vec![vec![json!("10.0.0.4"), json!(3)]])));
        let llm = Arc::new(MockCompletion::new(["unused"]));
        let answer = tool(stub.clone(), llm.clone(), Some("ws-1"))
            .run(&ToolInput::new(json!({
                "query": "SigninLogs | summarize count() by clientIP_s",
                "time_range": "last 30 days"
            })))
            .await;

        assert_eq!(llm.calls(), 0);
        assert_eq!(
            answer,
            "Found 1 rows.\n\nColumns: clientIP_s, count_\n\nSample:\n[10.0.0.4, 3]"
        );
        assert_eq!(stub.calls()[0].2.duration(), Duration::days(30));
    }

    #[tokio::test]
    async fn test_router_kql_takes_precedence() {
        let stub = StubLogQuery::new(Ok(table(vec![])));
        let llm = Arc::new(MockCompletion::new(["unused"]));
        tool(stub.clone(), llm.clone(), Some("ws-1"))
            .run(&ToolInput::new(json!({
                "query": "how many sign-ins failed?",
                "kql": "SigninLogs | where ResultType != 0"
            })))
            .await;
        assert_eq!(llm.calls(), 0);
        assert_eq!(stub.calls()[0].1, "SigninLogs | where ResultType != 0");
    }

    #[tokio::test]
    async fn test_raw_output_limits_rows() {
        let rows = (0..8).map(|i| vec![json!(format!("10.0.0.{i}")), json!(i)]).collect();
        let stub = StubLogQuery::new(Ok(table(rows)));
        let llm = Arc::new(MockCompletion::new(["unused"]));
        let answer = tool(stub, llm, Some("ws-1"))
            .run(&ToolInput::new(json!({
                "query": "AzureDiagnostics | take 8",
                "summarize": false
            })))
            .await;
        assert!(answer.starts_with("Raw Results:\nColumns: clientIP_s, count_\n\n"));
        assert_eq!(answer.lines().filter(|l| l.starts_with('[')).count(), 5);
    }

    #[tokio::test]
    async fn test_unparseable_time_range_uses_default() {
        let stub = StubLogQuery::new(Ok(table(vec![])));
        let llm = Arc::new(MockCompletion::new(["unused"]));
        tool(stub.clone(), llm, Some("ws-1"))
            .run(&ToolInput::new(json!({
                "query": "AzureDiagnostics | take 1",
                "time_range": "since the dawn of time"
            })))
            .await;
        assert_eq!(stub.calls()[0].2.duration(), Duration::days(7));
    }

    #[tokio::test]
    async fn test_non_success_status_is_reported() {
        let mut response = table(vec![]);
        response.status = QueryStatus::PartialError;
        let stub = StubLogQuery::new(Ok(response));
        let llm = Arc::new(MockCompletion::new(["unused"]));
        let answer = tool(stub, llm, Some("ws-1"))
            .run(&ToolInput::question("AzureDiagnostics | take 1"))
            .await;
        assert_eq!(answer, "Query failed: PartialError");
    }

    #[tokio::test]
    async fn test_execution_error_is_rendered() {
        let stub = StubLogQuery::new(Err(NightwatchError::QueryExecution("403 Forbidden".to_string())));
        let llm = Arc::new(MockCompletion::new(["unused"]));
        let answer = tool(stub, llm, Some("ws-1"))
            .run(&ToolInput::question("AzureDiagnostics | take 1"))
            .await;
        assert!(answer.starts_with("Error running KQL query: "));
        assert!(answer.contains("403 Forbidden"));
    }

    #[tokio::test]
    async fn test_translation_failure_is_rendered() {
        let stub = StubLogQuery::new(Ok(table(vec![])));
        let llm = Arc::new(MockCompletion::failing());
        let answer = tool(stub.clone(), llm, Some("ws-1"))
            .run(&ToolInput::question("who logged in?"))
            .await;
        assert!(answer.starts_with("Error running KQL query: "));
        assert!(stub.calls().is_empty());
    }

    #[tokio::test]
    async fn test_blank_translation_is_executed_as_is() {
        let stub = StubLogQuery::new(Ok(table(vec![])));
        let llm = Arc::new(MockCompletion::new(["   "]));
        let answer = tool(stub.clone(), llm, Some("ws-1"))
            .run(&ToolInput::question("who logged in?"))
            .await;
        assert_eq!(answer, "Query succeeded but returned no results.");
        let calls = stub.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, "");
    }

    #[tokio::test]
    async fn test_empty_query() {
        let stub = StubLogQuery::new(Ok(table(vec![])));
        let llm = Arc::new(MockCompletion::new(["unused"]));
        let answer = tool(stub, llm, Some("ws-1")).run(&ToolInput::question("  ")).await;
        assert_eq!(answer, "Error running KQL query: Invalid input: no query provided");
    }

    #[test]
    fn test_registration_requires_clients() {
        let ctx = ToolContext::default();
        assert!(register(&ctx).is_none());

        let ctx = ctx
            .with_log_query(StubLogQuery::new(Ok(table(vec![]))))
            .with_llm(Arc::new(MockCompletion::new(["x"])));
        let tool = register(&ctx).unwrap();
        assert_eq!(tool.name(), "Azure KQL Query");
    }
}
