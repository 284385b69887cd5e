//! Always-tabular KQL execution for router-drafted Sentinel queries.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use nightwatch_core::types::TimeRange;

use crate::kql::client::{render_cell, LogQueryService};
use crate::kql::tabular::ensure_tabular;
use crate::tool::{Tool, ToolContext, ToolInput};

pub const SENTINEL_TOOL_NAME: &str = "Azure Sentinel";

const LOOKBACK_HOURS: i64 = 5;
const ROW_LIMIT: usize = 10;

/// Runs caller-supplied KQL over the last few hours and prints the first
/// table as comma-separated lines.
pub struct SentinelTool {
    log_query: Arc<dyn LogQueryService>,
    workspace_id: String,
}

impl SentinelTool {
    pub fn new(log_query: Arc<dyn LogQueryService>, workspace_id: impl Into<String>) -> Self {
        Self {
            log_query,
            workspace_id: workspace_id.into(),
        }
    }

    pub fn register_instance(ctx: &ToolContext) -> Option<Self> {
        let log_query = ctx.log_query.clone()?;
        let workspace_id = ctx
            .config
            .log_analytics
            .workspace_id
            .clone()
            .filter(|w| !w.trim().is_empty())?;
        Some(Self::new(log_query, workspace_id))
    }
}

#[async_trait]
impl Tool for SentinelTool {
    fn name(&self) -> &str {
        SENTINEL_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Run a KQL query against the Sentinel workspace over the last 5 hours."
    }

    async fn run(&self, input: &ToolInput) -> String {
        let Some(kql) = input.str_field("kql") else {
            return "No KQL query provided.".to_string();
        };
        let kql = ensure_tabular(kql);
        info!(tool = SENTINEL_TOOL_NAME, kql = %kql, "Executing KQL");

        let window = TimeRange::lookback_hours(LOOKBACK_HOURS, Utc::now());
        let response = match self.log_query.execute_query(&self.workspace_id, &kql, &window).await {
            Ok(response) => response,
            Err(e) => {
                warn!(tool = SENTINEL_TOOL_NAME, error = %e, "Sentinel query failed");
                return format!("Query failed: {}", e);
            }
        };

        let Some(table) = response.tables.first() else {
            return "No results found.".to_string();
        };

        let mut lines = vec![table.columns.join(", ")];
        lines.extend(table.rows.iter().take(ROW_LIMIT).map(|row| {
            row.iter().map(render_cell).collect::<Vec<_>>().join(", ")
        }));
        lines.join("\n")
    }
}

pub fn register(ctx: &ToolContext) -> Option<Arc<dyn Tool>> {
    SentinelTool::register_instance(ctx).map(|t| Arc::new(t) as Arc<dyn Tool>)
}
