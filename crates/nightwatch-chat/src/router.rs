//! LLM-assisted query routing.
//!
//! Asks the completion service to pick one registered tool for a question
//! and, for KQL tools, to draft the query text as well.

use std::sync::Arc;

use tracing::{debug, info, warn};

use nightwatch_core::llm::{CompletionService, LlmMessage};
use nightwatch_tools::kql::tool::KQL_TOOL_NAME;
use nightwatch_tools::kql::sentinel::SENTINEL_TOOL_NAME;

/// Separator between the tool name and the drafted query in the router reply.
pub const ROUTE_DELIMITER: &str = "|||";

/// The router's choice for one question. Both fields are empty when no route
/// was found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoutingDecision {
    pub tool_name: String,
    pub auxiliary_query: String,
}

impl RoutingDecision {
    pub fn is_empty(&self) -> bool {
        self.tool_name.is_empty()
    }

    /// The drafted query, if the router produced one.
    pub fn drafted_query(&self) -> Option<&str> {
        Some(self.auxiliary_query.as_str()).filter(|q| !q.is_empty())
    }
}

/// Split a router reply on the first delimiter. Without a delimiter the
/// whole reply is the tool name.
pub fn parse_routing_response(content: &str) -> RoutingDecision {
    let content = content.trim();
    match content.split_once(ROUTE_DELIMITER) {
        Some((name, query)) => RoutingDecision {
            tool_name: name.trim().to_string(),
            auxiliary_query: query.trim().to_string(),
        },
        None => RoutingDecision {
            tool_name: content.to_string(),
            auxiliary_query: String::new(),
        },
    }
}

/// Builds the system prompt listing the candidate tools.
pub fn build_routing_prompt(query: &str, tool_names: &[String]) -> String {
    let names: Vec<String> = tool_names.iter().map(|n| format!("- {}", n)).collect();
    format!(
        "You are a security-operations tool router. Based on the user's question:\n\
         {query}\n\
         \n\
         Pick the best matching tool strictly from this list:\n\
         {names}\n\
         \n\
         If the tool is '{KQL_TOOL_NAME}' or '{SENTINEL_TOOL_NAME}', also write the KQL query.\n\
         Respond in this format (no explanation):\n\
         {{tool_name}}{ROUTE_DELIMITER}{{optional_kql_or_blank}}",
        names = names.join("\n"),
    )
}

/// Single-shot router over a completion service. No retries and no check
/// that the chosen name is actually registered.
pub struct QueryRouter {
    llm: Arc<dyn CompletionService>,
}

impl QueryRouter {
    pub fn new(llm: Arc<dyn CompletionService>) -> Self {
        Self { llm }
    }

    /// Pick a tool for `query` among `tool_names`.
    ///
    /// Blank input returns an empty decision without calling the LLM. A
    /// failed completion also yields an empty decision.
    pub async fn route(&self, query: &str, tool_names: &[String]) -> RoutingDecision {
        let query = query.trim();
        if query.is_empty() {
            return RoutingDecision::default();
        }

        let messages = [
            LlmMessage::system(build_routing_prompt(query, tool_names)),
            LlmMessage::user(query),
        ];
        match self.llm.complete(&messages).await {
            Ok(content) => {
                debug!(reply = %content, "Router reply");
                let decision = parse_routing_response(&content);
                info!(
                    tool = %decision.tool_name,
                    drafted_kql = !decision.auxiliary_query.is_empty(),
                    "Routed query"
                );
                decision
            }
            Err(e) => {
                warn!(error = %e, "Router failed");
                RoutingDecision::default()
            }
        }
    }
}

impl std::fmt::Debug for QueryRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryRouter").finish_non_exhaustive()
    }
}
