//! Echo-style responders used when a query cannot be interpreted.

use std::sync::Arc;

use async_trait::async_trait;

use crate::tool::{Tool, ToolContext, ToolInput};

pub const FALLBACK_TOOL_NAME: &str = "Fallback Responder";
pub const KQL_FALLBACK_TOOL_NAME: &str = "KQL Fallback Responder";

/// Stateless tool that asks the user to rephrase.
#[derive(Debug, Clone)]
pub struct FallbackResponder {
    name: &'static str,
    description: &'static str,
}

impl FallbackResponder {
    pub fn general() -> Self {
        Self {
            name: FALLBACK_TOOL_NAME,
            description: "Handles queries that do not match any known tool or command.",
        }
    }

    pub fn kql() -> Self {
        Self {
            name: KQL_FALLBACK_TOOL_NAME,
            description: "Handles queries that do not match any known KQL pattern.",
        }
    }
}

pub fn fallback_message(query: &str) -> String {
    format!(
        "I'm sorry, I couldn't understand your query: '{}'. Please rephrase or check for typos.",
        query
    )
}

#[async_trait]
impl Tool for FallbackResponder {
    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &str {
        self.description
    }

    async fn run(&self, input: &ToolInput) -> String {
        fallback_message(input.str_field("query").unwrap_or_default())
    }
}

pub fn register_general(_ctx: &ToolContext) -> Option<Arc<dyn Tool>> {
    Some(Arc::new(FallbackResponder::general()))
}

pub fn register_kql(_ctx: &ToolContext) -> Option<Arc<dyn Tool>> {
    Some(Arc::new(FallbackResponder::kql()))
}
