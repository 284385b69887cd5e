//! Chat orchestrator: routes each question to one tool and records the
//! exchange in the conversation thread.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

use nightwatch_tools::registry::ToolRegistry;
use nightwatch_tools::tool::{Tool, ToolInput};

use crate::error::ChatError;
use crate::router::{QueryRouter, RoutingDecision};
use crate::thread::Thread;

pub const NO_ROUTE_MESSAGE: &str =
    "No suitable tool found or empty query. Please rephrase your question.";

pub fn tool_not_found_message(name: &str) -> String {
    format!("Tool '{}' not found in registry.", name)
}

/// Conversation boundary request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub input: String,
}

/// Conversation boundary response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub output: String,
}

/// What happened to one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRun {
    /// The tool that answered; `None` when the fallback message was used.
    pub tool_name: Option<String>,
    /// KQL drafted by the router and passed to the tool.
    pub kql: Option<String>,
    pub output: String,
}

/// Coordinates routing, tool execution and the thread, one question at a
/// time.
pub struct ChatOrchestrator {
    registry: ToolRegistry,
    router: QueryRouter,
    thread: Thread,
}

impl ChatOrchestrator {
    pub fn new(registry: ToolRegistry, router: QueryRouter) -> Self {
        Self {
            registry,
            router,
            thread: Thread::new(),
        }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn thread(&self) -> &Thread {
        &self.thread
    }

    fn select(&self, decision: &RoutingDecision) -> Result<Arc<dyn Tool>, ChatError> {
        if decision.is_empty() {
            return Err(ChatError::Routing("empty routing decision".to_string()));
        }
        self.registry
            .get(&decision.tool_name)
            .ok_or_else(|| ChatError::UnknownTool(decision.tool_name.clone()))
    }

    /// Route `query`, run the chosen tool and append both turns to the
    /// thread. Never fails: routing problems become fallback answers.
    pub async fn route_and_run(&mut self, query: &str) -> ToolRun {
        let names = self.registry.list_names();
        let decision = self.router.route(query, &names).await;

        let tool = match self.select(&decision) {
            Ok(tool) => tool,
            Err(e) => {
                let output = match &e {
                    ChatError::UnknownTool(name) => tool_not_found_message(name),
                    _ => NO_ROUTE_MESSAGE.to_string(),
                };
                warn!(error = %e, "Falling back");
                self.thread.add_user(query);
                self.thread.add_assistant(output.clone());
                return ToolRun {
                    tool_name: None,
                    kql: None,
                    output,
                };
            }
        };

        self.thread.add_user(query);

        let kql = decision.drafted_query().map(str::to_string);
        let mut args = Map::new();
        args.insert("query".to_string(), Value::String(query.trim().to_string()));
        if let Some(kql) = &kql {
            args.insert("kql".to_string(), Value::String(kql.clone()));
        }

        info!(tool = %tool.name(), "Running tool");
        let output = tool.run(&ToolInput::new(Value::Object(args))).await;
        self.thread.add_assistant(output.clone());

        ToolRun {
            tool_name: Some(tool.name().to_string()),
            kql,
            output,
        }
    }

    /// Answer one request on the conversation boundary. Every input gets a
    /// text answer; blank input ends in the no-route message.
    pub async fn handle(&mut self, request: ChatRequest) -> ChatResponse {
        let run = self.route_and_run(request.input.trim()).await;
        ChatResponse { output: run.output }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nightwatch_core::llm::MockCompletion;
    use std::sync::Mutex;

    /// Remembers the input it was run with.
    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Option<ToolInput>>,
    }

    #[async_trait]
    impl Tool for Recorder {
        fn name(&self) -> &str {
            "Azure Sentinel"
        }

        fn description(&self) -> &str {
            "records input"
        }

        async fn run(&self, input: &ToolInput) -> String {
            *self.seen.lock().unwrap() = Some(input.clone());
            "ran".to_string()
        }
    }

    fn orchestrator(reply: &str, tool: Arc<Recorder>) -> ChatOrchestrator {
        let registry = ToolRegistry::with_tools([tool as Arc<dyn Tool>]);
        let router = QueryRouter::new(Arc::new(MockCompletion::new([reply])));
        ChatOrchestrator::new(registry, router)
    }

    #[tokio::test]
    async fn test_routes_and_passes_drafted_kql() {
        let tool = Arc::new(Recorder::default());
        let mut chat = orchestrator("Azure Sentinel|||SecurityEvent | count", tool.clone());

        let run = chat.route_and_run("how many security events?").await;
        assert_eq!(run.tool_name.as_deref(), Some("Azure Sentinel"));
        assert_eq!(run.kql.as_deref(), Some("SecurityEvent | count"));
        assert_eq!(run.output, "ran");

        let input = tool.seen.lock().unwrap().clone().unwrap();
        assert_eq!(input.str_field("query"), Some("how many security events?"));
        assert_eq!(input.str_field("kql"), Some("SecurityEvent | count"));
        assert_eq!(chat.thread().len(), 2);
    }

    #[tokio::test]
    async fn test_no_kql_key_without_draft() {
        let tool = Arc::new(Recorder::default());
        let mut chat = orchestrator("Azure Sentinel", tool.clone());
        let run = chat.route_and_run("anything").await;
        assert!(run.kql.is_none());
        let input = tool.seen.lock().unwrap().clone().unwrap();
        assert!(input.data.get("kql").is_none());
    }

    #[tokio::test]
    async fn test_empty_decision_falls_back() {
        let tool = Arc::new(Recorder::default());
        let mut chat = orchestrator("", tool.clone());
        let run = chat.route_and_run("what?").await;
        assert_eq!(run.output, NO_ROUTE_MESSAGE);
        assert!(run.tool_name.is_none());
        assert!(tool.seen.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_handle_blank_input_gets_fallback_answer() {
        let tool = Arc::new(Recorder::default());
        let mut chat = orchestrator("Azure Sentinel", tool.clone());
        let response = chat.handle(ChatRequest { input: "   ".to_string() }).await;
        assert_eq!(response.output, NO_ROUTE_MESSAGE);
        assert!(tool.seen.lock().unwrap().is_none());
        assert_eq!(chat.thread().len(), 2);
    }

    #[tokio::test]
    async fn test_handle_long_input_is_answered() {
        let mut chat = orchestrator("Azure Sentinel", Arc::new(Recorder::default()));
        let response = chat
            .handle(ChatRequest {
                input: "denied flows ".repeat(400),
            })
            .await;
        assert_eq!(response.output, "ran");
    }
}
