//! Conversational interface for Nightwatch.
//!
//! Routes each question to one registered tool through the LLM router,
//! falls back when no tool fits, and keeps the conversation thread.

pub mod error;
pub mod orchestrator;
pub mod router;
pub mod thread;

pub use error::ChatError;
pub use orchestrator::{ChatOrchestrator, ChatRequest, ChatResponse, ToolRun, NO_ROUTE_MESSAGE};
pub use router::{parse_routing_response, QueryRouter, RoutingDecision, ROUTE_DELIMITER};
pub use thread::{ConversationTurn, Role, Thread};
