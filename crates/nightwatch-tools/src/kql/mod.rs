//! KQL tools: the natural-language query tool, the Sentinel variant, and the
//! Log Analytics client they share.

pub mod client;
pub mod prompt;
pub mod sentinel;
pub mod tabular;
pub mod tool;

pub use client::{LogAnalyticsClient, LogQueryService, QueryResponse, QueryStatus, QueryTable};
pub use sentinel::SentinelTool;
pub use tabular::{ensure_tabular, needs_translation};
pub use tool::KqlQueryTool;
