//! Tools for Nightwatch.
//!
//! Defines the `Tool` contract and registry, loads the available tools from
//! a static factory list, and implements the KQL, Sentinel, NSG flow-log and
//! fallback tools.

pub mod error;
pub mod fallback;
pub mod kql;
pub mod loader;
pub mod nsg;
pub mod registry;
pub mod tool;

pub use error::ToolError;
pub use fallback::{FallbackResponder, FALLBACK_TOOL_NAME, KQL_FALLBACK_TOOL_NAME};
pub use kql::{KqlQueryTool, LogAnalyticsClient, LogQueryService, QueryResponse, QueryStatus, QueryTable, SentinelTool};
pub use loader::{load_tools, FACTORIES};
pub use nsg::{warm_index, AzureBlobStore, BlobInfo, BlobStore, MemoryBlobStore, NsgFlowLogsTool};
pub use registry::ToolRegistry;
pub use tool::{Tool, ToolContext, ToolFactory, ToolInput};
