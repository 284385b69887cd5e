//! Startup-time tool loading from a static list of factories.

use std::sync::Arc;

use tracing::{info, warn};

use crate::registry::ToolRegistry;
use crate::tool::{Tool, ToolContext, ToolFactory};
use crate::{fallback, kql, nsg};

/// Every tool the assistant knows about, in registration order.
pub const FACTORIES: &[ToolFactory] = &[
    kql::tool::register,
    kql::sentinel::register,
    nsg::tool::register,
    fallback::register_general,
    fallback::register_kql,
];

/// Run each factory against `ctx`, skipping those that are unavailable.
pub fn load_tools(ctx: &ToolContext) -> Vec<Arc<dyn Tool>> {
    load_from(FACTORIES, ctx)
}

pub fn load_from(factories: &[ToolFactory], ctx: &ToolContext) -> Vec<Arc<dyn Tool>> {
    let mut tools = Vec::with_capacity(factories.len());
    for (position, factory) in factories.iter().enumerate() {
        match factory(ctx) {
            Some(tool) => {
                info!(tool = %tool.name(), "Loaded tool");
                tools.push(tool);
            }
            None => warn!(position, "Tool unavailable in this environment; skipped"),
        }
    }
    info!(tools = tools.len(), "Tool loading complete");
    tools
}

impl ToolRegistry {
    /// Registry holding every available tool from [`FACTORIES`].
    pub fn load(ctx: &ToolContext) -> Self {
        Self::with_tools(load_tools(ctx))
    }
}
