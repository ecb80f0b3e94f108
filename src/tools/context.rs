//! Per-request context passed to tool functions.

use crate::logging::Logger;

/// Per-request context passed to the assistant tools.
#[derive(Clone)]
pub struct ToolContext {
    /// Logs to tracing and, when connected, to the MCP client.
    pub logger: Logger,
}

impl ToolContext {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }

    /// A context with no client attached, for the CLI and tests.
    pub fn detached(tool: &str) -> Self {
        Self::new(Logger::new(format!("tool:{}", tool)))
    }
}
