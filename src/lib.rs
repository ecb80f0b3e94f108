//! TaskZen Assistant Library
//!
//! Task store, AI-assisted flows (classification, task-list parsing, advice,
//! panic triage) and the MCP tool layer. Exported for testing and
//! integration.

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod flows;
pub mod format;
pub mod gateway;
pub mod logging;
pub mod plan;
pub mod prompts;
pub mod session;
pub mod store;
pub mod tools;
pub mod types;
