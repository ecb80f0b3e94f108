//! MCP tool implementations.

pub mod chat;
pub mod context;
pub mod tasks;

pub use context::ToolContext;

use crate::config::Prompts;
use crate::error::ToolError;
use crate::format::OutputFormat;
use crate::session::Session;
use crate::types::{Urgency, parse_due_date};
use anyhow::Result;
use chrono::NaiveDate;
use rmcp::model::Tool;
use serde_json::Value;
use std::sync::Arc;

/// Tool handler that processes MCP tool calls.
pub struct ToolHandler {
    pub session: Arc<Session>,
    pub prompts: Arc<Prompts>,
    pub default_format: OutputFormat,
    pub history_limit: usize,
}

impl ToolHandler {
    pub fn new(session: Arc<Session>, prompts: Arc<Prompts>) -> Self {
        Self {
            session,
            prompts,
            default_format: OutputFormat::default(),
            history_limit: 50,
        }
    }

    pub fn with_default_format(mut self, format: OutputFormat) -> Self {
        self.default_format = format;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = limit;
        self
    }

    /// Get all available tools.
    pub fn get_tools(&self) -> Vec<Tool> {
        let mut tools = Vec::new();

        // Store tools
        tools.extend(tasks::get_tools(&self.prompts));

        // Assistant tools
        tools.extend(chat::get_tools(&self.prompts));

        tools
    }

    /// Call a tool by name.
    pub async fn call_tool(&self, name: &str, arguments: Value, ctx: &ToolContext) -> Result<Value> {
        let session = self.session.as_ref();
        let format = get_format(&arguments, self.default_format);
        match name {
            // Store tools
            "list_tasks" => tasks::list_tasks(session, arguments, format),
            "list_tags" => tasks::list_tags(session, format),
            "add_task" => tasks::add_task(session, arguments),
            "update_task" => tasks::update_task(session, arguments),
            "toggle_task" => tasks::toggle_task(session, arguments),
            "delete_task" => tasks::delete_task(session, arguments),

            // Assistant tools
            "chat" => chat::chat(session, arguments, format, ctx).await,
            "confirm_plan" => chat::confirm_plan(session, arguments, ctx),
            "cancel_plan" => chat::cancel_plan(session, arguments, ctx),
            "parse_tasks" => chat::parse_tasks(session, arguments, ctx).await,
            "task_advice" => chat::task_advice(session, ctx).await,
            "panic" => chat::panic(session, format, ctx).await,
            "chat_history" => chat::chat_history(session, arguments, self.history_limit),

            _ => Err(ToolError::unknown_tool(name).into()),
        }
    }
}

/// Helper to create a tool definition.
pub fn make_tool(name: &str, description: &str, properties: Value, required: Vec<&str>) -> Tool {
    let input_schema = rmcp::model::JsonObject::from_iter([
        ("type".to_string(), serde_json::json!("object")),
        ("properties".to_string(), properties),
        ("required".to_string(), serde_json::json!(required)),
    ]);

    Tool::new(name.to_string(), description.to_string(), input_schema)
}

/// Helper to create a tool definition with prompt overrides.
/// Looks up the tool description in prompts, falls back to default_description.
pub fn make_tool_with_prompts(
    name: &str,
    default_description: &str,
    properties: Value,
    required: Vec<&str>,
    prompts: &Prompts,
) -> Tool {
    let description = prompts
        .get_tool_description(name)
        .unwrap_or(default_description);
    make_tool(name, description, properties, required)
}

/// Helper to get a string from arguments.
pub fn get_string(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(|v| v.as_str().map(String::from))
}

/// Helper to get a bool from arguments.
pub fn get_bool(args: &Value, key: &str) -> Option<bool> {
    args.get(key).and_then(|v| v.as_bool())
}

/// Helper to get a usize from arguments.
pub fn get_usize(args: &Value, key: &str) -> Option<usize> {
    args.get(key).and_then(|v| v.as_u64()).map(|n| n as usize)
}

/// Helper to get a string array from arguments.
pub fn get_string_array(args: &Value, key: &str) -> Option<Vec<String>> {
    args.get(key).and_then(|v| {
        v.as_array().map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
    })
}

/// A required non-blank string argument.
pub fn require_string(args: &Value, key: &str) -> Result<String, ToolError> {
    get_string(args, key)
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ToolError::missing_field(key))
}

/// Optional urgency; an unrecognized label is an error, not a silent drop.
pub fn get_urgency(args: &Value, key: &str) -> Result<Option<Urgency>, ToolError> {
    match get_string(args, key) {
        None => Ok(None),
        Some(s) => Urgency::from_str(&s)
            .map(Some)
            .ok_or_else(|| ToolError::invalid_value(key, "urgency must be one of: low, medium, high")),
    }
}

pub fn get_date(args: &Value, key: &str) -> Result<Option<NaiveDate>, ToolError> {
    match get_string(args, key) {
        None => Ok(None),
        Some(s) => parse_due_date(&s)
            .map(Some)
            .ok_or_else(|| ToolError::invalid_value(key, "expected a date as YYYY-MM-DD")),
    }
}

pub fn get_hours(args: &Value, key: &str) -> Result<Option<f64>, ToolError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .filter(|h| h.is_finite() && *h >= 0.0)
            .map(Some)
            .ok_or_else(|| ToolError::invalid_value(key, "must be a non-negative number")),
    }
}

fn get_format(args: &Value, default: OutputFormat) -> OutputFormat {
    get_string(args, "format")
        .and_then(|s| OutputFormat::from_str(&s))
        .unwrap_or(default)
}
