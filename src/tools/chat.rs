//! Assistant tools: chat, plan confirmation, parsing, advice and triage.

use super::{ToolContext, get_usize, make_tool_with_prompts, require_string};
use crate::config::Prompts;
use crate::error::ToolError;
use crate::format::{OutputFormat, format_plan_markdown, format_triage_markdown, markdown_to_json};
use crate::session::{ChatOutcome, Session};
use anyhow::Result;
use rmcp::model::Tool;
use serde_json::{Value, json};

pub fn get_tools(prompts: &Prompts) -> Vec<Tool> {
    let message_id = json!({
        "message_id": {
            "type": "string",
            "description": "ID of the assistant message carrying the proposed plan"
        }
    });

    vec![
        make_tool_with_prompts(
            "chat",
            "Send a message to the TaskZen assistant. Requests to change tasks come back as a proposed plan that must be confirmed with confirm_plan; pasted task lists are added right away.",
            json!({
                "message": {
                    "type": "string",
                    "description": "What the user typed"
                },
                "format": {
                    "type": "string",
                    "enum": ["json", "markdown"],
                    "description": "Output format"
                }
            }),
            vec!["message"],
            prompts,
        ),
        make_tool_with_prompts(
            "confirm_plan",
            "Apply the proposed plan attached to message_id. A plan can be resolved only once.",
            message_id.clone(),
            vec!["message_id"],
            prompts,
        ),
        make_tool_with_prompts(
            "cancel_plan",
            "Discard the proposed plan attached to message_id. Tasks are left unchanged.",
            message_id,
            vec!["message_id"],
            prompts,
        ),
        make_tool_with_prompts(
            "parse_tasks",
            "Parse free-form text into tasks and add them all. Nothing is added if any entry cannot be parsed.",
            json!({
                "text": {
                    "type": "string",
                    "description": "Pasted task list"
                }
            }),
            vec!["text"],
            prompts,
        ),
        make_tool_with_prompts(
            "task_advice",
            "Get organizational advice on the pending tasks.",
            json!({}),
            vec![],
            prompts,
        ),
        make_tool_with_prompts(
            "panic",
            "Panic mode: workload summary plus a prioritized, step-by-step plan over the pending tasks.",
            json!({
                "format": {
                    "type": "string",
                    "enum": ["json", "markdown"],
                    "description": "Output format"
                }
            }),
            vec![],
            prompts,
        ),
        make_tool_with_prompts(
            "chat_history",
            "Return the conversation, oldest first.",
            json!({
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of recent messages"
                }
            }),
            vec![],
            prompts,
        ),
    ]
}

pub async fn chat(session: &Session, args: Value, format: OutputFormat, ctx: &ToolContext) -> Result<Value> {
    let message = require_string(&args, "message")?;
    ctx.logger.debug("Classifying chat message");

    let reply = session.chat(&message).await.map_err(ToolError::from)?;
    match &reply.outcome {
        ChatOutcome::Proposed { plan } => ctx.logger.info_with(
            "Plan proposed",
            json!({ "message_id": plan.message_id, "operations": plan.operations.len() }),
        ),
        ChatOutcome::Parsed { tasks } => ctx.logger.info(&format!("Added {} parsed tasks", tasks.len())),
        ChatOutcome::ParseFailed | ChatOutcome::Failed => ctx.logger.warning(&reply.reply.content),
        ChatOutcome::Response => {}
    }

    match (format, &reply.outcome) {
        (OutputFormat::Markdown, ChatOutcome::Proposed { plan }) => {
            Ok(markdown_to_json(format_plan_markdown(plan)))
        }
        (OutputFormat::Markdown, _) => Ok(markdown_to_json(reply.reply.content.clone())),
        (OutputFormat::Json, _) => Ok(serde_json::to_value(&reply)?),
    }
}

pub fn confirm_plan(session: &Session, args: Value, ctx: &ToolContext) -> Result<Value> {
    let message_id = require_string(&args, "message_id")?;
    let confirmed = session.confirm(&message_id).map_err(ToolError::from)?;
    ctx.logger.info_with(
        &confirmed.reply.content,
        serde_json::to_value(&confirmed.result)?,
    );
    Ok(serde_json::to_value(confirmed)?)
}

pub fn cancel_plan(session: &Session, args: Value, ctx: &ToolContext) -> Result<Value> {
    let message_id = require_string(&args, "message_id")?;
    let reply = session.cancel(&message_id).map_err(ToolError::from)?;
    ctx.logger.info("Plan cancelled");
    Ok(json!({ "reply": reply }))
}

pub async fn parse_tasks(session: &Session, args: Value, ctx: &ToolContext) -> Result<Value> {
    let text = require_string(&args, "text")?;
    let parsed = session.parse_tasks(&text).await.map_err(ToolError::from)?;
    if !parsed.success {
        ctx.logger.warning("Task list could not be parsed");
    }
    Ok(serde_json::to_value(parsed)?)
}

pub async fn task_advice(session: &Session, ctx: &ToolContext) -> Result<Value> {
    ctx.logger.debug("Generating task advice");
    let reply = session.advice().await.map_err(ToolError::from)?;
    Ok(json!({ "reply": reply }))
}

pub async fn panic(session: &Session, format: OutputFormat, ctx: &ToolContext) -> Result<Value> {
    let report = session.panic().await.map_err(ToolError::from)?;
    ctx.logger.info_with(
        "Triage complete",
        json!({ "source": report.source, "steps": report.action_plan.len() }),
    );
    match format {
        OutputFormat::Markdown => Ok(markdown_to_json(format_triage_markdown(&report))),
        OutputFormat::Json => Ok(serde_json::to_value(report)?),
    }
}

pub fn chat_history(session: &Session, args: Value, default_limit: usize) -> Result<Value> {
    let limit = get_usize(&args, "limit").unwrap_or(default_limit);
    let messages = session.history(limit);
    Ok(json!({
        "count": messages.len(),
        "messages": messages
    }))
}
