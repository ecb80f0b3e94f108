//! Free text to task drafts.

use super::nullable;
use crate::gateway::{GenerationError, GenerationRequest, TextGenerator};
use crate::prompts::render;
use crate::types::{Urgency, parse_due_date};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::{debug, warn};

/// Hint shown when nothing could be parsed.
pub const PARSE_FAILURE_MESSAGE: &str = "Sorry, I couldn't parse any tasks from that text. Please try formatting it clearly, for example: 'Design mockups due 2024-12-25, 8 hours, tag: design'.";

#[derive(Debug, Error)]
pub enum ParseFailure {
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("no tasks found in text")]
    NoTasks,

    #[error("task {index} is malformed: {reason}")]
    Malformed { index: usize, reason: String },
}

/// A parsed task, ready for tag resolution and insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTask {
    pub name: String,
    pub due_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_hours: Option<f64>,
    /// Tag display names, not yet resolved.
    #[serde(default)]
    pub tags: Vec<String>,
}

pub fn task_list_schema() -> Value {
    json!({
        "type": "object",
        "required": ["tasks"],
        "properties": {
            "tasks": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["name", "dueDate"],
                    "properties": {
                        "name": { "type": "string" },
                        "dueDate": { "type": "string" },
                        "urgency": nullable(json!({ "type": "string", "enum": ["low", "medium", "high"] })),
                        "requiredHours": nullable(json!({ "type": "number" })),
                        "tags": nullable(json!({ "type": "array", "items": { "type": "string" } })),
                    }
                }
            }
        }
    })
}

#[derive(Deserialize)]
struct RawTaskList {
    tasks: Vec<RawTask>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTask {
    #[serde(default)]
    name: String,
    #[serde(default)]
    due_date: String,
    #[serde(default)]
    urgency: Option<String>,
    #[serde(default)]
    required_hours: Option<f64>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

fn normalize(index: usize, raw: RawTask) -> Result<ParsedTask, ParseFailure> {
    let malformed = |reason: String| ParseFailure::Malformed { index, reason };

    let name = raw.name.trim().to_string();
    if name.is_empty() {
        return Err(malformed("missing name".to_string()));
    }
    let due_date = parse_due_date(&raw.due_date)
        .ok_or_else(|| malformed(format!("bad dueDate '{}'", raw.due_date)))?;
    let urgency = match raw.urgency.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        None => None,
        Some(s) => Some(Urgency::from_str(s).ok_or_else(|| malformed(format!("bad urgency '{}'", s)))?),
    };
    if let Some(h) = raw.required_hours
        && (!h.is_finite() || h < 0.0)
    {
        return Err(malformed("requiredHours must be a non-negative number".to_string()));
    }

    Ok(ParsedTask {
        name,
        due_date,
        urgency,
        required_hours: raw.required_hours,
        tags: raw
            .tags
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
    })
}

/// Normalize a generated task list. All entries must be valid; zero
/// entries is a failure.
pub fn interpret(value: Value) -> Result<Vec<ParsedTask>, ParseFailure> {
    let raw: RawTaskList = serde_json::from_value(value).map_err(|e| ParseFailure::Malformed {
        index: 0,
        reason: e.to_string(),
    })?;
    if raw.tasks.is_empty() {
        return Err(ParseFailure::NoTasks);
    }
    raw.tasks
        .into_iter()
        .enumerate()
        .map(|(i, t)| normalize(i, t))
        .collect()
}

/// Parse a block of text into tasks.
pub async fn parse_task_list(
    generator: &dyn TextGenerator,
    template: &str,
    text: &str,
    today: NaiveDate,
) -> Result<Vec<ParsedTask>, ParseFailure> {
    let today = today.format("%Y-%m-%d").to_string();
    let prompt = render(template, &[("today", &today), ("text", text)]);
    let value = generator
        .generate(GenerationRequest::json("parse", prompt, task_list_schema()))
        .await?
        .into_json()?;

    let tasks = interpret(value).inspect_err(|e| warn!(error = %e, "Task list rejected"))?;
    debug!(count = tasks.len(), "Task list parsed");
    Ok(tasks)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_dates_and_tags() {
        let tasks = interpret(json!({"tasks": [
            {"name": "Design mockups", "dueDate": "2024-12-25", "requiredHours": 8, "tags": ["design", ""]},
            {"name": "Ship", "dueDate": "2024-12-26T10:00:00Z", "urgency": "HIGH"}
        ]}))
        .unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].due_date, NaiveDate::from_ymd_opt(2024, 12, 25).unwrap());
        assert_eq!(tasks[0].required_hours, Some(8.0));
        assert_eq!(tasks[0].tags, vec!["design".to_string()]);
        assert_eq!(tasks[1].urgency, Some(Urgency::High));
    }

    #[test]
    fn empty_list_fails() {
        assert!(matches!(interpret(json!({"tasks": []})), Err(ParseFailure::NoTasks)));
    }

    #[test]
    fn one_bad_entry_fails_the_whole_list() {
        let err = interpret(json!({"tasks": [
            {"name": "ok", "dueDate": "2024-12-25"},
            {"name": "bad", "dueDate": "whenever"}
        ]}))
        .unwrap_err();
        assert!(matches!(err, ParseFailure::Malformed { index: 1, .. }));
    }

    #[test]
    fn non_object_output_is_malformed() {
        assert!(matches!(interpret(json!([1, 2])), Err(ParseFailure::Malformed { .. })));
    }
}
