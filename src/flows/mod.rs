//! AI-assisted flows.
//!
//! Every flow takes owned snapshots and a [`TextGenerator`](crate::gateway::TextGenerator);
//! none of them touches the store. Mutations happen later, in the executor or
//! the session, after the flow has returned.

pub mod advice;
pub mod classifier;
pub mod parser;
pub mod triage;

pub use advice::{ADVICE_FAILURE_MESSAGE, NO_PENDING_TASKS_MESSAGE, advise};
pub use classifier::{CLASSIFICATION_FAILURE_MESSAGE, ClassificationFailure, ClassifyInput, classify};
pub use parser::{PARSE_FAILURE_MESSAGE, ParseFailure, parse_task_list};
pub use triage::{TriageReport, TriageStep, TriageStepTask, WorkloadSummary, summarize, triage};

use crate::types::{TagSnapshot, TaskSnapshot};
use serde_json::{Value, json};

/// Allow `null` in place of an optional value.
pub(crate) fn nullable(schema: Value) -> Value {
    json!({ "anyOf": [schema, { "type": "null" }] })
}

/// One line per task, as shown to the model.
pub(crate) fn render_tasks(tasks: &[TaskSnapshot]) -> String {
    if tasks.is_empty() {
        return "(No tasks)".to_string();
    }
    tasks
        .iter()
        .map(|t| {
            let mut line = format!(
                "- ID: {}, Name: {}, Due: {}",
                t.id,
                t.name,
                t.due_date.format("%Y-%m-%d")
            );
            if let Some(urgency) = t.urgency {
                line.push_str(&format!(", Urgency: {}", urgency));
            }
            if let Some(hours) = t.required_hours {
                line.push_str(&format!(", Hours: {}", hours));
            }
            let tags: Vec<String> = t.tags.iter().map(|n| format!("\"{}\"", n)).collect();
            line.push_str(&format!(", Tags: [{}]", tags.join(", ")));
            if t.completed {
                line.push_str(", Completed: yes");
            }
            line
        })
        .collect::<Vec<_>>()
        .join("\n")
}

pub(crate) fn render_tags(tags: &[TagSnapshot]) -> String {
    if tags.is_empty() {
        return "(No tags)".to_string();
    }
    tags.iter()
        .map(|t| format!("- ID: {}, Name: {}", t.id, t.name))
        .collect::<Vec<_>>()
        .join("\n")
}
