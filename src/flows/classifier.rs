//! Request classification.
//!
//! Turns one user utterance into exactly one [`Analysis`]: an action plan,
//! a pointer to the task-list parser, or a plain reply. The generated value
//! is checked twice: against the JSON schema by the gateway, then here
//! against the snapshot the request was classified with. Anything that does
//! not hold up is a [`ClassificationFailure`]; no plan is ever guessed.

use super::{nullable, render_tags, render_tasks};
use crate::gateway::{GenerationError, GenerationRequest, TextGenerator};
use crate::plan::{ActionPlan, Analysis, FieldChanges, Operation, TaskDraft, TaskRef, TaskUpdate};
use crate::prompts::render;
use crate::types::{TagSnapshot, TaskSnapshot, Urgency, parse_due_date};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Reply shown when classification fails.
pub const CLASSIFICATION_FAILURE_MESSAGE: &str =
    "Sorry, I couldn't work out what to do with that. Could you rephrase your request?";

#[derive(Debug, Error)]
pub enum ClassificationFailure {
    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("unrecognized analysis shape: {0}")]
    Shape(String),

    #[error("invalid action plan: {0}")]
    InvalidPlan(String),

    #[error("plan references unknown task id '{0}'")]
    UnknownTask(String),
}

/// Everything one classification call sees.
#[derive(Debug, Clone)]
pub struct ClassifyInput<'a> {
    pub request: &'a str,
    pub tasks: &'a [TaskSnapshot],
    pub tags: &'a [TagSnapshot],
    /// Fixed once per call; all relative dates resolve against it.
    pub today: NaiveDate,
    /// Correlation id assigned by the caller. Always wins over the model's.
    pub message_id: &'a str,
}

/// JSON schema for the three analysis variants.
pub fn analysis_schema() -> Value {
    let string = json!({ "type": "string" });
    let tag_names = json!({ "type": "array", "items": { "type": "string" } });
    let urgency = json!({ "type": "string", "enum": ["low", "medium", "high"] });

    let create = json!({
        "type": "object",
        "required": ["type", "tasks"],
        "properties": {
            "type": { "type": "string", "enum": ["create"] },
            "tasks": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "required": ["name"],
                    "properties": {
                        "name": string,
                        "dueDate": nullable(string.clone()),
                        "urgency": nullable(urgency.clone()),
                        "requiredHours": nullable(json!({ "type": "number" })),
                        "tags": nullable(tag_names.clone()),
                    }
                }
            }
        }
    });

    let update = json!({
        "type": "object",
        "required": ["type", "tasks"],
        "properties": {
            "type": { "type": "string", "enum": ["update"] },
            "tasks": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "required": ["id", "updates"],
                    "properties": {
                        "id": string,
                        "updates": {
                            "type": "object",
                            "properties": {
                                "name": nullable(string.clone()),
                                "dueDate": nullable(string.clone()),
                                "urgency": nullable(urgency),
                                "requiredHours": nullable(json!({ "type": "number" })),
                                "tags": nullable(tag_names),
                                "completed": nullable(json!({ "type": "boolean" })),
                            }
                        }
                    }
                }
            }
        }
    });

    let delete = json!({
        "type": "object",
        "required": ["type", "tasks"],
        "properties": {
            "type": { "type": "string", "enum": ["delete"] },
            "tasks": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "required": ["id"],
                    "properties": { "id": string, "name": nullable(string.clone()) }
                }
            }
        }
    });

    json!({
        "anyOf": [
            {
                "type": "object",
                "required": ["type", "operations", "confirmationMessage"],
                "properties": {
                    "type": { "type": "string", "enum": ["action"] },
                    "messageId": nullable(string.clone()),
                    "confirmationMessage": string,
                    "operations": {
                        "type": "array",
                        "minItems": 1,
                        "items": { "anyOf": [create, update, delete] }
                    }
                }
            },
            {
                "type": "object",
                "required": ["type", "reasoning"],
                "properties": {
                    "type": { "type": "string", "enum": ["parse"] },
                    "reasoning": string
                }
            },
            {
                "type": "object",
                "required": ["type", "textResponse"],
                "properties": {
                    "type": { "type": "string", "enum": ["response"] },
                    "textResponse": string
                }
            }
        ]
    })
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawAnalysis {
    #[serde(rename_all = "camelCase")]
    Action {
        confirmation_message: String,
        operations: Vec<RawOperation>,
    },
    Parse {
        reasoning: String,
    },
    #[serde(rename_all = "camelCase")]
    Response {
        text_response: String,
    },
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum RawOperation {
    Create { tasks: Vec<RawDraft> },
    Update { tasks: Vec<RawUpdate> },
    Delete { tasks: Vec<RawRef> },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawDraft {
    name: String,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    urgency: Option<String>,
    #[serde(default)]
    required_hours: Option<f64>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct RawUpdate {
    id: String,
    #[serde(default)]
    updates: RawChanges,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RawChanges {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    due_date: Option<String>,
    #[serde(default)]
    urgency: Option<String>,
    #[serde(default)]
    required_hours: Option<f64>,
    #[serde(default)]
    tags: Option<Vec<String>>,
    #[serde(default)]
    completed: Option<bool>,
}

#[derive(Deserialize)]
struct RawRef {
    id: String,
}

fn parse_date_field(raw: Option<&str>, context: &str) -> Result<Option<NaiveDate>, ClassificationFailure> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => parse_due_date(s)
            .map(Some)
            .ok_or_else(|| ClassificationFailure::InvalidPlan(format!("{}: bad dueDate '{}'", context, s))),
    }
}

fn parse_urgency_field(raw: Option<&str>, context: &str) -> Result<Option<Urgency>, ClassificationFailure> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(None),
        Some(s) => Urgency::from_str(s)
            .map(Some)
            .ok_or_else(|| ClassificationFailure::InvalidPlan(format!("{}: bad urgency '{}'", context, s))),
    }
}

fn check_hours(hours: Option<f64>, context: &str) -> Result<Option<f64>, ClassificationFailure> {
    match hours {
        Some(h) if !h.is_finite() || h < 0.0 => Err(ClassificationFailure::InvalidPlan(format!(
            "{}: requiredHours must be a non-negative number",
            context
        ))),
        other => Ok(other),
    }
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    tags.into_iter()
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .collect()
}

fn convert_operation(
    raw: RawOperation,
    index: usize,
    known: &HashMap<&str, &TaskSnapshot>,
) -> Result<Operation, ClassificationFailure> {
    let op = match raw {
        RawOperation::Create { tasks } => {
            let drafts = tasks
                .into_iter()
                .enumerate()
                .map(|(i, d)| {
                    let context = format!("operations[{}].tasks[{}]", index, i);
                    let name = d.name.trim().to_string();
                    if name.is_empty() {
                        return Err(ClassificationFailure::InvalidPlan(format!("{}: empty name", context)));
                    }
                    Ok(TaskDraft {
                        name,
                        due_date: parse_date_field(d.due_date.as_deref(), &context)?,
                        urgency: parse_urgency_field(d.urgency.as_deref(), &context)?,
                        required_hours: check_hours(d.required_hours, &context)?,
                        tags: clean_tags(d.tags.unwrap_or_default()),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Operation::Create { tasks: drafts }
        }
        RawOperation::Update { tasks } => {
            let updates = tasks
                .into_iter()
                .enumerate()
                .map(|(i, u)| {
                    let context = format!("operations[{}].tasks[{}]", index, i);
                    if !known.contains_key(u.id.as_str()) {
                        return Err(ClassificationFailure::UnknownTask(u.id));
                    }
                    let c = u.updates;
                    let name = match c.name.map(|n| n.trim().to_string()) {
                        Some(n) if n.is_empty() => {
                            return Err(ClassificationFailure::InvalidPlan(format!(
                                "{}: empty name",
                                context
                            )));
                        }
                        other => other,
                    };
                    let changes = FieldChanges {
                        name,
                        due_date: parse_date_field(c.due_date.as_deref(), &context)?,
                        urgency: parse_urgency_field(c.urgency.as_deref(), &context)?,
                        required_hours: check_hours(c.required_hours, &context)?,
                        tags: c.tags.map(clean_tags),
                        completed: c.completed,
                    };
                    if changes == FieldChanges::default() {
                        return Err(ClassificationFailure::InvalidPlan(format!(
                            "{}: update changes nothing",
                            context
                        )));
                    }
                    Ok(TaskUpdate {
                        task_id: u.id,
                        changes,
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            Operation::Update { tasks: updates }
        }
        RawOperation::Delete { tasks } => {
            let refs = tasks
                .into_iter()
                .map(|r| match known.get(r.id.as_str()) {
                    Some(task) => Ok(TaskRef {
                        name: task.name.clone(),
                        task_id: r.id,
                    }),
                    None => Err(ClassificationFailure::UnknownTask(r.id)),
                })
                .collect::<Result<Vec<_>, _>>()?;
            Operation::Delete { tasks: refs }
        }
    };

    if op.is_empty() {
        return Err(ClassificationFailure::InvalidPlan(format!(
            "operations[{}]: {} has no tasks",
            index,
            op.kind()
        )));
    }
    Ok(op)
}

/// Check a generated value against the request's snapshot and build the
/// typed [`Analysis`].
///
/// The caller's `message_id` replaces whatever the model returned. Every
/// update/delete target must be a task id from `input.tasks`.
pub fn interpret(value: Value, input: &ClassifyInput<'_>) -> Result<Analysis, ClassificationFailure> {
    let raw: RawAnalysis =
        serde_json::from_value(value).map_err(|e| ClassificationFailure::Shape(e.to_string()))?;

    match raw {
        RawAnalysis::Parse { reasoning } => Ok(Analysis::Parse { reasoning }),
        RawAnalysis::Response { text_response } => {
            if text_response.trim().is_empty() {
                return Err(ClassificationFailure::Shape("empty textResponse".to_string()));
            }
            Ok(Analysis::Response { text_response })
        }
        RawAnalysis::Action {
            confirmation_message,
            operations,
        } => {
            let confirmation_message = confirmation_message.trim().to_string();
            if confirmation_message.is_empty() {
                return Err(ClassificationFailure::InvalidPlan(
                    "missing confirmationMessage".to_string(),
                ));
            }
            if operations.is_empty() {
                return Err(ClassificationFailure::InvalidPlan("no operations".to_string()));
            }

            let known: HashMap<&str, &TaskSnapshot> =
                input.tasks.iter().map(|t| (t.id.as_str(), t)).collect();
            let operations = operations
                .into_iter()
                .enumerate()
                .map(|(i, op)| convert_operation(op, i, &known))
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Analysis::Action(ActionPlan {
                message_id: input.message_id.to_string(),
                confirmation_message,
                operations,
                reference_date: input.today,
            }))
        }
    }
}

/// Render the classification prompt.
pub fn build_prompt(template: &str, input: &ClassifyInput<'_>) -> String {
    let today = input.today.format("%Y-%m-%d").to_string();
    render(
        template,
        &[
            ("today", &today),
            ("message_id", input.message_id),
            ("request", input.request),
            ("tasks", &render_tasks(input.tasks)),
            ("tags", &render_tags(input.tags)),
        ],
    )
}

/// Classify one utterance.
pub async fn classify(
    generator: &dyn TextGenerator,
    template: &str,
    input: &ClassifyInput<'_>,
) -> Result<Analysis, ClassificationFailure> {
    let request = GenerationRequest::json("classify", build_prompt(template, input), analysis_schema());
    let value = generator.generate(request).await?.into_json()?;

    let analysis = interpret(value, input).inspect_err(|e| {
        warn!(message_id = input.message_id, error = %e, "Rejected generated analysis");
    })?;
    debug!(
        message_id = input.message_id,
        kind = match &analysis {
            Analysis::Action(_) => "action",
            Analysis::Parse { .. } => "parse",
            Analysis::Response { .. } => "response",
        },
        "Request classified"
    );
    Ok(analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::schema::validate;

    fn snapshot() -> Vec<TaskSnapshot> {
        vec![
            TaskSnapshot {
                id: "t1".into(),
                name: "Call mom".into(),
                due_date: NaiveDate::from_ymd_opt(2024, 8, 8).unwrap(),
                urgency: Some(Urgency::High),
                required_hours: None,
                tags: vec!["Personal".into()],
                completed: false,
            },
            TaskSnapshot {
                id: "t2".into(),
                name: "Book dentist".into(),
                due_date: NaiveDate::from_ymd_opt(2024, 8, 9).unwrap(),
                urgency: None,
                required_hours: Some(0.5),
                tags: vec!["Personal".into()],
                completed: false,
            },
        ]
    }

    fn input<'a>(tasks: &'a [TaskSnapshot]) -> ClassifyInput<'a> {
        ClassifyInput {
            request: "delete my personal tasks",
            tasks,
            tags: &[],
            today: NaiveDate::from_ymd_opt(2024, 8, 6).unwrap(),
            message_id: "msg-1",
        }
    }

    #[test]
    fn action_plan_takes_callers_message_id() {
        let tasks = snapshot();
        let value = json!({
            "type": "action",
            "messageId": "made-up",
            "confirmationMessage": "Delete 2 personal tasks?",
            "operations": [{"type": "delete", "tasks": [{"id": "t1", "name": "x"}, {"id": "t2"}]}]
        });
        let Analysis::Action(plan) = interpret(value, &input(&tasks)).unwrap() else {
            panic!("expected action");
        };
        assert_eq!(plan.message_id, "msg-1");
        assert_eq!(plan.reference_date, NaiveDate::from_ymd_opt(2024, 8, 6).unwrap());
        assert_eq!(
            plan.operations,
            vec![Operation::Delete {
                tasks: vec![
                    TaskRef { task_id: "t1".into(), name: "Call mom".into() },
                    TaskRef { task_id: "t2".into(), name: "Book dentist".into() },
                ]
            }]
        );
    }

    #[test]
    fn unknown_ids_are_rejected() {
        let tasks = snapshot();
        let value = json!({
            "type": "action",
            "confirmationMessage": "Mark done?",
            "operations": [{"type": "update", "tasks": [{"id": "ghost", "updates": {"completed": true}}]}]
        });
        assert!(matches!(
            interpret(value, &input(&tasks)),
            Err(ClassificationFailure::UnknownTask(id)) if id == "ghost"
        ));
    }

    #[test]
    fn unknown_variant_is_rejected_not_coerced() {
        let tasks = snapshot();
        let err = interpret(json!({"type": "maybe", "textResponse": "hi"}), &input(&tasks)).unwrap_err();
        assert!(matches!(err, ClassificationFailure::Shape(_)));
    }

    #[test]
    fn action_requires_confirmation_and_operations() {
        let tasks = snapshot();
        let no_message = json!({
            "type": "action",
            "confirmationMessage": "  ",
            "operations": [{"type": "delete", "tasks": [{"id": "t1"}]}]
        });
        assert!(matches!(
            interpret(no_message, &input(&tasks)),
            Err(ClassificationFailure::InvalidPlan(_))
        ));
        let no_ops = json!({"type": "action", "confirmationMessage": "ok?", "operations": []});
        assert!(matches!(
            interpret(no_ops, &input(&tasks)),
            Err(ClassificationFailure::InvalidPlan(_))
        ));
    }

    #[test]
    fn create_and_update_fields_are_typed() {
        let tasks = snapshot();
        let value = json!({
            "type": "action",
            "confirmationMessage": "Add one, retag one?",
            "operations": [
                {"type": "create", "tasks": [{"name": " Buy milk ", "dueDate": "2024-08-07", "urgency": "Low", "tags": ["Errands", " "]}]},
                {"type": "update", "tasks": [{"id": "t2", "updates": {"tags": ["Health"], "urgency": null}}]}
            ]
        });
        let Analysis::Action(plan) = interpret(value, &input(&tasks)).unwrap() else {
            panic!("expected action");
        };
        let Operation::Create { tasks: drafts } = &plan.operations[0] else {
            panic!("expected create");
        };
        assert_eq!(drafts[0].name, "Buy milk");
        assert_eq!(drafts[0].due_date, NaiveDate::from_ymd_opt(2024, 8, 7));
        assert_eq!(drafts[0].urgency, Some(Urgency::Low));
        assert_eq!(drafts[0].tags, vec!["Errands".to_string()]);
        let Operation::Update { tasks: updates } = &plan.operations[1] else {
            panic!("expected update");
        };
        assert_eq!(updates[0].changes.tags, Some(vec!["Health".to_string()]));
        assert_eq!(updates[0].changes.urgency, None);
    }

    #[test]
    fn bad_dates_and_empty_updates_fail() {
        let tasks = snapshot();
        let bad_date = json!({
            "type": "action",
            "confirmationMessage": "ok?",
            "operations": [{"type": "create", "tasks": [{"name": "x", "dueDate": "someday"}]}]
        });
        assert!(interpret(bad_date, &input(&tasks)).is_err());
        let empty_update = json!({
            "type": "action",
            "confirmationMessage": "ok?",
            "operations": [{"type": "update", "tasks": [{"id": "t1", "updates": {}}]}]
        });
        assert!(interpret(empty_update, &input(&tasks)).is_err());
    }

    #[test]
    fn schema_accepts_all_three_variants() {
        let schema = analysis_schema();
        assert!(validate(&schema, &json!({"type": "response", "textResponse": "hi"})).is_ok());
        assert!(validate(&schema, &json!({"type": "parse", "reasoning": "list"})).is_ok());
        assert!(
            validate(
                &schema,
                &json!({
                    "type": "action",
                    "confirmationMessage": "ok?",
                    "operations": [{"type": "create", "tasks": [{"name": "x", "urgency": null}]}]
                })
            )
            .is_ok()
        );
        assert!(validate(&schema, &json!({"type": "response"})).is_err());
        assert!(
            validate(
                &schema,
                &json!({
                    "type": "action",
                    "confirmationMessage": "ok?",
                    "operations": [{"type": "create", "tasks": [{"name": "x", "urgency": "urgent"}]}]
                })
            )
            .is_err()
        );
    }

    #[test]
    fn prompt_carries_request_and_ids() {
        let tasks = snapshot();
        let prompt = build_prompt(crate::prompts::defaults::CLASSIFY, &input(&tasks));
        assert!(prompt.contains("\"delete my personal tasks\""));
        assert!(prompt.contains("msg-1"));
        assert!(prompt.contains("2024-08-06"));
        assert!(prompt.contains("ID: t2, Name: Book dentist"));
    }
}
