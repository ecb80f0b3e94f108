//! Task and tag tools backing the manual dashboard actions.

use super::{
    get_bool, get_date, get_hours, get_string, get_string_array, get_urgency, make_tool_with_prompts,
    require_string,
};
use crate::config::Prompts;
use crate::error::ToolError;
use crate::format::{OutputFormat, format_tags_markdown, format_tasks_markdown, markdown_to_json};
use crate::plan::{FieldChanges, TaskDraft};
use crate::session::Session;
use anyhow::Result;
use rmcp::model::Tool;
use serde_json::{Value, json};

fn task_fields() -> Value {
    json!({
        "name": {
            "type": "string",
            "description": "Task name"
        },
        "due_date": {
            "type": "string",
            "description": "Due date as YYYY-MM-DD"
        },
        "urgency": {
            "type": "string",
            "enum": ["low", "medium", "high"],
            "description": "Task urgency"
        },
        "required_hours": {
            "type": "number",
            "description": "Estimated effort in hours"
        },
        "tags": {
            "type": "array",
            "items": { "type": "string" },
            "description": "Tag names; unknown tags are created"
        }
    })
}

pub fn get_tools(prompts: &Prompts) -> Vec<Tool> {
    let mut update_fields = task_fields();
    update_fields["id"] = json!({ "type": "string", "description": "Task ID" });
    update_fields["completed"] = json!({ "type": "boolean", "description": "Completion flag" });

    vec![
        make_tool_with_prompts(
            "list_tasks",
            "List tasks. Completed tasks are hidden unless include_completed is set. Filter by tag name with tag.",
            json!({
                "include_completed": {
                    "type": "boolean",
                    "description": "Include completed tasks (default: false)"
                },
                "tag": {
                    "type": "string",
                    "description": "Only tasks carrying this tag"
                },
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
            "list_tags",
            "List all tags with their id, name and color.",
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
            "add_task",
            "Add a task directly. A missing due_date defaults to today.",
            task_fields(),
            vec!["name"],
            prompts,
        ),
        make_tool_with_prompts(
            "update_task",
            "Change fields of a task. tags, when given, replaces the task's whole tag set.",
            update_fields,
            vec!["id"],
            prompts,
        ),
        make_tool_with_prompts(
            "toggle_task",
            "Flip a task between completed and not completed.",
            json!({
                "id": { "type": "string", "description": "Task ID" }
            }),
            vec!["id"],
            prompts,
        ),
        make_tool_with_prompts(
            "delete_task",
            "Delete one or more tasks. Unknown ids are ignored as long as one exists.",
            json!({
                "id": { "type": "string", "description": "Task ID" },
                "ids": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Several task IDs"
                }
            }),
            vec![],
            prompts,
        ),
    ]
}

pub fn list_tasks(session: &Session, args: Value, format: OutputFormat) -> Result<Value> {
    let include_completed = get_bool(&args, "include_completed").unwrap_or(false);
    let tag = get_string(&args, "tag");
    let tasks = session.list_tasks(include_completed, tag.as_deref());

    match format {
        OutputFormat::Markdown => Ok(markdown_to_json(format_tasks_markdown(&tasks))),
        OutputFormat::Json => Ok(json!({
            "count": tasks.len(),
            "tasks": tasks
        })),
    }
}

pub fn list_tags(session: &Session, format: OutputFormat) -> Result<Value> {
    let tags = session.list_tags();
    match format {
        OutputFormat::Markdown => Ok(markdown_to_json(format_tags_markdown(&tags))),
        OutputFormat::Json => Ok(json!({ "tags": tags })),
    }
}

pub fn add_task(session: &Session, args: Value) -> Result<Value> {
    let draft = TaskDraft {
        name: require_string(&args, "name")?,
        due_date: get_date(&args, "due_date")?,
        urgency: get_urgency(&args, "urgency")?,
        required_hours: get_hours(&args, "required_hours")?,
        tags: get_string_array(&args, "tags").unwrap_or_default(),
    };
    let task = session.add_task(draft).map_err(ToolError::from)?;
    Ok(serde_json::to_value(task)?)
}

pub fn update_task(session: &Session, args: Value) -> Result<Value> {
    let id = require_string(&args, "id")?;
    let name = get_string(&args, "name");
    if name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ToolError::invalid_value("name", "name must not be empty").into());
    }
    let changes = FieldChanges {
        name,
        due_date: get_date(&args, "due_date")?,
        urgency: get_urgency(&args, "urgency")?,
        required_hours: get_hours(&args, "required_hours")?,
        tags: get_string_array(&args, "tags"),
        completed: get_bool(&args, "completed"),
    };
    if changes == FieldChanges::default() {
        return Err(ToolError::missing_field("name, due_date, urgency, required_hours, tags or completed").into());
    }
    let task = session.update_task(&id, changes).map_err(ToolError::from)?;
    Ok(serde_json::to_value(task)?)
}

pub fn toggle_task(session: &Session, args: Value) -> Result<Value> {
    let id = require_string(&args, "id")?;
    let task = session.toggle_task(&id).map_err(ToolError::from)?;
    Ok(serde_json::to_value(task)?)
}

pub fn delete_task(session: &Session, args: Value) -> Result<Value> {
    let mut ids = get_string_array(&args, "ids").unwrap_or_default();
    if let Some(id) = get_string(&args, "id") {
        ids.push(id);
    }
    if ids.is_empty() {
        return Err(ToolError::missing_field("id").into());
    }

    let deleted = session.delete_tasks(&ids).map_err(ToolError::from)?;
    Ok(json!({
        "success": true,
        "deleted": deleted
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::gateway::DisabledGateway;
    use crate::store::TaskStore;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn session() -> Session {
        Session::new(TaskStore::new(), Arc::new(DisabledGateway), Prompts::default())
            .with_today(NaiveDate::from_ymd_opt(2024, 8, 6).unwrap())
    }

    fn code(err: anyhow::Error) -> ErrorCode {
        err.downcast::<ToolError>().unwrap().code
    }

    #[test]
    fn add_then_list() {
        let session = session();
        let created = add_task(&session, json!({"name": "Call mom", "tags": ["Personal"], "urgency": "high"})).unwrap();
        assert_eq!(created["dueDate"], "2024-08-06");
        assert_eq!(created["tags"], json!(["Personal"]));

        let listed = list_tasks(&session, json!({"tag": "personal"}), OutputFormat::Json).unwrap();
        assert_eq!(listed["count"], 1);
        let tags = list_tags(&session, OutputFormat::Json).unwrap();
        assert_eq!(tags["tags"][0]["id"], "personal");
    }

    #[test]
    fn add_requires_name() {
        let err = add_task(&session(), json!({"due_date": "2024-08-07"})).unwrap_err();
        assert_eq!(code(err), ErrorCode::MissingRequiredField);
    }

    #[test]
    fn update_rejects_no_changes_and_unknown_ids() {
        let session = session();
        let created = add_task(&session, json!({"name": "A"})).unwrap();
        let id = created["id"].as_str().unwrap().to_string();

        let err = update_task(&session, json!({"id": id})).unwrap_err();
        assert_eq!(code(err), ErrorCode::MissingRequiredField);

        let err = update_task(&session, json!({"id": "nope", "name": "B"})).unwrap_err();
        assert_eq!(code(err), ErrorCode::TaskNotFound);

        let updated = update_task(&session, json!({"id": id, "required_hours": 2.5})).unwrap();
        assert_eq!(updated["requiredHours"], 2.5);
    }

    #[test]
    fn toggle_and_delete() {
        let session = session();
        let created = add_task(&session, json!({"name": "A"})).unwrap();
        let id = created["id"].as_str().unwrap().to_string();

        let toggled = toggle_task(&session, json!({"id": id})).unwrap();
        assert_eq!(toggled["completed"], true);
        let open = list_tasks(&session, json!({}), OutputFormat::Json).unwrap();
        assert_eq!(open["count"], 0);

        let deleted = delete_task(&session, json!({"ids": [id, "ghost"]})).unwrap();
        assert_eq!(deleted["deleted"].as_array().unwrap().len(), 1);
        assert_eq!(session.task_count(), 0);

        let err = delete_task(&session, json!({"id": "ghost"})).unwrap_err();
        assert_eq!(code(err), ErrorCode::TaskNotFound);
    }
}
