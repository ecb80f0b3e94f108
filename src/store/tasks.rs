//! Task CRUD operations.

use super::{StoreError, TaskStore};
use crate::types::{NewTask, Task, TaskPatch};
use tracing::debug;
use uuid::Uuid;

fn validate_name(name: &str) -> Result<String, StoreError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(StoreError::InvalidTask {
            field: "name",
            reason: "name must not be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn validate_hours(hours: Option<f64>) -> Result<Option<f64>, StoreError> {
    match hours {
        Some(h) if !h.is_finite() || h < 0.0 => Err(StoreError::InvalidTask {
            field: "requiredHours",
            reason: format!("expected a non-negative number, got {}", h),
        }),
        other => Ok(other),
    }
}

/// Remove duplicate tag ids, keeping first occurrences.
fn dedup_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        if !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

fn build_task(input: NewTask) -> Result<Task, StoreError> {
    Ok(Task {
        id: Uuid::new_v4().to_string(),
        name: validate_name(&input.name)?,
        due_date: input.due_date,
        urgency: input.urgency,
        required_hours: validate_hours(input.required_hours)?,
        tags: dedup_tags(input.tags),
        completed: false,
    })
}

impl TaskStore {
    /// Insert a new task. The store assigns the id; `completed` starts false.
    pub fn add_task(&mut self, input: NewTask) -> Result<Task, StoreError> {
        let task = build_task(input)?;
        debug!(task_id = %task.id, name = %task.name, "Adding task");
        self.tasks.push(task.clone());
        Ok(task)
    }

    /// Insert several tasks. All inputs are validated before any is inserted.
    pub fn add_tasks(&mut self, inputs: Vec<NewTask>) -> Result<Vec<Task>, StoreError> {
        let built = inputs
            .into_iter()
            .map(build_task)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(count = built.len(), "Adding tasks");
        self.tasks.extend(built.iter().cloned());
        Ok(built)
    }

    /// Apply a partial update. Fields absent from the patch are left untouched.
    pub fn update_task(&mut self, id: &str, patch: TaskPatch) -> Result<Task, StoreError> {
        let name = patch.name.as_deref().map(validate_name).transpose()?;
        let hours = validate_hours(patch.required_hours)?;

        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::TaskNotFound(id.to_string()))?;

        if let Some(name) = name {
            task.name = name;
        }
        if let Some(due_date) = patch.due_date {
            task.due_date = due_date;
        }
        if let Some(urgency) = patch.urgency {
            task.urgency = Some(urgency);
        }
        if hours.is_some() {
            task.required_hours = hours;
        }
        if let Some(tags) = patch.tags {
            task.tags = dedup_tags(tags);
        }
        if let Some(completed) = patch.completed {
            task.completed = completed;
        }

        debug!(task_id = %id, "Updated task");
        Ok(task.clone())
    }

    /// Remove a task, returning it.
    pub fn delete_task(&mut self, id: &str) -> Result<Task, StoreError> {
        let index = self
            .tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| StoreError::TaskNotFound(id.to_string()))?;
        debug!(task_id = %id, "Deleting task");
        Ok(self.tasks.remove(index))
    }

    /// Remove every task whose id is listed. Unknown ids are ignored.
    pub fn delete_tasks(&mut self, ids: &[String]) -> Vec<Task> {
        let (removed, kept): (Vec<Task>, Vec<Task>) = std::mem::take(&mut self.tasks)
            .into_iter()
            .partition(|t| ids.contains(&t.id));
        self.tasks = kept;
        debug!(count = removed.len(), "Deleted tasks");
        removed
    }

    /// Flip the `completed` flag.
    pub fn toggle_task_completion(&mut self, id: &str) -> Result<Task, StoreError> {
        let task = self
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| StoreError::TaskNotFound(id.to_string()))?;
        task.completed = !task.completed;
        Ok(task.clone())
    }
}
