//! Applies confirmed action plans to the store.

use crate::plan::{ActionPlan, ExecutionResult, Operation, TaskDraft, TaskUpdate};
use crate::store::{StoreError, TaskStore};
use crate::types::{NewTask, Task, TaskPatch};
use chrono::NaiveDate;
use tracing::{debug, info, warn};

/// Insert a draft, resolving its tag names. A draft without a due date gets
/// `default_due`.
pub fn create_task(
    store: &mut TaskStore,
    draft: &TaskDraft,
    default_due: NaiveDate,
) -> Result<Task, StoreError> {
    if draft.name.trim().is_empty() {
        return Err(StoreError::InvalidTask {
            field: "name",
            reason: "name must not be empty".to_string(),
        });
    }
    let tags = store.find_or_create_tags(&draft.tags);
    store.add_task(NewTask {
        name: draft.name.clone(),
        due_date: draft.due_date.unwrap_or(default_due),
        urgency: draft.urgency,
        required_hours: draft.required_hours,
        tags,
    })
}

/// Apply one partial update. Tag names, when given, become the task's
/// complete tag set.
pub fn apply_update(store: &mut TaskStore, update: &TaskUpdate) -> Result<Task, StoreError> {
    if store.get_task(&update.task_id).is_none() {
        return Err(StoreError::TaskNotFound(update.task_id.clone()));
    }
    let changes = &update.changes;
    let tags = changes.tags.as_ref().map(|names| store.find_or_create_tags(names));
    store.update_task(
        &update.task_id,
        TaskPatch {
            name: changes.name.clone(),
            due_date: changes.due_date,
            urgency: changes.urgency,
            required_hours: changes.required_hours,
            tags,
            completed: changes.completed,
        },
    )
}

/// Apply `plan` in order.
///
/// Targets missing at apply time are recorded in `skipped` and do not stop
/// the remaining operations. Only call this for a plan the user confirmed.
pub fn execute(store: &mut TaskStore, plan: &ActionPlan) -> ExecutionResult {
    let mut result = ExecutionResult::default();

    for op in &plan.operations {
        match op {
            Operation::Create { tasks } => {
                for draft in tasks {
                    match create_task(store, draft, plan.reference_date) {
                        Ok(_) => result.created += 1,
                        Err(e) => {
                            warn!(message_id = %plan.message_id, name = %draft.name, error = %e, "Create skipped");
                            result.skipped.push(draft.name.clone());
                        }
                    }
                }
            }
            Operation::Update { tasks } => {
                for item in tasks {
                    match apply_update(store, item) {
                        Ok(_) => result.updated += 1,
                        Err(e) => {
                            warn!(message_id = %plan.message_id, task_id = %item.task_id, error = %e, "Update skipped");
                            result.skipped.push(item.task_id.clone());
                        }
                    }
                }
            }
            Operation::Delete { tasks } => {
                for item in tasks {
                    match store.delete_task(&item.task_id) {
                        Ok(_) => result.deleted += 1,
                        Err(e) => {
                            warn!(message_id = %plan.message_id, task_id = %item.task_id, error = %e, "Delete skipped");
                            result.skipped.push(item.task_id.clone());
                        }
                    }
                }
            }
        }
        debug!(message_id = %plan.message_id, kind = op.kind(), count = op.len(), "Operation applied");
    }

    info!(
        message_id = %plan.message_id,
        created = result.created,
        updated = result.updated,
        deleted = result.deleted,
        skipped = result.skipped.len(),
        "Action plan executed"
    );
    result
}
