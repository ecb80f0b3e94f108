//! Organizational advice for pending tasks.

use super::render_tasks;
use crate::gateway::{GenerationError, GenerationRequest, TextGenerator};
use crate::prompts::render;
use crate::types::TaskSnapshot;
use chrono::NaiveDate;

pub const NO_PENDING_TASKS_MESSAGE: &str =
    "You have no pending tasks, so you're all clear! Keep up the great work.";
pub const ADVICE_FAILURE_MESSAGE: &str =
    "Sorry, I couldn't generate advice right now. Please try again later.";

/// Markdown advice for the incomplete tasks in `tasks`.
///
/// With nothing pending, returns [`NO_PENDING_TASKS_MESSAGE`] without
/// calling the generator.
pub async fn advise(
    generator: &dyn TextGenerator,
    template: &str,
    tasks: &[TaskSnapshot],
    today: NaiveDate,
) -> Result<String, GenerationError> {
    let pending: Vec<TaskSnapshot> = tasks.iter().filter(|t| !t.completed).cloned().collect();
    if pending.is_empty() {
        return Ok(NO_PENDING_TASKS_MESSAGE.to_string());
    }

    let today = today.format("%Y-%m-%d").to_string();
    let prompt = render(template, &[("today", &today), ("tasks", &render_tasks(&pending))]);
    let text = generator
        .generate(GenerationRequest::text("advice", prompt))
        .await?
        .into_text()?;

    let text = text.trim();
    if text.is_empty() {
        return Err(GenerationError::Malformed("empty advice".to_string()));
    }
    Ok(text.to_string())
}
