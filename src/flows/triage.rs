//! Panic-mode triage.
//!
//! The workload summary is computed locally and first, so it never depends on
//! the generation step. The generated step list is checked against the task
//! snapshot; when generation fails or yields nothing usable, a single
//! fallback step is returned instead.

use super::{nullable, render_tasks};
use crate::gateway::{GenerationError, GenerationRequest, TextGenerator};
use crate::prompts::render;
use crate::types::{TaskSnapshot, Urgency};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::cmp::Reverse;
use std::collections::HashMap;
use tracing::{debug, warn};

pub const ALL_CLEAR_TITLE: &str = "All Clear!";
pub const ALL_CLEAR_DESCRIPTION: &str = "You have no pending tasks. Great job!";
pub const FALLBACK_TITLE: &str = "Focus on What Matters";
pub const FALLBACK_DESCRIPTION: &str =
    "I couldn't generate a detailed plan right now; focus on your most urgent tasks first.";

/// Aggregate workload over a task snapshot at a reference date.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkloadSummary {
    pub total_tasks: usize,
    pub total_work_hours: f64,
    pub high_priority_hours: f64,
    pub overdue_tasks: usize,
    pub due_today: usize,
    pub due_this_week: usize,
}

/// Compute the summary. Missing hours count as zero. The date buckets are
/// disjoint: overdue is before `today`, this week is the six days after it.
pub fn summarize(tasks: &[TaskSnapshot], today: NaiveDate) -> WorkloadSummary {
    let week_end = today.checked_add_days(Days::new(7)).unwrap_or(NaiveDate::MAX);
    let mut summary = WorkloadSummary {
        total_tasks: tasks.len(),
        ..Default::default()
    };

    for task in tasks {
        let hours = task.required_hours.unwrap_or(0.0);
        summary.total_work_hours += hours;
        if task.urgency == Some(Urgency::High) {
            summary.high_priority_hours += hours;
        }
        if task.due_date < today {
            summary.overdue_tasks += 1;
        } else if task.due_date == today {
            summary.due_today += 1;
        } else if task.due_date < week_end {
            summary.due_this_week += 1;
        }
    }

    summary
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageStepTask {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Urgency>,
}

impl From<&TaskSnapshot> for TriageStepTask {
    fn from(task: &TaskSnapshot) -> Self {
        Self {
            id: task.id.clone(),
            name: task.name.clone(),
            required_hours: task.required_hours,
            priority: task.urgency,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageStep {
    pub title: String,
    pub description: String,
    pub tasks: Vec<TriageStepTask>,
}

/// Where a report's step list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanSource {
    Generated,
    Fallback,
    AllClear,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageReport {
    pub today: NaiveDate,
    pub summary: WorkloadSummary,
    pub action_plan: Vec<TriageStep>,
    pub source: PlanSource,
}

pub fn all_clear_step() -> TriageStep {
    TriageStep {
        title: ALL_CLEAR_TITLE.to_string(),
        description: ALL_CLEAR_DESCRIPTION.to_string(),
        tasks: Vec::new(),
    }
}

/// The step used when no plan could be generated: every task, earliest due
/// first, then most urgent.
pub fn fallback_step(tasks: &[TaskSnapshot]) -> TriageStep {
    let mut ordered: Vec<&TaskSnapshot> = tasks.iter().collect();
    ordered.sort_by_key(|t| (t.due_date, Reverse(t.urgency)));
    TriageStep {
        title: FALLBACK_TITLE.to_string(),
        description: FALLBACK_DESCRIPTION.to_string(),
        tasks: ordered.into_iter().map(TriageStepTask::from).collect(),
    }
}

pub fn action_plan_schema() -> Value {
    json!({
        "type": "object",
        "required": ["actionPlan"],
        "properties": {
            "actionPlan": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "required": ["title", "description", "tasks"],
                    "properties": {
                        "title": { "type": "string" },
                        "description": { "type": "string" },
                        "tasks": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "required": ["id", "name"],
                                "properties": {
                                    "id": { "type": "string" },
                                    "name": { "type": "string" },
                                    "requiredHours": nullable(json!({ "type": "number" })),
                                    "priority": nullable(json!({ "type": "string" })),
                                }
                            }
                        }
                    }
                }
            }
        }
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPlan {
    action_plan: Vec<RawStep>,
}

#[derive(Deserialize)]
struct RawStep {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    tasks: Vec<RawStepTask>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawStepTask {
    id: String,
    #[serde(default)]
    required_hours: Option<f64>,
    #[serde(default)]
    priority: Option<String>,
}

/// Turn a generated plan into steps over known tasks.
///
/// Entries naming unknown ids are dropped, as are steps left with neither a
/// title nor tasks. Names always come from the snapshot. `None` means the
/// plan is unusable.
pub fn interpret(value: Value, tasks: &[TaskSnapshot]) -> Option<Vec<TriageStep>> {
    let raw: RawPlan = serde_json::from_value(value)
        .inspect_err(|e| warn!(error = %e, "Generated triage plan has wrong shape"))
        .ok()?;
    let known: HashMap<&str, &TaskSnapshot> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();

    let steps: Vec<TriageStep> = raw
        .action_plan
        .into_iter()
        .filter_map(|step| {
            let step_tasks: Vec<TriageStepTask> = step
                .tasks
                .into_iter()
                .filter_map(|entry| {
                    let Some(task) = known.get(entry.id.as_str()) else {
                        debug!(id = %entry.id, "Dropping unknown task from triage step");
                        return None;
                    };
                    Some(TriageStepTask {
                        id: task.id.clone(),
                        name: task.name.clone(),
                        required_hours: entry.required_hours.or(task.required_hours),
                        priority: entry
                            .priority
                            .as_deref()
                            .and_then(Urgency::from_str)
                            .or(task.urgency),
                    })
                })
                .collect();
            let title = step.title.trim().to_string();
            if title.is_empty() && step_tasks.is_empty() {
                return None;
            }
            Some(TriageStep {
                title,
                description: step.description.trim().to_string(),
                tasks: step_tasks,
            })
        })
        .collect();

    (!steps.is_empty()).then_some(steps)
}

fn render_summary(summary: &WorkloadSummary) -> String {
    format!(
        "- Total tasks: {}\n- Total work hours: {}\n- High-priority hours: {}\n- Overdue: {}\n- Due today: {}\n- Due this week: {}",
        summary.total_tasks,
        summary.total_work_hours,
        summary.high_priority_hours,
        summary.overdue_tasks,
        summary.due_today,
        summary.due_this_week
    )
}

async fn generate_steps(
    generator: &dyn TextGenerator,
    template: &str,
    tasks: &[TaskSnapshot],
    summary: &WorkloadSummary,
    today: NaiveDate,
) -> Result<Option<Vec<TriageStep>>, GenerationError> {
    let today = today.format("%Y-%m-%d").to_string();
    let prompt = render(
        template,
        &[
            ("today", &today),
            ("summary", &render_summary(summary)),
            ("tasks", &render_tasks(tasks)),
        ],
    );
    let value = generator
        .generate(GenerationRequest::json("triage", prompt, action_plan_schema()))
        .await?
        .into_json()?;
    Ok(interpret(value, tasks))
}

/// Triage the incomplete tasks in `tasks`. Never fails.
pub async fn triage(
    generator: &dyn TextGenerator,
    template: &str,
    tasks: &[TaskSnapshot],
    today: NaiveDate,
) -> TriageReport {
    let pending: Vec<TaskSnapshot> = tasks.iter().filter(|t| !t.completed).cloned().collect();
    let summary = summarize(&pending, today);

    if pending.is_empty() {
        return TriageReport {
            today,
            summary,
            action_plan: vec![all_clear_step()],
            source: PlanSource::AllClear,
        };
    }

    let (action_plan, source) =
        match generate_steps(generator, template, &pending, &summary, today).await {
            Ok(Some(steps)) => (steps, PlanSource::Generated),
            Ok(None) => {
                warn!("Generated triage plan had no usable steps; using fallback");
                (vec![fallback_step(&pending)], PlanSource::Fallback)
            }
            Err(e) => {
                warn!(error = %e, category = e.category(), "Triage generation failed; using fallback");
                (vec![fallback_step(&pending)], PlanSource::Fallback)
            }
        };

    TriageReport {
        today,
        summary,
        action_plan,
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, due: (i32, u32, u32), urgency: Option<Urgency>, hours: Option<f64>) -> TaskSnapshot {
        TaskSnapshot {
            id: id.into(),
            name: format!("Task {}", id),
            due_date: NaiveDate::from_ymd_opt(due.0, due.1, due.2).unwrap(),
            urgency,
            required_hours: hours,
            tags: vec![],
            completed: false,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, 6).unwrap()
    }

    #[test]
    fn week_window_excludes_day_seven() {
        let tasks = vec![
            task("a", (2024, 8, 12), None, None),
            task("b", (2024, 8, 13), None, None),
        ];
        let summary = summarize(&tasks, today());
        assert_eq!(summary.due_this_week, 1);
        assert_eq!(summary.overdue_tasks + summary.due_today, 0);
    }

    #[test]
    fn missing_hours_count_as_zero() {
        let tasks = vec![
            task("a", (2024, 8, 6), Some(Urgency::High), None),
            task("b", (2024, 8, 6), Some(Urgency::High), Some(2.5)),
        ];
        let summary = summarize(&tasks, today());
        assert_eq!(summary.total_work_hours, 2.5);
        assert_eq!(summary.high_priority_hours, 2.5);
        assert_eq!(summary.due_today, 2);
    }

    #[test]
    fn fallback_orders_by_due_then_urgency() {
        let tasks = vec![
            task("late-low", (2024, 8, 9), Some(Urgency::Low), None),
            task("soon-none", (2024, 8, 7), None, None),
            task("soon-high", (2024, 8, 7), Some(Urgency::High), None),
        ];
        let ids: Vec<String> = fallback_step(&tasks).tasks.into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec!["soon-high", "soon-none", "late-low"]);
    }

    #[test]
    fn interpret_drops_unknown_ids_and_uses_snapshot_names() {
        let tasks = vec![task("a", (2024, 8, 6), Some(Urgency::Medium), Some(1.0))];
        let steps = interpret(
            json!({"actionPlan": [
                {"title": "Due Today", "description": "Do it", "tasks": [
                    {"id": "a", "name": "renamed", "priority": "high"},
                    {"id": "ghost", "name": "Ghost"}
                ]}
            ]}),
            &tasks,
        )
        .unwrap();
        assert_eq!(steps[0].tasks.len(), 1);
        assert_eq!(steps[0].tasks[0].name, "Task a");
        assert_eq!(steps[0].tasks[0].priority, Some(Urgency::High));
        assert_eq!(steps[0].tasks[0].required_hours, Some(1.0));
    }

    #[test]
    fn interpret_rejects_plans_with_nothing_left() {
        let tasks = vec![task("a", (2024, 8, 6), None, None)];
        assert!(interpret(json!({"actionPlan": []}), &tasks).is_none());
        assert!(
            interpret(
                json!({"actionPlan": [{"title": " ", "description": "", "tasks": [{"id": "ghost", "name": "g"}]}]}),
                &tasks
            )
            .is_none()
        );
        assert!(interpret(json!({"plan": "text"}), &tasks).is_none());
    }
}
