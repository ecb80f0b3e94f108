//! Output formatting utilities for markdown and JSON.

use crate::flows::{TriageReport, WorkloadSummary};
use crate::plan::{ActionPlan, Operation};
use crate::types::{Tag, TaskSnapshot, Urgency};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Output format for tool results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Markdown,
}

impl OutputFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "json" => Some(OutputFormat::Json),
            "markdown" | "md" => Some(OutputFormat::Markdown),
            _ => None,
        }
    }
}

fn hours(h: f64) -> String {
    if h.fract() == 0.0 {
        format!("{}h", h as i64)
    } else {
        format!("{:.1}h", h)
    }
}

/// Format a task in short form for lists.
fn format_task_short(task: &TaskSnapshot) -> String {
    let check = if task.completed { "[x]" } else { "[ ]" };
    let marker = match task.urgency {
        Some(Urgency::High) => "!!! ",
        _ => "",
    };
    let mut line = format!(
        "- {} {}{} (due {})",
        check,
        marker,
        task.name,
        task.due_date.format("%Y-%m-%d")
    );
    if let Some(h) = task.required_hours {
        line.push_str(&format!(", {}", hours(h)));
    }
    if !task.tags.is_empty() {
        line.push_str(&format!(" #{}", task.tags.join(" #")));
    }
    let short_id: String = task.id.chars().take(8).collect();
    line.push_str(&format!(" `{}`\n", short_id));
    line
}

/// Format a list of tasks as markdown, earliest due first.
pub fn format_tasks_markdown(tasks: &[TaskSnapshot]) -> String {
    let mut md = format!("# Tasks ({})\n\n", tasks.len());
    let mut ordered: Vec<&TaskSnapshot> = tasks.iter().collect();
    ordered.sort_by_key(|t| (t.completed, t.due_date));
    for task in ordered {
        md.push_str(&format_task_short(task));
    }
    md
}

pub fn format_tags_markdown(tags: &[Tag]) -> String {
    let mut md = format!("# Tags ({})\n\n", tags.len());
    for tag in tags {
        md.push_str(&format!("- {} `{}` {}\n", tag.name, tag.id, tag.color));
    }
    md
}

fn format_summary(summary: &WorkloadSummary) -> String {
    format!(
        "| Tasks | Work | High priority | Overdue | Due today | This week |\n\
         |---|---|---|---|---|---|\n\
         | {} | {} | {} | {} | {} | {} |\n",
        summary.total_tasks,
        hours(summary.total_work_hours),
        hours(summary.high_priority_hours),
        summary.overdue_tasks,
        summary.due_today,
        summary.due_this_week
    )
}

/// Format a triage report as markdown.
pub fn format_triage_markdown(report: &TriageReport) -> String {
    let mut md = format!("# Panic Mode: {}\n\n", report.today.format("%Y-%m-%d"));
    md.push_str(&format_summary(&report.summary));
    for (i, step) in report.action_plan.iter().enumerate() {
        md.push_str(&format!("\n## {}. {}\n\n{}\n", i + 1, step.title, step.description));
        if !step.tasks.is_empty() {
            md.push('\n');
        }
        for task in &step.tasks {
            let mut line = format!("- {}", task.name);
            if let Some(h) = task.required_hours {
                line.push_str(&format!(" ({})", hours(h)));
            }
            if let Some(p) = task.priority {
                line.push_str(&format!(" [{}]", p));
            }
            md.push_str(&line);
            md.push('\n');
        }
    }
    md
}

/// Format a proposed plan for review before confirmation.
pub fn format_plan_markdown(plan: &ActionPlan) -> String {
    let mut md = format!("{}\n\n", plan.confirmation_message);
    for op in &plan.operations {
        match op {
            Operation::Create { tasks } => {
                for t in tasks {
                    let due = t
                        .due_date
                        .unwrap_or(plan.reference_date)
                        .format("%Y-%m-%d");
                    md.push_str(&format!("- create: {} (due {})\n", t.name, due));
                }
            }
            Operation::Update { tasks } => {
                for t in tasks {
                    md.push_str(&format!("- update: `{}`\n", t.task_id));
                }
            }
            Operation::Delete { tasks } => {
                for t in tasks {
                    md.push_str(&format!("- delete: {} `{}`\n", t.name, t.task_id));
                }
            }
        }
    }
    md.push_str(&format!(
        "\nReply with confirm_plan or cancel_plan using message_id `{}`.\n",
        plan.message_id
    ));
    md
}

/// Wrap markdown for uniform response handling.
pub fn markdown_to_json(md: String) -> Value {
    serde_json::json!({
        "format": "markdown",
        "content": md
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::triage::{PlanSource, TriageStep, TriageStepTask};
    use chrono::NaiveDate;

    fn task(name: &str, day: u32, completed: bool) -> TaskSnapshot {
        TaskSnapshot {
            id: format!("{}-0000-id", name.to_lowercase()),
            name: name.into(),
            due_date: NaiveDate::from_ymd_opt(2024, 8, day).unwrap(),
            urgency: Some(Urgency::High),
            required_hours: Some(1.5),
            tags: vec!["Personal".into()],
            completed,
        }
    }

    #[test]
    fn format_parsing() {
        assert_eq!(OutputFormat::from_str("MD"), Some(OutputFormat::Markdown));
        assert_eq!(OutputFormat::from_str("json"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::from_str("xml"), None);
    }

    #[test]
    fn task_list_puts_open_tasks_first() {
        let md = format_tasks_markdown(&[task("Done", 1, true), task("Later", 9, false), task("Soon", 7, false)]);
        let soon = md.find("Soon").unwrap();
        let later = md.find("Later").unwrap();
        let done = md.find("Done").unwrap();
        assert!(soon < later && later < done);
        assert!(md.contains("- [ ] !!! Soon (due 2024-08-07), 1.5h #Personal"));
    }

    #[test]
    fn triage_markdown_lists_steps() {
        let report = TriageReport {
            today: NaiveDate::from_ymd_opt(2024, 8, 6).unwrap(),
            summary: WorkloadSummary {
                total_tasks: 1,
                total_work_hours: 2.0,
                ..Default::default()
            },
            action_plan: vec![TriageStep {
                title: "Due Today".into(),
                description: "Start here.".into(),
                tasks: vec![TriageStepTask {
                    id: "a".into(),
                    name: "Call mom".into(),
                    required_hours: Some(2.0),
                    priority: Some(Urgency::High),
                }],
            }],
            source: PlanSource::Generated,
        };
        let md = format_triage_markdown(&report);
        assert!(md.contains("## 1. Due Today"));
        assert!(md.contains("- Call mom (2h) [high]"));
        assert!(md.contains("| 1 | 2h | 0h | 0 | 0 | 0 |"));
    }
}
