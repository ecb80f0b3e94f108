//! Triage subcommand for the taskzen CLI
//!
//! Reads a JSON array of tasks (the `list_tasks` JSON shape), runs panic-mode
//! triage once and prints the report.

use crate::flows;
use crate::format::{OutputFormat, format_triage_markdown};
use crate::gateway::TextGenerator;
use crate::types::{TaskSnapshot, parse_due_date};
use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Args;
use std::path::{Path, PathBuf};

/// Arguments for the triage subcommand
#[derive(Args, Debug)]
pub struct TriageArgs {
    /// JSON file holding an array of tasks
    #[arg(short, long, value_name = "FILE")]
    pub tasks: PathBuf,

    /// Reference date as YYYY-MM-DD (default: local today)
    #[arg(long, value_name = "DATE")]
    pub today: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

impl TriageArgs {
    pub fn reference_date(&self) -> Result<NaiveDate> {
        match &self.today {
            Some(s) => parse_due_date(s).with_context(|| format!("invalid --today date: {}", s)),
            None => Ok(Local::now().date_naive()),
        }
    }
}

/// Load tasks from a file. Accepts a bare array or a `{"tasks": [...]}` object.
pub fn load_tasks(path: &Path) -> Result<Vec<TaskSnapshot>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    let tasks = match value {
        serde_json::Value::Object(mut map) if map.contains_key("tasks") => {
            map.remove("tasks").unwrap_or_default()
        }
        other => other,
    };
    serde_json::from_value(tasks).context("expected an array of tasks")
}

/// Run triage and render the report.
pub async fn run(args: &TriageArgs, generator: &dyn TextGenerator, template: &str) -> Result<String> {
    let today = args.reference_date()?;
    let tasks = load_tasks(&args.tasks)?;
    let report = flows::triage(generator, template, &tasks, today).await;

    match args.format {
        OutputFormat::Markdown => Ok(format_triage_markdown(&report)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(&report)?),
    }
}
