//! In-memory task and tag store.
//!
//! The store is the only owner of [`Task`] and [`Tag`] records. Everything
//! AI-facing works on snapshots produced by [`TaskStore::task_snapshot`] and
//! [`TaskStore::tag_snapshot`], which are owned copies immune to later
//! mutation.

mod tags;
mod tasks;

pub use tags::{tag_color, tag_id};

use crate::types::{Tag, TagSnapshot, Task, TaskSnapshot, Urgency};
use chrono::{Days, NaiveDate};
use thiserror::Error;

/// Errors raised by store mutations.
#[derive(Debug, Error, PartialEq)]
pub enum StoreError {
    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidTask { field: &'static str, reason: String },
}

/// Tasks and tags held in memory, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
    tags: Vec<Tag>,
}

impl TaskStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding the demo tags and tasks, dated relative to `today`.
    pub fn with_sample_data(today: NaiveDate) -> Self {
        let mut store = Self::new();
        store.find_or_create_tags(&[
            "Project Phoenix".to_string(),
            "Q3 Marketing".to_string(),
            "Website Redesign".to_string(),
            "Personal".to_string(),
            "Example".to_string(),
        ]);

        let samples: [(&str, u64, Urgency, f64, &[&str], bool); 6] = [
            (
                "Design new landing page mockups",
                5,
                Urgency::High,
                10.0,
                &["website-redesign", "project-phoenix", "example"],
                false,
            ),
            (
                "Develop API for user authentication",
                8,
                Urgency::High,
                16.0,
                &["project-phoenix", "example"],
                false,
            ),
            (
                "Plan social media campaign",
                12,
                Urgency::Medium,
                8.0,
                &["q3-marketing", "example"],
                false,
            ),
            (
                "Write blog post on new features",
                7,
                Urgency::Low,
                4.0,
                &["q3-marketing", "example"],
                true,
            ),
            (
                "Book dentist appointment",
                3,
                Urgency::Medium,
                1.0,
                &["personal", "example"],
                false,
            ),
            (
                "Finalize presentation slides for board meeting",
                2,
                Urgency::High,
                5.0,
                &["project-phoenix", "example"],
                false,
            ),
        ];

        for (name, offset, urgency, hours, tag_ids, completed) in samples {
            store.tasks.push(Task {
                id: uuid::Uuid::new_v4().to_string(),
                name: name.to_string(),
                due_date: today.checked_add_days(Days::new(offset)).unwrap_or(today),
                urgency: Some(urgency),
                required_hours: Some(hours),
                tags: tag_ids.iter().map(|t| t.to_string()).collect(),
                completed,
            });
        }

        store
    }

    /// All tasks in insertion order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// All tags in insertion order.
    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn get_task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn get_tag_by_id(&self, id: &str) -> Option<&Tag> {
        self.tags.iter().find(|t| t.id == id)
    }

    /// Copy one task out of the store with tag ids resolved to display names.
    ///
    /// Tag ids with no matching tag are passed through unchanged.
    pub fn snapshot_of(&self, task: &Task) -> TaskSnapshot {
        TaskSnapshot {
            id: task.id.clone(),
            name: task.name.clone(),
            due_date: task.due_date,
            urgency: task.urgency,
            required_hours: task.required_hours,
            tags: task
                .tags
                .iter()
                .map(|id| {
                    self.get_tag_by_id(id)
                        .map(|tag| tag.name.clone())
                        .unwrap_or_else(|| id.clone())
                })
                .collect(),
            completed: task.completed,
        }
    }

    /// Copy tasks out of the store, optionally skipping completed ones.
    pub fn task_snapshot(&self, include_completed: bool) -> Vec<TaskSnapshot> {
        self.tasks
            .iter()
            .filter(|t| include_completed || !t.completed)
            .map(|t| self.snapshot_of(t))
            .collect()
    }

    /// Copy tags out of the store.
    pub fn tag_snapshot(&self) -> Vec<TagSnapshot> {
        self.tags
            .iter()
            .map(|t| TagSnapshot {
                id: t.id.clone(),
                name: t.name.clone(),
            })
            .collect()
    }
}
