//! Classified intents and proposed action plans.

use crate::types::Urgency;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Unanswered plans kept before the oldest is expired.
pub const MAX_PENDING_PLANS: usize = 64;
/// Resolved message ids remembered so a repeat answer is still recognized.
pub const RESOLVED_HISTORY: usize = 256;

/// A task to create. Tags are display names, resolved at execution time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub name: String,
    /// `None` means "inferred": the executor uses the plan's reference date.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_hours: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Fields to change on an existing task. Absent fields are left alone.
///
/// `tags` is the task's complete final tag list (names), not an addition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldChanges {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgency: Option<Urgency>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_hours: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub task_id: String,
    pub changes: FieldChanges,
}

/// A task slated for deletion. The name is for display only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRef {
    pub task_id: String,
    pub name: String,
}

/// One step of an action plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Operation {
    Create { tasks: Vec<TaskDraft> },
    Update { tasks: Vec<TaskUpdate> },
    Delete { tasks: Vec<TaskRef> },
}

impl Operation {
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Create { .. } => "create",
            Operation::Update { .. } => "update",
            Operation::Delete { .. } => "delete",
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Operation::Create { tasks } => tasks.len(),
            Operation::Update { tasks } => tasks.len(),
            Operation::Delete { tasks } => tasks.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ids of existing tasks this operation targets.
    pub fn referenced_ids(&self) -> Vec<&str> {
        match self {
            Operation::Create { .. } => Vec::new(),
            Operation::Update { tasks } => tasks.iter().map(|t| t.task_id.as_str()).collect(),
            Operation::Delete { tasks } => tasks.iter().map(|t| t.task_id.as_str()).collect(),
        }
    }
}

/// A proposed, not yet applied, set of store mutations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPlan {
    pub message_id: String,
    pub confirmation_message: String,
    pub operations: Vec<Operation>,
    /// The "today" the request was classified against.
    pub reference_date: NaiveDate,
}

impl ActionPlan {
    pub fn referenced_ids(&self) -> Vec<&str> {
        self.operations
            .iter()
            .flat_map(Operation::referenced_ids)
            .collect()
    }
}

/// Outcome of classifying one utterance. Exactly one variant applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Analysis {
    Action(ActionPlan),
    #[serde(rename_all = "camelCase")]
    Parse { reasoning: String },
    #[serde(rename_all = "camelCase")]
    Response { text_response: String },
}

/// Lifecycle of a proposed plan. Confirmed and Cancelled are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanState {
    Proposed,
    Confirmed,
    Cancelled,
}

impl PlanState {
    /// Move to `next`, or `None` if the transition is not allowed.
    pub fn transition(self, next: PlanState) -> Option<PlanState> {
        match (self, next) {
            (PlanState::Proposed, PlanState::Confirmed | PlanState::Cancelled) => Some(next),
            _ => None,
        }
    }
}

/// Proposed plans awaiting an answer.
///
/// A plan body is held only while it is proposed. Confirm and cancel take it
/// out; only the message id and final state are remembered, in a bounded
/// record. When too many plans go unanswered the oldest is expired.
#[derive(Debug, Default)]
pub struct PlanRegistry {
    pending: HashMap<String, ActionPlan>,
    order: VecDeque<String>,
    resolved: VecDeque<(String, PlanState)>,
}

impl PlanRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a proposed plan. Returns the message ids of plans expired to
    /// make room.
    pub fn propose(&mut self, plan: ActionPlan) -> Vec<String> {
        let id = plan.message_id.clone();
        if self.pending.insert(id.clone(), plan).is_none() {
            self.order.push_back(id);
        }

        let mut expired = Vec::new();
        while self.order.len() > MAX_PENDING_PLANS {
            if let Some(old) = self.order.pop_front() {
                self.pending.remove(&old);
                debug!(message_id = %old, "Unanswered plan expired");
                expired.push(old);
            }
        }
        expired
    }

    /// Take the proposed plan bound to `message_id` out of the registry and
    /// record it as `next`. `None` if there is no such proposed plan.
    pub fn resolve(&mut self, message_id: &str, next: PlanState) -> Option<ActionPlan> {
        let state = PlanState::Proposed.transition(next)?;
        let plan = self.pending.remove(message_id)?;
        self.order.retain(|id| id != message_id);

        self.resolved.push_back((message_id.to_string(), state));
        if self.resolved.len() > RESOLVED_HISTORY {
            self.resolved.pop_front();
        }
        Some(plan)
    }

    pub fn state(&self, message_id: &str) -> Option<PlanState> {
        if self.pending.contains_key(message_id) {
            return Some(PlanState::Proposed);
        }
        self.resolved
            .iter()
            .rev()
            .find(|(id, _)| id == message_id)
            .map(|(_, state)| *state)
    }

    /// Number of plan bodies currently held.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Counts reported after applying a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Target ids that were missing from the store at apply time.
    pub skipped: Vec<String>,
}

impl ExecutionResult {
    /// Human-readable summary of what was applied.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if self.created > 0 {
            parts.push(format!("created {}", plural(self.created, "task")));
        }
        if self.updated > 0 {
            parts.push(format!("updated {}", plural(self.updated, "task")));
        }
        if self.deleted > 0 {
            parts.push(format!("deleted {}", plural(self.deleted, "task")));
        }

        let mut message = if parts.is_empty() {
            "Done. No tasks were changed.".to_string()
        } else {
            format!("Done! I {}.", parts.join(", "))
        };
        if !self.skipped.is_empty() {
            message.push_str(&format!(
                " {} could not be found and {} skipped.",
                plural(self.skipped.len(), "task"),
                if self.skipped.len() == 1 { "was" } else { "were" }
            ));
        }
        message
    }
}

fn plural(n: usize, noun: &str) -> String {
    if n == 1 {
        format!("1 {}", noun)
    } else {
        format!("{} {}s", n, noun)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn operations_serialize_with_type_tag() {
        let op = Operation::Delete {
            tasks: vec![TaskRef {
                task_id: "t1".into(),
                name: "Call mom".into(),
            }],
        };
        assert_eq!(
            serde_json::to_value(&op).unwrap(),
            json!({"type": "delete", "tasks": [{"taskId": "t1", "name": "Call mom"}]})
        );
    }

    #[test]
    fn analysis_variants_are_tagged() {
        let parse = Analysis::Parse {
            reasoning: "looks like a list".into(),
        };
        assert_eq!(
            serde_json::to_value(&parse).unwrap(),
            json!({"type": "parse", "reasoning": "looks like a list"})
        );
        let response = Analysis::Response {
            text_response: "hi".into(),
        };
        assert_eq!(
            serde_json::to_value(&response).unwrap()["textResponse"],
            "hi"
        );
    }

    #[test]
    fn plan_state_only_leaves_proposed_once() {
        assert_eq!(
            PlanState::Proposed.transition(PlanState::Confirmed),
            Some(PlanState::Confirmed)
        );
        assert_eq!(
            PlanState::Proposed.transition(PlanState::Cancelled),
            Some(PlanState::Cancelled)
        );
        assert_eq!(PlanState::Confirmed.transition(PlanState::Cancelled), None);
        assert_eq!(PlanState::Cancelled.transition(PlanState::Confirmed), None);
        assert_eq!(PlanState::Proposed.transition(PlanState::Proposed), None);
    }

    fn proposal(id: &str) -> ActionPlan {
        ActionPlan {
            message_id: id.into(),
            confirmation_message: "Go?".into(),
            operations: vec![Operation::Delete {
                tasks: vec![TaskRef {
                    task_id: "t1".into(),
                    name: "Call mom".into(),
                }],
            }],
            reference_date: NaiveDate::from_ymd_opt(2024, 8, 6).unwrap(),
        }
    }

    #[test]
    fn registry_drops_plan_once_resolved() {
        let mut registry = PlanRegistry::new();
        registry.propose(proposal("m1"));
        registry.propose(proposal("m2"));
        assert_eq!(registry.pending_len(), 2);

        assert!(registry.resolve("m1", PlanState::Cancelled).is_some());
        assert_eq!(registry.pending_len(), 1);
        assert_eq!(registry.state("m1"), Some(PlanState::Cancelled));
        assert!(registry.resolve("m1", PlanState::Confirmed).is_none());
        assert!(registry.resolve("m2", PlanState::Proposed).is_none());
        assert_eq!(registry.state("m2"), Some(PlanState::Proposed));
    }

    #[test]
    fn registry_is_bounded() {
        let mut registry = PlanRegistry::new();
        let mut expired = Vec::new();
        for i in 0..MAX_PENDING_PLANS + 3 {
            expired.extend(registry.propose(proposal(&format!("m{}", i))));
        }
        assert_eq!(registry.pending_len(), MAX_PENDING_PLANS);
        assert_eq!(expired, vec!["m0", "m1", "m2"]);
        assert_eq!(registry.state("m0"), None);
        assert!(registry.resolve("m0", PlanState::Confirmed).is_none());

        for i in 3..MAX_PENDING_PLANS + 3 {
            registry.resolve(&format!("m{}", i), PlanState::Cancelled);
        }
        assert_eq!(registry.pending_len(), 0);
        for i in 0..RESOLVED_HISTORY {
            let id = format!("r{}", i);
            registry.propose(proposal(&id));
            registry.resolve(&id, PlanState::Confirmed);
        }
        assert_eq!(registry.resolved.len(), RESOLVED_HISTORY);
        assert_eq!(registry.state("m3"), None);
        assert_eq!(registry.state("r0"), Some(PlanState::Confirmed));
    }

    #[test]
    fn referenced_ids_skip_creates() {
        let plan = ActionPlan {
            message_id: "m".into(),
            confirmation_message: "ok?".into(),
            reference_date: NaiveDate::from_ymd_opt(2024, 8, 6).unwrap(),
            operations: vec![
                Operation::Create {
                    tasks: vec![TaskDraft {
                        name: "new".into(),
                        due_date: None,
                        urgency: None,
                        required_hours: None,
                        tags: vec![],
                    }],
                },
                Operation::Update {
                    tasks: vec![TaskUpdate {
                        task_id: "a".into(),
                        changes: FieldChanges::default(),
                    }],
                },
                Operation::Delete {
                    tasks: vec![TaskRef {
                        task_id: "b".into(),
                        name: "B".into(),
                    }],
                },
            ],
        };
        assert_eq!(plan.referenced_ids(), vec!["a", "b"]);
    }

    #[test]
    fn execution_summary_mentions_counts_and_skips() {
        let result = ExecutionResult {
            created: 1,
            updated: 0,
            deleted: 2,
            skipped: vec!["gone".into()],
        };
        assert_eq!(
            result.summary(),
            "Done! I created 1 task, deleted 2 tasks. 1 task could not be found and was skipped."
        );
        assert_eq!(ExecutionResult::default().summary(), "Done. No tasks were changed.");
    }
}
