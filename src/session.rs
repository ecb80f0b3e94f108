//! The application context: store, conversation, pending plans.
//!
//! A [`Session`] is created once by the top-level application and shared by
//! reference. Store access is serialized through a mutex that is never held
//! across an `.await`; the AI-facing flows only ever see snapshots.

use crate::config::Prompts;
use crate::executor::{apply_update, create_task, execute};
use crate::flows::{
    self, ADVICE_FAILURE_MESSAGE, CLASSIFICATION_FAILURE_MESSAGE, ClassifyInput,
    PARSE_FAILURE_MESSAGE, ParseFailure, TriageReport,
};
use crate::flows::parser::ParsedTask;
use crate::gateway::TextGenerator;
use crate::plan::{
    ActionPlan, Analysis, ExecutionResult, FieldChanges, PlanRegistry, PlanState, TaskDraft, TaskUpdate,
};
use crate::prompts;
use crate::store::{StoreError, TaskStore};
use crate::types::{NewTask, Tag, TaskSnapshot};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

pub const WELCOME_MESSAGE: &str = "Welcome to the TaskZen chatbot! You can ask me to perform actions like 'delete all tasks with the personal tag', paste a list of tasks to add them, or ask for advice.";
pub const CANCELLED_MESSAGE: &str = "Okay, I've cancelled that action. Your tasks are unchanged.";
pub const ADVICE_REQUEST: &str = "Give me advice on my tasks.";

#[derive(Debug, Error)]
pub enum SessionError {
    /// Another classification, parse, advice or triage request is running.
    #[error("another request is already in progress")]
    Busy,

    #[error("no pending plan for message {0}")]
    PlanNotFound(String),

    #[error("{0} must not be empty")]
    EmptyInput(&'static str),

    #[error(transparent)]
    Parse(#[from] ParseFailure),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    /// A proposed plan awaiting confirm or cancel. Detached once resolved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plan: Option<ActionPlan>,
}

/// Ordered chat transcript, seeded with a welcome message.
#[derive(Debug, Clone)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    pub fn new() -> Self {
        Self {
            messages: vec![ChatMessage {
                id: Uuid::new_v4().to_string(),
                role: Role::Assistant,
                content: WELCOME_MESSAGE.to_string(),
                plan: None,
            }],
        }
    }

    /// The last `limit` messages, oldest first.
    pub fn recent(&self, limit: usize) -> &[ChatMessage] {
        let start = self.messages.len().saturating_sub(limit);
        &self.messages[start..]
    }

    fn push(&mut self, message: ChatMessage) -> ChatMessage {
        self.messages.push(message.clone());
        message
    }

    pub fn push_user(&mut self, content: &str) -> ChatMessage {
        self.push(ChatMessage {
            id: Uuid::new_v4().to_string(),
            role: Role::User,
            content: content.to_string(),
            plan: None,
        })
    }

    pub fn push_assistant(&mut self, id: Option<&str>, content: &str, plan: Option<ActionPlan>) -> ChatMessage {
        self.push(ChatMessage {
            id: id.map(str::to_string).unwrap_or_else(|| Uuid::new_v4().to_string()),
            role: Role::Assistant,
            content: content.to_string(),
            plan,
        })
    }

    /// Remove the plan attached to `message_id`, if any.
    pub fn detach_plan(&mut self, message_id: &str) {
        if let Some(message) = self.messages.iter_mut().find(|m| m.id == message_id) {
            message.plan = None;
        }
    }
}

/// What a chat turn produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatOutcome {
    /// A plan was proposed and awaits confirmation.
    Proposed { plan: ActionPlan },
    /// The text was parsed and the tasks inserted.
    Parsed { tasks: Vec<TaskSnapshot> },
    /// The text looked like a task list but could not be parsed.
    ParseFailed,
    Response,
    /// Classification failed; the reply is a generic apology.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatReply {
    pub reply: ChatMessage,
    pub outcome: ChatOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmReply {
    pub reply: ChatMessage,
    pub result: ExecutionResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseReply {
    pub reply: ChatMessage,
    pub tasks: Vec<TaskSnapshot>,
    pub success: bool,
}

/// Clears the in-flight flag when dropped.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct Session {
    store: Mutex<TaskStore>,
    conversation: Mutex<Conversation>,
    plans: Mutex<PlanRegistry>,
    generator: Arc<dyn TextGenerator>,
    prompts: Prompts,
    in_flight: AtomicBool,
    fixed_today: Option<NaiveDate>,
}

impl Session {
    pub fn new(store: TaskStore, generator: Arc<dyn TextGenerator>, prompts: Prompts) -> Self {
        Self {
            store: Mutex::new(store),
            conversation: Mutex::new(Conversation::new()),
            plans: Mutex::new(PlanRegistry::new()),
            generator,
            prompts,
            in_flight: AtomicBool::new(false),
            fixed_today: None,
        }
    }

    /// Pin the reference date instead of reading the local clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.fixed_today = Some(today);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.fixed_today.unwrap_or_else(|| Local::now().date_naive())
    }

    fn begin(&self) -> Result<InFlight<'_>, SessionError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| SessionError::Busy)?;
        Ok(InFlight(&self.in_flight))
    }

    fn template(&self, flow: &str) -> &str {
        prompts::template(flow, &self.prompts)
    }

    // Store reads

    pub fn list_tasks(&self, include_completed: bool, tag: Option<&str>) -> Vec<TaskSnapshot> {
        let store = lock(&self.store);
        let wanted = tag.map(crate::store::tag_id);
        store
            .tasks()
            .iter()
            .filter(|t| include_completed || !t.completed)
            .filter(|t| wanted.as_ref().is_none_or(|id| t.tags.contains(id)))
            .map(|t| store.snapshot_of(t))
            .collect()
    }

    pub fn list_tags(&self) -> Vec<Tag> {
        lock(&self.store).tags().to_vec()
    }

    pub fn get_task(&self, id: &str) -> Option<TaskSnapshot> {
        let store = lock(&self.store);
        store.get_task(id).map(|t| store.snapshot_of(t))
    }

    pub fn task_count(&self) -> usize {
        lock(&self.store).tasks().len()
    }

    /// A copy of the whole store, for comparisons and export.
    pub fn store_snapshot(&self) -> TaskStore {
        lock(&self.store).clone()
    }

    // Manual edits

    pub fn add_task(&self, draft: TaskDraft) -> Result<TaskSnapshot, SessionError> {
        let today = self.today();
        let mut store = lock(&self.store);
        let task = create_task(&mut store, &draft, today)?;
        Ok(store.snapshot_of(&task))
    }

    pub fn update_task(&self, id: &str, changes: FieldChanges) -> Result<TaskSnapshot, SessionError> {
        let mut store = lock(&self.store);
        let task = apply_update(
            &mut store,
            &TaskUpdate {
                task_id: id.to_string(),
                changes,
            },
        )?;
        Ok(store.snapshot_of(&task))
    }

    pub fn toggle_task(&self, id: &str) -> Result<TaskSnapshot, SessionError> {
        let mut store = lock(&self.store);
        let task = store.toggle_task_completion(id)?;
        Ok(store.snapshot_of(&task))
    }

    /// Delete tasks by id. Fails only when none of the ids exist.
    pub fn delete_tasks(&self, ids: &[String]) -> Result<Vec<TaskSnapshot>, SessionError> {
        let mut store = lock(&self.store);
        let snapshots: Vec<TaskSnapshot> = ids
            .iter()
            .filter_map(|id| store.get_task(id).map(|t| store.snapshot_of(t)))
            .collect();
        if snapshots.is_empty()
            && let Some(first) = ids.first()
        {
            return Err(StoreError::TaskNotFound(first.clone()).into());
        }
        store.delete_tasks(ids);
        Ok(snapshots)
    }

    // Conversation

    pub fn history(&self, limit: usize) -> Vec<ChatMessage> {
        lock(&self.conversation).recent(limit).to_vec()
    }

    fn say(&self, id: Option<&str>, content: &str, plan: Option<ActionPlan>) -> ChatMessage {
        lock(&self.conversation).push_assistant(id, content, plan)
    }

    /// Handle one chat utterance.
    ///
    /// Classification never mutates the store. An action plan is registered
    /// as proposed and attached to the reply; the parse path inserts tasks
    /// right away, as pasting a list does.
    pub async fn chat(&self, text: &str) -> Result<ChatReply, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyInput("message"));
        }
        let _guard = self.begin()?;
        lock(&self.conversation).push_user(text);

        let message_id = Uuid::new_v4().to_string();
        let today = self.today();
        let (tasks, tags) = {
            let store = lock(&self.store);
            (store.task_snapshot(true), store.tag_snapshot())
        };
        let input = ClassifyInput {
            request: text,
            tasks: &tasks,
            tags: &tags,
            today,
            message_id: &message_id,
        };

        let analysis = flows::classify(self.generator.as_ref(), self.template("classify"), &input).await;
        let reply = match analysis {
            Ok(Analysis::Action(plan)) => {
                let expired = lock(&self.plans).propose(plan.clone());
                if !expired.is_empty() {
                    let mut conversation = lock(&self.conversation);
                    for id in &expired {
                        conversation.detach_plan(id);
                    }
                }
                info!(message_id = %message_id, operations = plan.operations.len(), "Plan proposed");
                ChatReply {
                    reply: self.say(Some(&message_id), &plan.confirmation_message, Some(plan.clone())),
                    outcome: ChatOutcome::Proposed { plan },
                }
            }
            Ok(Analysis::Parse { reasoning }) => {
                info!(message_id = %message_id, reasoning = %reasoning, "Routing to task list parser");
                let parsed = self.parse_and_insert(text, today).await;
                match parsed {
                    Ok(tasks) => ChatReply {
                        reply: self.say(Some(&message_id), &parsed_message(tasks.len()), None),
                        outcome: ChatOutcome::Parsed { tasks },
                    },
                    Err(_) => ChatReply {
                        reply: self.say(Some(&message_id), PARSE_FAILURE_MESSAGE, None),
                        outcome: ChatOutcome::ParseFailed,
                    },
                }
            }
            Ok(Analysis::Response { text_response }) => ChatReply {
                reply: self.say(Some(&message_id), &text_response, None),
                outcome: ChatOutcome::Response,
            },
            Err(e) => {
                warn!(message_id = %message_id, error = %e, "Classification failed");
                ChatReply {
                    reply: self.say(Some(&message_id), CLASSIFICATION_FAILURE_MESSAGE, None),
                    outcome: ChatOutcome::Failed,
                }
            }
        };
        Ok(reply)
    }

    /// Take a proposed plan out of the registry, moving it to `next`.
    /// Anything but a proposed plan is reported as not found.
    fn resolve(&self, message_id: &str, next: PlanState) -> Result<ActionPlan, SessionError> {
        lock(&self.plans)
            .resolve(message_id, next)
            .ok_or_else(|| SessionError::PlanNotFound(message_id.to_string()))
    }

    /// State of the plan bound to `message_id`, while it is still remembered.
    pub fn plan_state(&self, message_id: &str) -> Option<PlanState> {
        lock(&self.plans).state(message_id)
    }

    /// Number of proposed plans awaiting confirm or cancel.
    pub fn pending_plan_count(&self) -> usize {
        lock(&self.plans).pending_len()
    }

    /// Apply the plan the user confirmed.
    pub fn confirm(&self, message_id: &str) -> Result<ConfirmReply, SessionError> {
        let plan = self.resolve(message_id, PlanState::Confirmed)?;
        let result = execute(&mut lock(&self.store), &plan);

        lock(&self.conversation).detach_plan(message_id);
        Ok(ConfirmReply {
            reply: self.say(None, &result.summary(), None),
            result,
        })
    }

    /// Discard the plan. The store is not touched.
    pub fn cancel(&self, message_id: &str) -> Result<ChatMessage, SessionError> {
        self.resolve(message_id, PlanState::Cancelled)?;
        info!(message_id = %message_id, "Plan cancelled");
        lock(&self.conversation).detach_plan(message_id);
        Ok(self.say(None, CANCELLED_MESSAGE, None))
    }

    async fn parse_and_insert(&self, text: &str, today: NaiveDate) -> Result<Vec<TaskSnapshot>, SessionError> {
        let parsed: Vec<ParsedTask> =
            flows::parse_task_list(self.generator.as_ref(), self.template("parse"), text, today)
                .await
                .inspect_err(|e| warn!(error = %e, "Task list parse failed"))?;

        let mut store = lock(&self.store);
        let inputs: Vec<NewTask> = parsed
            .into_iter()
            .map(|p| NewTask {
                tags: store.find_or_create_tags(&p.tags),
                name: p.name,
                due_date: p.due_date,
                urgency: p.urgency,
                required_hours: p.required_hours,
            })
            .collect();
        let created = store.add_tasks(inputs)?;
        info!(count = created.len(), "Parsed tasks added");
        Ok(created.iter().map(|t| store.snapshot_of(t)).collect())
    }

    /// Parse pasted text into tasks and insert them all, or none.
    pub async fn parse_tasks(&self, text: &str) -> Result<ParseReply, SessionError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(SessionError::EmptyInput("text"));
        }
        let _guard = self.begin()?;
        lock(&self.conversation).push_user(text);

        let reply = match self.parse_and_insert(text, self.today()).await {
            Ok(tasks) => ParseReply {
                reply: self.say(None, &parsed_message(tasks.len()), None),
                tasks,
                success: true,
            },
            Err(_) => ParseReply {
                reply: self.say(None, PARSE_FAILURE_MESSAGE, None),
                tasks: Vec::new(),
                success: false,
            },
        };
        Ok(reply)
    }

    /// Organizational advice over the incomplete tasks.
    pub async fn advice(&self) -> Result<ChatMessage, SessionError> {
        let _guard = self.begin()?;
        lock(&self.conversation).push_user(ADVICE_REQUEST);
        let tasks = lock(&self.store).task_snapshot(false);

        let text = flows::advise(self.generator.as_ref(), self.template("advice"), &tasks, self.today())
            .await
            .unwrap_or_else(|e| {
                warn!(error = %e, category = e.category(), "Advice generation failed");
                ADVICE_FAILURE_MESSAGE.to_string()
            });
        Ok(self.say(None, &text, None))
    }

    /// Panic-mode triage over the incomplete tasks.
    pub async fn panic(&self) -> Result<TriageReport, SessionError> {
        let _guard = self.begin()?;
        let tasks = lock(&self.store).task_snapshot(false);
        Ok(flows::triage(self.generator.as_ref(), self.template("triage"), &tasks, self.today()).await)
    }
}

fn parsed_message(count: usize) -> String {
    format!("Successfully parsed and added {} tasks to your list!", count)
}
