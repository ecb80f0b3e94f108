//! Shared test doubles for the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use taskzen::config::Prompts;
use taskzen::gateway::{Generated, GenerationError, GenerationRequest, TextGenerator};
use taskzen::session::Session;
use taskzen::store::TaskStore;
use tokio::sync::Notify;

/// Replays canned results in order and records every request.
#[derive(Default)]
pub struct ScriptedGenerator {
    replies: Mutex<VecDeque<Result<Generated, GenerationError>>>,
    calls: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_json(&self, value: Value) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(Generated::Structured(value)));
        self
    }

    pub fn push_text(&self, text: &str) -> &Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(Ok(Generated::Text(text.to_string())));
        self
    }

    pub fn push_error(&self, err: GenerationError) -> &Self {
        self.replies.lock().unwrap().push_back(Err(err));
        self
    }

    pub fn calls(&self) -> Vec<GenerationRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn flows(&self) -> Vec<&'static str> {
        self.calls().iter().map(|c| c.flow).collect()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Generated, GenerationError> {
        self.calls.lock().unwrap().push(request);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GenerationError::Unavailable))
    }
}

/// Blocks every call until released, then fails. Signals when a call starts.
#[derive(Default)]
pub struct GatedGenerator {
    pub started: Notify,
    pub release: Notify,
}

#[async_trait]
impl TextGenerator for GatedGenerator {
    fn name(&self) -> &str {
        "gated"
    }

    async fn generate(&self, _request: GenerationRequest) -> Result<Generated, GenerationError> {
        self.started.notify_one();
        self.release.notified().await;
        Err(GenerationError::Unavailable)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn today() -> NaiveDate {
    date(2024, 8, 6)
}

pub fn session_with(store: TaskStore, generator: Arc<dyn TextGenerator>) -> Session {
    Session::new(store, generator, Prompts::default()).with_today(today())
}
