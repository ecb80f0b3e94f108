//! OpenAI-compatible chat-completions backend.
//!
//! Sends one non-streaming `POST {base_url}/chat/completions` per call. JSON
//! shapes use `response_format: json_object` and the schema is spelled out
//! in a system message; the reply is validated locally before it is handed
//! back.

use super::schema::validate;
use super::{GenerationError, GenerationRequest, Generated, OutputShape, TextGenerator};
use async_trait::async_trait;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Connection settings for [`OpenAiGateway`].
#[derive(Debug, Clone)]
pub struct OpenAiSettings {
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

const TEXT_SYSTEM_PROMPT: &str =
    "You are TaskZen, a concise and friendly task-management assistant.";

/// Strip a surrounding markdown code fence, if any.
pub fn strip_code_fence(raw: &str) -> &str {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = FENCE.get_or_init(|| Regex::new(r"(?s)^\s*```[a-zA-Z]*\s*\n?(.*?)\s*```\s*$").ok());
    match re
        .as_ref()
        .and_then(|re| re.captures(raw))
        .and_then(|c| c.get(1))
    {
        Some(inner) => inner.as_str(),
        None => raw.trim(),
    }
}

/// Chat-completions client.
pub struct OpenAiGateway {
    client: reqwest::Client,
    settings: OpenAiSettings,
}

impl OpenAiGateway {
    pub fn new(settings: OpenAiSettings) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;
        Ok(Self { client, settings })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    fn map_send_error(&self, err: reqwest::Error) -> GenerationError {
        if err.is_timeout() {
            GenerationError::Timeout(self.settings.timeout_secs)
        } else if err.is_decode() {
            GenerationError::Malformed(format!("undecodable response body: {}", err))
        } else {
            GenerationError::Http(err)
        }
    }
}

#[async_trait]
impl TextGenerator for OpenAiGateway {
    fn name(&self) -> &str {
        &self.settings.model
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Generated, GenerationError> {
        let start = Instant::now();

        let schema_prompt;
        let (system, response_format) = match &request.output {
            OutputShape::Text => (TEXT_SYSTEM_PROMPT, None),
            OutputShape::Json(schema) => {
                schema_prompt = format!(
                    "{}\nRespond with a single JSON value and nothing else. \
                     It must conform to this JSON Schema:\n{}",
                    TEXT_SYSTEM_PROMPT,
                    serde_json::to_string_pretty(schema).unwrap_or_default()
                );
                (
                    schema_prompt.as_str(),
                    Some(json!({ "type": "json_object" })),
                )
            }
        };

        let body = ChatRequest {
            model: &self.settings.model,
            temperature: self.settings.temperature,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            response_format,
        };

        let mut http = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.settings.api_key {
            http = http.bearer_auth(key);
        }

        let response = http.send().await.map_err(|e| self.map_send_error(e))?;
        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            warn!(flow = request.flow, status = status.as_u16(), "Generation request rejected");
            return Err(GenerationError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response.json().await.map_err(|e| self.map_send_error(e))?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| GenerationError::Malformed("response had no content".to_string()))?;

        debug!(
            flow = request.flow,
            duration_ms = start.elapsed().as_millis() as u64,
            "Generation completed"
        );

        match request.output {
            OutputShape::Text => Ok(Generated::Text(content)),
            OutputShape::Json(schema) => {
                let value: Value = serde_json::from_str(strip_code_fence(&content))
                    .map_err(|e| GenerationError::Malformed(format!("invalid JSON: {}", e)))?;
                validate(&schema, &value).map_err(|v| GenerationError::SchemaViolation {
                    path: v.path,
                    reason: v.reason,
                })?;
                Ok(Generated::Structured(value))
            }
        }
    }
}
