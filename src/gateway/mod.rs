//! Text-generation gateway.
//!
//! The narrow boundary to the external capability that turns a prompt into
//! free text or schema-conforming JSON. Flows depend only on the
//! [`TextGenerator`] trait; the HTTP backend lives in [`openai`].

pub mod openai;
pub mod schema;

pub use openai::OpenAiGateway;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Errors surfaced by a generation call. None of them are retried.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// No backend is configured.
    #[error("text generation is not configured")]
    Unavailable,

    /// The request did not complete in time.
    #[error("generation timed out after {0}s")]
    Timeout(u64),

    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with an error status.
    #[error("upstream error ({status}): {message}")]
    Upstream { status: u16, message: String },

    /// The backend answered, but not with usable content.
    #[error("malformed output: {0}")]
    Malformed(String),

    /// The output parsed but violates the requested schema.
    #[error("output does not match schema at {path}: {reason}")]
    SchemaViolation { path: String, reason: String },
}

impl GenerationError {
    /// Short category label for logs.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::Timeout(_) => "timeout",
            Self::Http(_) => "network",
            Self::Upstream { .. } => "upstream",
            Self::Malformed(_) | Self::SchemaViolation { .. } => "malformed",
        }
    }
}

/// Shape the caller expects back.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputShape {
    /// Free text (markdown allowed).
    Text,
    /// A JSON value that must validate against the given schema.
    Json(Value),
}

/// One generation call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Flow name, used for logging and by test doubles.
    pub flow: &'static str,
    /// Fully rendered prompt.
    pub prompt: String,
    pub output: OutputShape,
}

impl GenerationRequest {
    pub fn text(flow: &'static str, prompt: impl Into<String>) -> Self {
        Self {
            flow,
            prompt: prompt.into(),
            output: OutputShape::Text,
        }
    }

    pub fn json(flow: &'static str, prompt: impl Into<String>, schema: Value) -> Self {
        Self {
            flow,
            prompt: prompt.into(),
            output: OutputShape::Json(schema),
        }
    }
}

/// Successful generation output.
#[derive(Debug, Clone, PartialEq)]
pub enum Generated {
    Structured(Value),
    Text(String),
}

impl Generated {
    /// Take the structured value, failing on text output.
    pub fn into_json(self) -> Result<Value, GenerationError> {
        match self {
            Generated::Structured(value) => Ok(value),
            Generated::Text(_) => Err(GenerationError::Malformed(
                "expected structured output, got text".to_string(),
            )),
        }
    }

    /// Take the text, failing on structured output.
    pub fn into_text(self) -> Result<String, GenerationError> {
        match self {
            Generated::Text(text) => Ok(text),
            Generated::Structured(_) => Err(GenerationError::Malformed(
                "expected text output, got structured value".to_string(),
            )),
        }
    }
}

/// An external text/JSON generation capability.
///
/// Implementations must validate structured output against the requested
/// schema before returning `Ok`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Backend name for logs.
    fn name(&self) -> &str;

    async fn generate(&self, request: GenerationRequest) -> Result<Generated, GenerationError>;
}

/// Gateway used when no backend is configured. Every call fails, which keeps
/// all fallback paths live.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGateway;

#[async_trait]
impl TextGenerator for DisabledGateway {
    fn name(&self) -> &str {
        "disabled"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<Generated, GenerationError> {
        tracing::debug!(flow = request.flow, "Generation requested but gateway is disabled");
        Err(GenerationError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn disabled_gateway_always_fails() {
        let err = DisabledGateway
            .generate(GenerationRequest::text("advice", "hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, GenerationError::Unavailable));
        assert_eq!(err.category(), "unavailable");
    }

    #[test]
    fn generated_accessors_check_shape() {
        assert_eq!(
            Generated::Structured(json!({"a": 1})).into_json().unwrap(),
            json!({"a": 1})
        );
        assert!(Generated::Text("x".into()).into_json().is_err());
        assert_eq!(Generated::Text("x".into()).into_text().unwrap(), "x");
        assert!(Generated::Structured(json!(1)).into_text().is_err());
    }
}
