//! Integration tests for the OpenAI-compatible gateway against a mock HTTP
//! server.

use serde_json::json;
use std::time::Duration;
use taskzen::flows::parser::task_list_schema;
use taskzen::gateway::openai::OpenAiSettings;
use taskzen::gateway::{Generated, GenerationError, GenerationRequest, OpenAiGateway, TextGenerator};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn gateway(server: &MockServer) -> OpenAiGateway {
    OpenAiGateway::new(OpenAiSettings {
        base_url: format!("{}/v1", server.uri()),
        model: "test-model".into(),
        api_key: Some("sk-test".into()),
        timeout_secs: 5,
        temperature: 0.0,
    })
    .unwrap()
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "choices": [{ "message": { "role": "assistant", "content": content } }]
    }))
}

fn parse_request() -> GenerationRequest {
    GenerationRequest::json("parse", "Design mockups due 2024-12-25", task_list_schema())
}

#[tokio::test]
async fn structured_reply_is_validated_and_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_partial_json(json!({
            "model": "test-model",
            "response_format": { "type": "json_object" }
        })))
        .respond_with(completion(r#"{"tasks":[{"name":"Design mockups","dueDate":"2024-12-25"}]}"#))
        .expect(1)
        .mount(&server)
        .await;

    let out = gateway(&server).generate(parse_request()).await.unwrap();
    let Generated::Structured(value) = out else {
        panic!("expected structured output");
    };
    assert_eq!(value["tasks"][0]["name"], "Design mockups");
}

#[tokio::test]
async fn fenced_json_is_unwrapped() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion(
            "```json\n{\"tasks\":[{\"name\":\"A\",\"dueDate\":\"2024-09-01\"}]}\n```",
        ))
        .mount(&server)
        .await;

    let value = gateway(&server)
        .generate(parse_request())
        .await
        .unwrap()
        .into_json()
        .unwrap();
    assert_eq!(value["tasks"][0]["dueDate"], "2024-09-01");
}

#[tokio::test]
async fn schema_violation_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion(r#"{"tasks":[{"name":"No due date"}]}"#))
        .mount(&server)
        .await;

    let err = gateway(&server).generate(parse_request()).await.unwrap_err();
    assert!(matches!(err, GenerationError::SchemaViolation { .. }), "got {:?}", err);
}

#[tokio::test]
async fn invalid_json_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion("Sure! Here are your tasks: ..."))
        .mount(&server)
        .await;

    let err = gateway(&server).generate(parse_request()).await.unwrap_err();
    assert!(matches!(err, GenerationError::Malformed(_)), "got {:?}", err);
}

#[tokio::test]
async fn error_status_maps_to_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let err = gateway(&server).generate(parse_request()).await.unwrap_err();
    match err {
        GenerationError::Upstream { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "overloaded");
        }
        other => panic!("expected upstream error, got {:?}", other),
    }
}

#[tokio::test]
async fn empty_choices_are_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "choices": [] })))
        .mount(&server)
        .await;

    let err = gateway(&server)
        .generate(GenerationRequest::text("advice", "help"))
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Malformed(_)));
}

#[tokio::test]
async fn text_mode_returns_content_as_is() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion("## Focus\nStart with the report."))
        .mount(&server)
        .await;

    let text = gateway(&server)
        .generate(GenerationRequest::text("advice", "help"))
        .await
        .unwrap()
        .into_text()
        .unwrap();
    assert_eq!(text, "## Focus\nStart with the report.");
}

#[tokio::test]
async fn undecodable_body_is_malformed() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway error</html>"))
        .mount(&server)
        .await;

    let err = gateway(&server)
        .generate(GenerationRequest::text("advice", "help"))
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Malformed(_)), "got {:?}", err);
    assert_eq!(err.category(), "malformed");
}

#[tokio::test]
async fn slow_backend_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion("too late").set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let gateway = OpenAiGateway::new(OpenAiSettings {
        base_url: format!("{}/v1", server.uri()),
        model: "test-model".into(),
        api_key: None,
        timeout_secs: 1,
        temperature: 0.0,
    })
    .unwrap();

    let err = gateway
        .generate(GenerationRequest::text("advice", "help"))
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Timeout(1)), "got {:?}", err);
    assert_eq!(err.category(), "timeout");
}
