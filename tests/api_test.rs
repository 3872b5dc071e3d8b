use fitcoach_lib::api::{
    CompletionMessage, CompletionRequest, CompletionService, OpenAICompatibleProvider,
};
use fitcoach_lib::error::ServiceError;
use fitcoach_lib::models::ChatRole;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn request(stream: bool) -> CompletionRequest {
    CompletionRequest {
        messages: vec![
            CompletionMessage::new(ChatRole::System, "You are a coach."),
            CompletionMessage::new(ChatRole::User, "hello"),
        ],
        temperature: 0.7,
        max_tokens: 2000,
        stream,
    }
}

fn provider(server: &MockServer) -> OpenAICompatibleProvider {
    OpenAICompatibleProvider::new(server.uri(), "test-key", "llama-test")
}

#[tokio::test]
async fn json_reply_is_returned() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(header("authorization", "Bearer test-key"))
        .and(body_partial_json(json!({
            "model": "llama-test",
            "stream": false,
            "max_tokens": 2000,
            "top_p": 1.0
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "chatcmpl-1",
            "choices": [{"index": 0, "message": {"role": "assistant", "content": "Hi there!"}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let reply = provider(&server).complete(&request(false)).await.unwrap();
    assert_eq!(reply, "Hi there!");
}

#[tokio::test]
async fn streamed_deltas_are_concatenated() {
    let server = MockServer::start().await;
    let body = [
        r#"data: {"choices":[{"index":0,"delta":{"role":"assistant"}}]}"#,
        r#"data: {"choices":[{"index":0,"delta":{"content":"Keep "}}]}"#,
        r#"data: {"choices":[{"index":0,"delta":{"content":"going!"}}]}"#,
        "data: [DONE]",
    ]
    .map(|line| format!("{line}\n\n"))
    .concat();
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
        .mount(&server)
        .await;

    let reply = provider(&server).complete(&request(true)).await.unwrap();
    assert_eq!(reply, "Keep going!");
}

#[tokio::test]
async fn error_status_is_reported_with_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model overloaded"))
        .mount(&server)
        .await;

    let err = provider(&server).complete(&request(true)).await.unwrap_err();
    match err {
        ServiceError::Status { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "model overloaded");
        }
        other => panic!("expected a status error, got {other:?}"),
    }
}

#[tokio::test]
async fn reply_without_choices_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"choices": []})))
        .mount(&server)
        .await;

    let err = provider(&server).complete(&request(false)).await.unwrap_err();
    assert!(matches!(err, ServiceError::Decode(_)));
}

#[tokio::test]
async fn unreachable_service_is_a_transport_error() {
    // Nothing listens on port 1
    let provider = OpenAICompatibleProvider::new("http://127.0.0.1:1", "test-key", "llama-test");
    let err = provider.complete(&request(false)).await.unwrap_err();
    assert!(matches!(err, ServiceError::Transport(_)));
}
