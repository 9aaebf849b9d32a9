use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use codechat::conversation::{ModelChoice, Role, Turn};
use codechat::provider::stub::StubProvider;
use codechat::relay::{build_router, AppState, ErrorBody, ModelsResponse, Providers, SimpleResponse};
use std::sync::Arc;
use tower::ServiceExt;

fn app(providers: Providers) -> axum::Router {
    build_router(AppState::new(providers))
}

fn chatgpt(stub: &StubProvider) -> Providers {
    Providers::new().with(ModelChoice::ChatGpt, Arc::new(stub.clone()))
}

/// Send a request to the app and return (status, headers, body text).
async fn send(app: axum::Router, method: &str, uri: &str, body: &str) -> (StatusCode, HeaderMap, String) {
    let req = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8_lossy(&body).into_owned())
}

fn error_of(body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body).unwrap().error
}

#[tokio::test]
async fn streams_answer_as_events() {
    let stub = StubProvider::new(["A closure ", "captures its environment."]);
    let (status, headers, body) = send(
        app(chatgpt(&stub)),
        "POST",
        "/api/chat",
        r#"{"message":"What is a closure?","model":"chatgpt","conversationHistory":[]}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "text/event-stream");
    assert_eq!(headers["cache-control"], "no-cache");
    assert_eq!(headers["connection"], "keep-alive");
    assert_eq!(
        body,
        "data: {\"content\":\"A closure \"}\n\n\
         data: {\"content\":\"captures its environment.\"}\n\n\
         data: [DONE]\n\n"
    );
}

#[tokio::test]
async fn sentinel_is_sent_once_and_last() {
    let stub = StubProvider::new(["x"; 25]);
    let (_, _, body) = send(app(chatgpt(&stub)), "POST", "/api/chat", r#"{"message":"q"}"#).await;
    assert_eq!(body.matches("[DONE]").count(), 1);
    assert!(body.ends_with("data: [DONE]\n\n"));
    assert_eq!(body.matches("{\"content\":\"x\"}").count(), 25);
}

#[tokio::test]
async fn forwards_history_and_message() {
    let stub = StubProvider::new(["ok"]);
    let body = r#"{"message":"and now?","model":"chatgpt","conversationHistory":[
        {"role":"user","content":"hi"},{"role":"assistant","content":"hello"}]}"#;
    let (status, _, _) = send(app(chatgpt(&stub)), "POST", "/api/chat", body).await;
    assert_eq!(status, StatusCode::OK);

    let seen = stub.requests();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].message, "and now?");
    assert_eq!(
        seen[0].history,
        vec![Turn::new(Role::User, "hi"), Turn::new(Role::Assistant, "hello")]
    );
}

#[tokio::test]
async fn blank_message_is_rejected() {
    for body in [r#"{"message":"   ","model":"chatgpt"}"#, r#"{"model":"chatgpt"}"#, r#"{"message":""}"#] {
        let stub = StubProvider::new(["never"]);
        let (status, _, text) = send(app(chatgpt(&stub)), "POST", "/api/chat", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {body}");
        assert_eq!(error_of(&text), "Message is required");
        assert!(stub.requests().is_empty());
    }
}

#[tokio::test]
async fn unknown_model_is_rejected() {
    let stub = StubProvider::new(["never"]);
    let (status, _, text) = send(
        app(chatgpt(&stub)),
        "POST",
        "/api/chat",
        r#"{"message":"q","model":"llama"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_of(&text).contains("Invalid model specified"));
}

#[tokio::test]
async fn malformed_history_is_rejected() {
    let stub = StubProvider::new(["never"]);
    let (status, _, text) = send(
        app(chatgpt(&stub)),
        "POST",
        "/api/chat",
        r#"{"message":"q","conversationHistory":[{"role":"user"}]}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(error_of(&text).starts_with("Invalid request body"));
    assert!(stub.requests().is_empty());
}

#[tokio::test]
async fn unconfigured_provider_answers_json_error() {
    let stub = StubProvider::new(["never"]);
    let (status, headers, text) = send(
        app(chatgpt(&stub)),
        "POST",
        "/api/chat",
        r#"{"message":"q","model":"gemini","conversationHistory":[]}"#,
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(headers["content-type"], "application/json");
    assert_eq!(error_of(&text), "Google API key is not configured");
    assert!(!text.contains("data:"));
}

#[tokio::test]
async fn upstream_failure_before_stream_is_500() {
    let stub = StubProvider::new(["never"]).failing_before_stream("You exceeded your current quota");
    let (status, _, text) = send(app(chatgpt(&stub)), "POST", "/api/chat", r#"{"message":"q"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_of(&text), "You exceeded your current quota");
}

#[tokio::test]
async fn mid_stream_failure_emits_error_frame_then_done() {
    let stub = StubProvider::new(["partial ", "lost"]).failing_after(1, "connection reset");
    let (status, _, body) = send(app(chatgpt(&stub)), "POST", "/api/chat", r#"{"message":"q"}"#).await;
    assert_eq!(status, StatusCode::OK);

    let frames: Vec<&str> = body.split("\n\n").filter(|s| !s.is_empty()).collect();
    assert_eq!(frames.len(), 3, "body: {body}");
    assert_eq!(frames[0], "data: {\"content\":\"partial \"}");
    assert!(frames[1].starts_with("data: {\"error\":"));
    assert!(frames[1].contains("connection reset"));
    assert_eq!(frames[2], "data: [DONE]");
}

#[tokio::test]
async fn default_model_is_used_when_absent() {
    let stub = StubProvider::new(["from gemini"]);
    let providers = Providers::new().with(ModelChoice::Gemini, Arc::new(stub.clone()));
    let router = build_router(AppState::new(providers).with_default_model(ModelChoice::Gemini));
    let (status, _, body) = send(router, "POST", "/api/chat", r#"{"message":"q"}"#).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("from gemini"));
}

#[tokio::test]
async fn simple_variant_returns_whole_answer() {
    let stub = StubProvider::new(["Hello", " world"]);
    let (status, _, text) = send(app(chatgpt(&stub)), "POST", "/api/chat/simple", r#"{"message":"hi"}"#).await;
    assert_eq!(status, StatusCode::OK);
    let body: SimpleResponse = serde_json::from_str(&text).unwrap();
    assert_eq!(body.response, "Hello world");
}

#[tokio::test]
async fn simple_variant_reports_failures() {
    let stub = StubProvider::new(["x"]).failing_before_stream("upstream exploded");
    let (status, _, text) = send(app(chatgpt(&stub)), "POST", "/api/chat/simple", r#"{"message":"hi"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(error_of(&text), "upstream exploded");

    let (status, _, _) = send(app(Providers::new()), "POST", "/api/chat/simple", r#"{"message":"hi"}"#).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn models_lists_configuration() {
    let stub = StubProvider::new(["x"]);
    let (status, _, text) = send(app(chatgpt(&stub)), "GET", "/api/models", "").await;
    assert_eq!(status, StatusCode::OK);
    let models: ModelsResponse = serde_json::from_str(&text).unwrap();
    assert_eq!(models.default, ModelChoice::ChatGpt);
    assert_eq!(models.models.len(), 2);
    assert!(models.models.iter().any(|m| m.id == ModelChoice::ChatGpt && m.configured));
    assert!(models.models.iter().any(|m| m.id == ModelChoice::Gemini && !m.configured));
}

#[tokio::test]
async fn health_is_ok() {
    let (status, _, text) = send(app(Providers::new()), "GET", "/health", "").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(text, "ok");
}
