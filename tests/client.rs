use axum::body::{Body, Bytes};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use codechat::client::{ClientError, Conversation, ConversationClient, SubmitOutcome};
use codechat::conversation::{ModelChoice, Role, Turn};
use codechat::provider::stub::StubProvider;
use codechat::relay::{build_router, AppState, Providers};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_stream::wrappers::ReceiverStream;

async fn serve(router: axum::Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}/")
}

async fn relay_with(model: ModelChoice, stub: &StubProvider) -> String {
    let providers = Providers::new().with(model, Arc::new(stub.clone()));
    serve(build_router(AppState::new(providers))).await
}

/// Serve a fixed `/api/chat` response.
async fn canned(status: StatusCode, content_type: &'static str, body: &'static str) -> String {
    let router = axum::Router::new().route(
        "/api/chat",
        post(move || async move { (status, [("content-type", content_type)], body).into_response() }),
    );
    serve(router).await
}

fn client(url: &str, model: ModelChoice) -> ConversationClient {
    let http = reqwest::Client::builder().no_proxy().build().unwrap();
    ConversationClient::new(http, url, model).unwrap()
}

async fn wait_for(client: &ConversationClient, pred: impl Fn(&Conversation) -> bool) {
    let mut rx = client.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            if pred(&client.snapshot()) {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    })
    .await
    .expect("condition not reached in time");
}

fn transcript(c: &Conversation) -> Vec<(Role, String)> {
    c.messages().iter().map(|m| (m.role, m.content.clone())).collect()
}

#[tokio::test]
async fn fragments_accumulate_in_order() {
    let stub = StubProvider::new(["Hello", " world"]);
    let url = relay_with(ModelChoice::ChatGpt, &stub).await;
    let c = client(&url, ModelChoice::ChatGpt);

    let outcome = c.submit("greet me").await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Completed { .. }));

    let snap = c.snapshot();
    assert_eq!(
        transcript(&snap),
        vec![
            (Role::User, "greet me".to_string()),
            (Role::Assistant, "Hello world".to_string()),
        ]
    );
    assert!(!snap.is_in_flight());
    assert_eq!(snap.streaming_target(), None);
    assert_eq!(snap.error(), None);
}

#[tokio::test]
async fn many_fragments_concatenate_verbatim() {
    let pieces: Vec<String> = (0..50).map(|i| format!("[{i}] ünï \n")).collect();
    let expected = pieces.concat();
    let stub = StubProvider::new(pieces);
    let url = relay_with(ModelChoice::ChatGpt, &stub).await;
    let c = client(&url, ModelChoice::ChatGpt);

    c.submit("count").await.unwrap();
    assert_eq!(c.snapshot().messages()[1].content, expected);
}

#[tokio::test]
async fn second_turn_sends_prior_history() {
    let stub = StubProvider::new(["answer"]);
    let url = relay_with(ModelChoice::Gemini, &stub).await;
    let c = client(&url, ModelChoice::Gemini);

    c.submit("first").await.unwrap();
    c.submit("second").await.unwrap();

    let seen = stub.requests();
    assert_eq!(seen.len(), 2);
    assert!(seen[0].history.is_empty());
    assert_eq!(seen[1].message, "second");
    assert_eq!(
        seen[1].history,
        vec![Turn::new(Role::User, "first"), Turn::new(Role::Assistant, "answer")]
    );
}

#[tokio::test]
async fn blank_question_sends_nothing() {
    let stub = StubProvider::new(["never"]);
    let url = relay_with(ModelChoice::ChatGpt, &stub).await;
    let c = client(&url, ModelChoice::ChatGpt);

    assert_eq!(c.submit("  \n ").await.unwrap(), SubmitOutcome::Rejected);
    assert!(stub.requests().is_empty());
    assert!(c.snapshot().messages().is_empty());
}

#[tokio::test]
async fn relay_error_becomes_transcript_message() {
    // Relay without any provider configured.
    let url = serve(build_router(AppState::new(Providers::new()))).await;
    let c = client(&url, ModelChoice::Gemini);

    let err = c.submit("q").await.unwrap_err();
    match &err {
        ClientError::Status { status, message } => {
            assert_eq!(*status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(message, "Google API key is not configured");
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let snap = c.snapshot();
    let t = transcript(&snap);
    // No empty streaming placeholder, only the synthetic error.
    assert_eq!(t.len(), 2);
    assert_eq!(t[1].0, Role::Assistant);
    assert_eq!(
        t[1].1,
        "Error: API key is invalid or missing. Please check your configuration."
    );
    assert!(snap.error().is_some());
    assert!(!snap.is_in_flight());
}

#[tokio::test]
async fn undecodable_error_body_falls_back() {
    let url = canned(StatusCode::BAD_GATEWAY, "text/plain", "upstream down").await;
    let c = client(&url, ModelChoice::ChatGpt);

    let err = c.submit("q").await.unwrap_err();
    assert_eq!(err.to_string(), "Failed to get response");
    assert_eq!(c.snapshot().messages()[1].content, "Error: Failed to get response");
}

#[tokio::test]
async fn malformed_fragment_is_skipped() {
    let url = canned(
        StatusCode::OK,
        "text/event-stream",
        "data: {not-json}\n\ndata: {\"content\":\"ok\"}\n\ndata: [DONE]\n\n",
    )
    .await;
    let c = client(&url, ModelChoice::ChatGpt);

    let outcome = c.submit("q").await.unwrap();
    assert!(matches!(outcome, SubmitOutcome::Completed { .. }));
    assert_eq!(c.snapshot().messages()[1].content, "ok");
}

#[tokio::test]
async fn nothing_after_the_sentinel_is_applied() {
    let url = canned(
        StatusCode::OK,
        "text/event-stream",
        "data: {\"content\":\"kept\"}\n\ndata: [DONE]\n\ndata: {\"content\":\" ignored\"}\n\n",
    )
    .await;
    let c = client(&url, ModelChoice::ChatGpt);

    c.submit("q").await.unwrap();
    assert_eq!(c.snapshot().messages()[1].content, "kept");
}

#[tokio::test]
async fn interrupted_stream_keeps_partial_answer_and_reports() {
    let stub = StubProvider::new(["partial", "lost"]).failing_after(1, "rate limit reached");
    let url = relay_with(ModelChoice::ChatGpt, &stub).await;
    let c = client(&url, ModelChoice::ChatGpt);

    let err = c.submit("q").await.unwrap_err();
    assert!(matches!(err, ClientError::Interrupted(_)));

    let t = transcript(&c.snapshot());
    assert_eq!(t.len(), 3);
    assert_eq!(t[1], (Role::Assistant, "partial".to_string()));
    assert_eq!(
        t[2].1,
        "Error: Too many requests. Please wait a moment and try again."
    );
}

#[tokio::test]
async fn only_one_turn_in_flight() {
    let stub = StubProvider::new(["a"]).holding_open();
    let url = relay_with(ModelChoice::ChatGpt, &stub).await;
    let c = client(&url, ModelChoice::ChatGpt);

    let running = tokio::spawn({
        let c = c.clone();
        async move { c.submit("first").await }
    });
    wait_for(&c, |s| s.messages().len() == 2 && s.messages()[1].content == "a").await;

    assert_eq!(c.submit("second").await.unwrap(), SubmitOutcome::Rejected);
    assert_eq!(stub.requests().len(), 1);

    assert!(c.cancel());
    assert_eq!(running.await.unwrap().unwrap(), SubmitOutcome::Cancelled);

    let snap = c.snapshot();
    assert!(!snap.is_in_flight());
    assert_eq!(
        transcript(&snap),
        vec![(Role::User, "first".to_string()), (Role::Assistant, "a".to_string())]
    );
}

#[tokio::test]
async fn switching_model_mid_stream_cancels_and_clears() {
    let stub = StubProvider::new(["a"]).holding_open();
    let url = relay_with(ModelChoice::ChatGpt, &stub).await;
    let c = client(&url, ModelChoice::ChatGpt);

    let running = tokio::spawn({
        let c = c.clone();
        async move { c.submit("first").await }
    });
    wait_for(&c, |s| s.streaming_target().is_some() && s.messages()[1].content == "a").await;

    c.switch_model(ModelChoice::Gemini);
    assert_eq!(running.await.unwrap().unwrap(), SubmitOutcome::Cancelled);

    let snap = c.snapshot();
    assert!(snap.messages().is_empty());
    assert_eq!(snap.model(), ModelChoice::Gemini);
    assert!(!snap.is_in_flight());
}

#[tokio::test]
async fn switch_model_empties_finished_history() {
    let stub = StubProvider::new(["done"]);
    let url = relay_with(ModelChoice::ChatGpt, &stub).await;
    let c = client(&url, ModelChoice::ChatGpt);

    c.submit("q").await.unwrap();
    assert_eq!(c.snapshot().messages().len(), 2);

    c.switch_model(ModelChoice::ChatGpt);
    assert!(c.snapshot().messages().is_empty());
}

/// Answer 500 at once but hold the JSON error body back for `delay`.
async fn slow_error(delay: Duration) -> String {
    let router = axum::Router::new().route(
        "/api/chat",
        post(move || async move {
            let (tx, rx) = tokio::sync::mpsc::channel::<Result<Bytes, Infallible>>(1);
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                let body = Bytes::from_static(br#"{"error":"OpenAI API key is not configured"}"#);
                let _ = tx.send(Ok(body)).await;
            });
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "application/json")],
                Body::from_stream(ReceiverStream::new(rx)),
            )
                .into_response()
        }),
    );
    serve(router).await
}

#[tokio::test]
async fn failure_of_old_turn_stays_out_of_new_model_history() {
    let url = slow_error(Duration::from_millis(600)).await;
    let c = client(&url, ModelChoice::ChatGpt);

    let running = tokio::spawn({
        let c = c.clone();
        async move { c.submit("q").await }
    });
    tokio::time::sleep(Duration::from_millis(200)).await;

    c.switch_model(ModelChoice::Gemini);
    assert_eq!(running.await.unwrap().unwrap(), SubmitOutcome::Cancelled);

    let snap = c.snapshot();
    assert_eq!(snap.model(), ModelChoice::Gemini);
    assert!(transcript(&snap).is_empty(), "{:?}", transcript(&snap));
    assert_eq!(snap.error(), None);
    assert!(!snap.is_in_flight());
}

#[tokio::test]
async fn error_body_still_recorded_without_a_switch() {
    let url = slow_error(Duration::from_millis(50)).await;
    let c = client(&url, ModelChoice::ChatGpt);

    let err = c.submit("q").await.unwrap_err();
    assert!(matches!(err, ClientError::Status { .. }));
    let snap = c.snapshot();
    assert_eq!(snap.messages().len(), 2);
    assert!(snap.error().is_some());
}
