use super::stream::relay_frames;
use super::{AppState, RelayError};
use crate::conversation::{ModelChoice, Turn};
use crate::provider::{ChatRequest, SharedProvider};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::CONNECTION;
use axum::http::HeaderValue;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::StreamExt;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub conversation_history: Vec<Turn>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimpleResponse {
    pub response: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub id: ModelChoice,
    pub configured: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsResponse {
    pub default: ModelChoice,
    pub models: Vec<ModelInfo>,
}

fn parse_body<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, RelayError> {
    serde_json::from_slice(body).map_err(|e| RelayError::InvalidBody(e.to_string()))
}

fn required_message(message: Option<String>) -> Result<String, RelayError> {
    match message {
        Some(m) if !m.trim().is_empty() => Ok(m),
        _ => Err(RelayError::MissingMessage),
    }
}

fn resolve_model(state: &AppState, requested: Option<&str>) -> Result<ModelChoice, RelayError> {
    match requested {
        None => Ok(state.default_model),
        Some(m) => m.parse().map_err(|_| RelayError::UnknownModel(m.to_string())),
    }
}

fn provider_for(state: &AppState, model: ModelChoice) -> Result<SharedProvider, RelayError> {
    state
        .providers
        .get(model)
        .cloned()
        .ok_or(RelayError::NotConfigured(model))
}

/// `POST /api/chat`: relay one turn as a server-sent event stream.
pub async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Response, RelayError> {
    let body: ChatBody = parse_body(&body)?;
    let message = required_message(body.message)?;
    let model = resolve_model(&state, body.model.as_deref())?;
    let provider = provider_for(&state, model)?;

    tracing::info!(
        %model,
        provider = provider.name(),
        history = body.conversation_history.len(),
        "relaying chat turn"
    );

    let req = ChatRequest::new(message).with_history(body.conversation_history);
    let upstream = provider.stream_chat(req).await.map_err(RelayError::Upstream)?;

    let events = relay_frames(upstream).map(|frame| Ok::<_, Infallible>(Event::default().data(frame.data())));

    let mut response = Sse::new(events).into_response();
    response
        .headers_mut()
        .insert(CONNECTION, HeaderValue::from_static("keep-alive"));
    Ok(response)
}

/// `POST /api/chat/simple`: single-shot answer from the default model.
pub async fn chat_simple(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SimpleResponse>, RelayError> {
    let body: SimpleBody = parse_body(&body)?;
    let message = required_message(body.message)?;
    let model = state.default_model;
    let provider = provider_for(&state, model)?;

    tracing::info!(%model, provider = provider.name(), "answering simple chat");

    let response = provider
        .complete(ChatRequest::new(message))
        .await
        .map_err(RelayError::Upstream)?;
    Ok(Json(SimpleResponse { response }))
}

/// `GET /api/models`
pub async fn models(State(state): State<AppState>) -> Json<ModelsResponse> {
    let models = ModelChoice::ALL
        .into_iter()
        .map(|id| ModelInfo {
            id,
            configured: state.providers.is_configured(id),
        })
        .collect();
    Json(ModelsResponse {
        default: state.default_model,
        models,
    })
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    "ok"
}
