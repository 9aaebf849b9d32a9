//! HTTP relay between chat clients and the upstream model providers.

mod error;
mod handlers;
mod stream;

pub use error::{ErrorBody, RelayError};
pub use handlers::{ChatBody, ModelInfo, ModelsResponse, SimpleBody, SimpleResponse};
pub use stream::relay_frames;

use crate::conversation::ModelChoice;
use crate::provider::SharedProvider;
use axum::routing::{get, post};
use axum::Router;

/// Provider clients, built once at startup and shared by every request.
#[derive(Clone, Default)]
pub struct Providers {
    chatgpt: Option<SharedProvider>,
    gemini: Option<SharedProvider>,
}

impl Providers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, model: ModelChoice, provider: SharedProvider) -> Self {
        match model {
            ModelChoice::ChatGpt => self.chatgpt = Some(provider),
            ModelChoice::Gemini => self.gemini = Some(provider),
        }
        self
    }

    pub fn get(&self, model: ModelChoice) -> Option<&SharedProvider> {
        match model {
            ModelChoice::ChatGpt => self.chatgpt.as_ref(),
            ModelChoice::Gemini => self.gemini.as_ref(),
        }
    }

    pub fn is_configured(&self, model: ModelChoice) -> bool {
        self.get(model).is_some()
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub providers: Providers,
    pub default_model: ModelChoice,
}

impl AppState {
    pub fn new(providers: Providers) -> Self {
        Self {
            providers,
            default_model: ModelChoice::default(),
        }
    }

    pub fn with_default_model(mut self, model: ModelChoice) -> Self {
        self.default_model = model;
        self
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(handlers::chat))
        .route("/api/chat/simple", post(handlers::chat_simple))
        .route("/api/models", get(handlers::models))
        .route("/health", get(handlers::health))
        .with_state(state)
}
