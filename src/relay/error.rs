use crate::conversation::ModelChoice;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

/// Body of every non-2xx relay response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Failures that end a relay request before any stream is opened.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Message is required")]
    MissingMessage,

    #[error("Invalid model specified: {0}")]
    UnknownModel(String),

    #[error("{} API key is not configured", .0.vendor())]
    NotConfigured(ModelChoice),

    #[error("{0}")]
    Upstream(anyhow::Error),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::InvalidBody(_) | RelayError::MissingMessage | RelayError::UnknownModel(_) => {
                StatusCode::BAD_REQUEST
            }
            RelayError::NotConfigured(_) | RelayError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            RelayError::Upstream(e) => tracing::error!(error = %format!("{e:#}"), "upstream request failed"),
            RelayError::NotConfigured(model) => tracing::error!(%model, "provider credential missing"),
            other => tracing::warn!(error = %other, "rejected chat request"),
        }

        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}
