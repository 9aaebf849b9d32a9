pub const GENERIC_FAILURE: &str = "An unexpected error occurred. Please try again.";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The relay answered with a non-2xx status.
    #[error("{message}")]
    Status {
        status: reqwest::StatusCode,
        message: String,
    },

    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// The relay reported that the upstream answer was cut short.
    #[error("{0}")]
    Interrupted(String),
}

impl ClientError {
    /// Human-readable reason shown in the transcript.
    pub fn describe(&self) -> String {
        describe_failure(&self.to_string())
    }
}

/// Map a raw failure text onto the message shown to the user.
pub fn describe_failure(raw: &str) -> String {
    if raw.contains("API key") {
        return "API key is invalid or missing. Please check your configuration.".to_string();
    }
    if raw.contains("quota") {
        return "API quota exceeded. Please try again later or upgrade your plan.".to_string();
    }
    if raw.contains("rate limit") {
        return "Too many requests. Please wait a moment and try again.".to_string();
    }
    if raw.trim().is_empty() {
        return GENERIC_FAILURE.to_string();
    }
    raw.to_string()
}
