use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One history entry as it crosses the HTTP boundary.
///
/// Both fields are required; an unknown role or missing content fails
/// deserialization and the whole request is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "msg-{}", self.0)
    }
}

/// A transcript entry owned by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn to_turn(&self) -> Turn {
        Turn::new(self.role, self.content.clone())
    }
}

/// Which upstream provider answers a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ModelChoice {
    /// Token-streaming provider (OpenAI chat completions).
    #[default]
    #[serde(rename = "chatgpt", alias = "openai")]
    ChatGpt,
    /// Whole-response provider (Gemini generateContent), streamed locally.
    #[serde(rename = "gemini", alias = "google")]
    Gemini,
}

impl ModelChoice {
    pub const ALL: [ModelChoice; 2] = [ModelChoice::ChatGpt, ModelChoice::Gemini];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelChoice::ChatGpt => "chatgpt",
            ModelChoice::Gemini => "gemini",
        }
    }

    /// Vendor name used in user-facing configuration messages.
    pub fn vendor(self) -> &'static str {
        match self {
            ModelChoice::ChatGpt => "OpenAI",
            ModelChoice::Gemini => "Google",
        }
    }
}

impl fmt::Display for ModelChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown model: {0}")]
pub struct UnknownModel(pub String);

impl FromStr for ModelChoice {
    type Err = UnknownModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chatgpt" | "openai" => Ok(ModelChoice::ChatGpt),
            "gemini" | "google" => Ok(ModelChoice::Gemini),
            _ => Err(UnknownModel(s.to_string())),
        }
    }
}
