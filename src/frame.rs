//! Wire unit of the relay's event stream.
//!
//! Every frame travels as a single `data:` line followed by a blank line:
//!
//! ```text
//! data: {"content":"Hello"}
//!
//! data: {"error":"upstream connection reset"}
//!
//! data: [DONE]
//! ```

use serde::{Deserialize, Serialize};

pub const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Content(String),
    Error(String),
    Done,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Payload {
    Content { content: String },
    Error { error: String },
}

impl Frame {
    /// The payload carried after `data: `.
    pub fn data(&self) -> String {
        let payload = match self {
            Frame::Done => return DONE_SENTINEL.to_string(),
            Frame::Content(content) => Payload::Content {
                content: content.clone(),
            },
            Frame::Error(error) => Payload::Error {
                error: error.clone(),
            },
        };
        // A two-variant enum of strings cannot fail to serialize.
        serde_json::to_string(&payload).unwrap_or_default()
    }

    pub fn encode(&self) -> String {
        format!("data: {}\n\n", self.data())
    }

    pub fn parse(data: &str) -> Result<Frame, serde_json::Error> {
        let data = data.trim();
        if data == DONE_SENTINEL {
            return Ok(Frame::Done);
        }
        Ok(match serde_json::from_str::<Payload>(data)? {
            Payload::Content { content } => Frame::Content(content),
            Payload::Error { error } => Frame::Error(error),
        })
    }

    pub fn is_done(&self) -> bool {
        matches!(self, Frame::Done)
    }
}
