//! Conversation client: owns the transcript and consumes the relay stream.

mod decode;
mod error;
mod state;

pub use decode::{Decoded, StreamDecoder};
pub use error::{describe_failure, ClientError, GENERIC_FAILURE};
pub use state::{Conversation, PendingTurn};

use crate::conversation::{MessageId, ModelChoice};
use crate::frame::Frame;
use crate::relay::{ChatBody, ErrorBody};
use anyhow::Context;
use reqwest::Url;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

const FALLBACK_FAILURE: &str = "Failed to get response";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Blank input, or a turn was already in flight. Nothing was sent.
    Rejected,
    Completed { message: MessageId },
    /// Stopped by `cancel` or `switch_model` before the stream ended.
    Cancelled,
}

/// Client for the relay's `/api/chat` endpoint.
///
/// Cheap to clone; clones share the same conversation. Every state change
/// bumps the revision published by [`subscribe`](Self::subscribe), so a
/// renderer that waits on it redraws once per burst of fragments rather than
/// once per fragment.
#[derive(Clone)]
pub struct ConversationClient {
    http: reqwest::Client,
    endpoint: Url,
    state: Arc<Mutex<Conversation>>,
    revision: Arc<watch::Sender<u64>>,
    cancel: Arc<Mutex<Option<CancellationToken>>>,
}

impl ConversationClient {
    pub fn new(http: reqwest::Client, relay_url: &str, model: ModelChoice) -> anyhow::Result<Self> {
        let endpoint = Url::parse(relay_url)
            .and_then(|base| base.join("api/chat"))
            .with_context(|| format!("invalid relay URL: {relay_url}"))?;
        let (revision, _) = watch::channel(0);

        Ok(Self {
            http,
            endpoint,
            state: Arc::new(Mutex::new(Conversation::new(model))),
            revision: Arc::new(revision),
            cancel: Arc::new(Mutex::new(None)),
        })
    }

    pub fn snapshot(&self) -> Conversation {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    fn update<T>(&self, f: impl FnOnce(&mut Conversation) -> T) -> T {
        let out = {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            f(&mut state)
        };
        self.revision.send_modify(|r| *r = r.wrapping_add(1));
        out
    }

    fn replace_cancel(&self, token: Option<CancellationToken>) -> Option<CancellationToken> {
        let mut slot = self.cancel.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *slot, token)
    }

    /// Stop the turn in flight, if any.
    pub fn cancel(&self) -> bool {
        match self.replace_cancel(None) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Select another provider. The whole history is discarded and a turn in
    /// flight is cancelled.
    pub fn switch_model(&self, model: ModelChoice) {
        if self.cancel() {
            tracing::debug!(%model, "model switched mid-stream; cancelled turn");
        }
        self.update(|c| c.switch_model(model));
    }

    /// Ask one question and stream the answer into the transcript.
    ///
    /// Failures are recorded in the transcript as an assistant message before
    /// being returned.
    pub async fn submit(&self, question: &str) -> Result<SubmitOutcome, ClientError> {
        // Installed under the state lock: a `switch_model` that sees this
        // turn also sees its token.
        let token = CancellationToken::new();
        let Some(turn) = self.update(|c| {
            let turn = c.begin(question)?;
            self.replace_cancel(Some(token.clone()));
            Some(turn)
        }) else {
            tracing::debug!("submission rejected: blank input or turn in flight");
            return Ok(SubmitOutcome::Rejected);
        };
        let generation = turn.generation;

        let mut result = self.exchange(turn, &token).await;

        self.replace_cancel(None);
        if let Err(e) = &result {
            let reason = e.describe();
            if self.update(|c| c.fail(generation, &reason)).is_some() {
                tracing::warn!(error = %e, %reason, "chat turn failed");
            } else {
                tracing::debug!(error = %e, "failure of a discarded turn");
                result = Ok(SubmitOutcome::Cancelled);
            }
        }
        self.update(|c| c.finish());
        result
    }

    async fn exchange(
        &self,
        turn: PendingTurn,
        token: &CancellationToken,
    ) -> Result<SubmitOutcome, ClientError> {
        let generation = turn.generation;
        let body = ChatBody {
            message: Some(turn.message),
            model: Some(turn.model.to_string()),
            conversation_history: turn.history,
        };

        let send = self.http.post(self.endpoint.clone()).json(&body).send();
        let resp = tokio::select! {
            _ = token.cancelled() => return Ok(SubmitOutcome::Cancelled),
            resp = send => resp?,
        };

        let status = resp.status();
        if !status.is_success() {
            let message = tokio::select! {
                _ = token.cancelled() => return Ok(SubmitOutcome::Cancelled),
                body = resp.json::<ErrorBody>() => match body {
                    Ok(b) if !b.error.is_empty() => b.error,
                    _ => FALLBACK_FAILURE.to_string(),
                },
            };
            return Err(ClientError::Status { status, message });
        }

        let Some(id) = self.update(|c| c.open_stream(generation)) else {
            tracing::debug!("history cleared before the stream opened");
            return Ok(SubmitOutcome::Cancelled);
        };
        let mut body = resp.bytes_stream();
        let mut decoder = StreamDecoder::new();
        let mut interrupted: Option<String> = None;

        loop {
            let next = tokio::select! {
                _ = token.cancelled() => {
                    tracing::debug!(message_id = %id, "stream cancelled");
                    return Ok(SubmitOutcome::Cancelled);
                }
                next = body.next() => next,
            };

            let (decoded, ended) = match next {
                Some(chunk) => (decoder.push(&chunk?), false),
                None => (decoder.finish(), true),
            };

            for item in decoded {
                match item {
                    Decoded::Frame(Frame::Done) => return finish_stream(id, interrupted),
                    Decoded::Frame(Frame::Content(text)) => {
                        self.update(|c| c.append(&text));
                    }
                    Decoded::Frame(Frame::Error(msg)) => interrupted = Some(msg),
                    Decoded::Malformed { payload, error } => {
                        tracing::warn!(%payload, %error, "dropping undecodable fragment");
                    }
                }
            }

            if ended {
                tracing::debug!(message_id = %id, "stream ended without terminal sentinel");
                return finish_stream(id, interrupted);
            }
        }
    }
}

fn finish_stream(id: MessageId, interrupted: Option<String>) -> Result<SubmitOutcome, ClientError> {
    match interrupted {
        Some(msg) => Err(ClientError::Interrupted(msg)),
        None => Ok(SubmitOutcome::Completed { message: id }),
    }
}
