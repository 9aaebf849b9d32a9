use super::{BoxFuture, ChatChunk, ChatRequest, ChunkStream, Provider};
use anyhow::anyhow;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Scripted provider for offline runs and tests.
///
/// Replays a fixed list of chunks and can be told to fail before the stream
/// opens, fail after a number of chunks, or hold the stream open until the
/// consumer goes away.
#[derive(Debug, Clone, Default)]
pub struct StubProvider {
    chunks: Vec<String>,
    delay: Duration,
    fail_before: Option<String>,
    fail_after: Option<(usize, String)>,
    hold_open: bool,
    seen: Arc<Mutex<Vec<ChatRequest>>>,
}

impl StubProvider {
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            chunks: chunks.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_before_stream(mut self, message: impl Into<String>) -> Self {
        self.fail_before = Some(message.into());
        self
    }

    pub fn failing_after(mut self, chunks: usize, message: impl Into<String>) -> Self {
        self.fail_after = Some((chunks, message.into()));
        self
    }

    pub fn holding_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.seen.lock().map(|v| v.clone()).unwrap_or_default()
    }
}

impl Provider for StubProvider {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn stream_chat(&self, req: ChatRequest) -> BoxFuture<anyhow::Result<ChunkStream>> {
        let this = self.clone();

        Box::pin(async move {
            if let Ok(mut seen) = this.seen.lock() {
                seen.push(req);
            }
            if let Some(msg) = &this.fail_before {
                return Err(anyhow!(msg.clone()));
            }

            let (tx, rx) = mpsc::channel::<anyhow::Result<ChatChunk>>(32);

            tokio::spawn(async move {
                for (i, text) in this.chunks.into_iter().enumerate() {
                    if let Some((at, msg)) = &this.fail_after {
                        if i == *at {
                            let _ = tx.send(Err(anyhow!(msg.clone()))).await;
                            return;
                        }
                    }
                    if !this.delay.is_zero() {
                        tokio::time::sleep(this.delay).await;
                    }
                    if tx.send(Ok(ChatChunk { text })).await.is_err() {
                        return;
                    }
                }
                if let Some((_, msg)) = this.fail_after {
                    let _ = tx.send(Err(anyhow!(msg))).await;
                    return;
                }
                if this.hold_open {
                    tx.closed().await;
                }
            });

            Ok(Box::pin(ReceiverStream::new(rx)) as ChunkStream)
        })
    }
}
