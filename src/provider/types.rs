use crate::conversation::Turn;
use futures_core::stream::BoxStream;
use std::future::Future;
use std::pin::Pin;
use tokio_stream::StreamExt;

pub type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

pub type ChunkStream = BoxStream<'static, anyhow::Result<ChatChunk>>;

#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Prior turns, oldest first. Does not include `message`.
    pub history: Vec<Turn>,
    pub message: String,
}

impl ChatRequest {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            history: Vec::new(),
            message: message.into(),
        }
    }

    pub fn with_history(mut self, history: Vec<Turn>) -> Self {
        self.history = history;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ChatChunk {
    pub text: String,
}

/// Provider interface.
///
/// `stream_chat` resolves once the upstream call has been accepted; failures up
/// to that point come back as the outer error, later ones as stream items.
pub trait Provider {
    fn name(&self) -> &'static str;

    /// Start streaming a response.
    fn stream_chat(&self, req: ChatRequest) -> BoxFuture<anyhow::Result<ChunkStream>>;

    /// Produce the whole response at once.
    fn complete(&self, req: ChatRequest) -> BoxFuture<anyhow::Result<String>> {
        let started = self.stream_chat(req);
        Box::pin(async move {
            let mut stream = started.await?;
            let mut out = String::new();
            while let Some(chunk) = stream.next().await {
                out.push_str(&chunk?.text);
            }
            Ok(out)
        })
    }
}

pub type SharedProvider = std::sync::Arc<dyn Provider + Send + Sync>;
