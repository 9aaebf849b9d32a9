use super::{BoxFuture, ChatChunk, ChatRequest, ChunkStream, Provider};
use crate::conversation::Turn;
use crate::prompt;
use crate::sse::{SseEvent, SseParser};
use anyhow::{anyhow, Context};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/";

/// Chat completions with native token streaming.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    api_base: Url,
    history_window: usize,
}

impl OpenAiProvider {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            api_base: Url::parse(DEFAULT_BASE_URL)?,
            history_window: prompt::DEFAULT_HISTORY_WINDOW,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base: &str) -> anyhow::Result<Self> {
        self.api_base = Url::parse(base).with_context(|| format!("invalid OpenAI base URL: {base}"))?;
        Ok(self)
    }

    pub fn with_history_window(mut self, window: usize) -> Self {
        self.history_window = window;
        self
    }

    fn headers(&self) -> anyhow::Result<HeaderMap> {
        let mut h = HeaderMap::new();
        h.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let v = HeaderValue::from_str(&format!("Bearer {}", self.api_key)).map_err(|e| anyhow!(e))?;
        h.insert(AUTHORIZATION, v);
        Ok(h)
    }
}

impl Provider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn stream_chat(&self, req: ChatRequest) -> BoxFuture<anyhow::Result<ChunkStream>> {
        let this = self.clone();

        Box::pin(async move {
            let url = this.api_base.join("v1/chat/completions")?;
            let headers = this.headers()?;

            let messages = prompt::bounded_context(
                prompt::CHATGPT_PERSONA,
                &req.history,
                &req.message,
                this.history_window,
            );
            tracing::debug!(model = %this.model, turns = messages.len(), "opening OpenAI stream");

            let body = CompletionRequest {
                model: &this.model,
                messages: &messages,
                stream: true,
            };

            let resp = this
                .http
                .post(url)
                .headers(headers)
                .json(&body)
                .send()
                .await
                .context("failed to start OpenAI request")?;

            let status = resp.status();
            if !status.is_success() {
                let text = resp.text().await.unwrap_or_default();
                return Err(anyhow!("OpenAI API error: HTTP {status}: {}", upstream_message(&text)));
            }

            let (tx, rx) = mpsc::channel::<anyhow::Result<ChatChunk>>(64);

            tokio::spawn(async move {
                let mut stream = resp.bytes_stream();
                let mut parser = SseParser::new();

                while let Some(item) = stream.next().await {
                    let bytes = match item {
                        Ok(b) => b,
                        Err(e) => {
                            let _ = tx.send(Err(anyhow!(e).context("network stream error"))).await;
                            return;
                        }
                    };

                    for ev in parser.push(&bytes) {
                        let data = match ev {
                            Ok(SseEvent::Data(data)) => data,
                            Ok(SseEvent::Other) => continue,
                            Err(e) => {
                                let _ = tx.send(Err(e)).await;
                                return;
                            }
                        };

                        if data.trim() == crate::frame::DONE_SENTINEL {
                            return;
                        }
                        if data.trim().is_empty() {
                            continue;
                        }

                        match serde_json::from_str::<CompletionChunk>(&data) {
                            Ok(chunk) => {
                                let Some(text) = chunk.delta_text() else {
                                    continue;
                                };
                                if tx.send(Ok(ChatChunk { text })).await.is_err() {
                                    return;
                                }
                            }
                            Err(e) => {
                                let _ = tx
                                    .send(Err(anyhow!(e).context("failed to parse OpenAI stream JSON")))
                                    .await;
                                return;
                            }
                        }
                    }
                }
            });

            Ok(Box::pin(ReceiverStream::new(rx)) as ChunkStream)
        })
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct CompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<Delta>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionChunk {
    fn delta_text(self) -> Option<String> {
        let text = self.choices.into_iter().next()?.delta?.content?;
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Pull `error.message` out of an upstream error body, else return it as is.
pub(crate) fn upstream_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(env) => env.error.message,
        Err(_) => body.trim().to_string(),
    }
}
