use super::openai::upstream_message;
use super::{BoxFuture, ChatChunk, ChatRequest, ChunkStream, Provider};
use crate::{prompt, segment};
use anyhow::{anyhow, Context};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/";
pub const DEFAULT_FRAGMENT_DELAY: Duration = Duration::from_millis(75);

/// Gemini `generateContent`: one request, one complete answer.
///
/// Streaming is simulated by cutting the answer into markdown-safe pieces and
/// releasing them on a fixed timer.
#[derive(Debug, Clone)]
pub struct GeminiProvider {
    http: reqwest::Client,
    api_key: String,
    model: String,
    api_base: Url,
    fragment_delay: Duration,
}

impl GeminiProvider {
    pub fn new(http: reqwest::Client, api_key: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            http,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            api_base: Url::parse(DEFAULT_BASE_URL)?,
            fragment_delay: DEFAULT_FRAGMENT_DELAY,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base: &str) -> anyhow::Result<Self> {
        self.api_base = Url::parse(base).with_context(|| format!("invalid Gemini base URL: {base}"))?;
        Ok(self)
    }

    pub fn with_fragment_delay(mut self, delay: Duration) -> Self {
        self.fragment_delay = delay;
        self
    }

    fn build_url(&self) -> anyhow::Result<Url> {
        let mut url = self
            .api_base
            .join(&format!("v1beta/models/{}:generateContent", self.model))?;
        url.query_pairs_mut().append_pair("key", &self.api_key);
        Ok(url)
    }

    async fn generate(&self, req: ChatRequest) -> anyhow::Result<String> {
        let url = self.build_url()?;
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let prompt = prompt::flatten_prompt(prompt::GEMINI_PERSONA, &req.history, &req.message);
        tracing::debug!(model = %self.model, prompt_len = prompt.len(), "calling Gemini");

        let body = GenerateContentRequest {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part { text: Some(prompt) }],
            }],
        };

        let resp = self
            .http
            .post(url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .context("failed to start Gemini request")?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("Gemini API error: HTTP {status}: {}", upstream_message(&text)));
        }

        let parsed: GenerateContentResponse = resp
            .json()
            .await
            .context("failed to parse Gemini response JSON")?;

        extract_text(&parsed).ok_or_else(|| anyhow!("Failed to generate content"))
    }
}

impl Provider for GeminiProvider {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn stream_chat(&self, req: ChatRequest) -> BoxFuture<anyhow::Result<ChunkStream>> {
        let this = self.clone();

        Box::pin(async move {
            let text = this.generate(req).await?;
            let pieces: Vec<String> = segment::segment(&text).into_iter().map(str::to_string).collect();
            tracing::debug!(pieces = pieces.len(), "dripping Gemini response");

            let (tx, rx) = mpsc::channel::<anyhow::Result<ChatChunk>>(32);
            let delay = this.fragment_delay;

            tokio::spawn(async move {
                for text in pieces {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    if tx.send(Ok(ChatChunk { text })).await.is_err() {
                        return;
                    }
                }
            });

            Ok(Box::pin(ReceiverStream::new(rx)) as ChunkStream)
        })
    }

    fn complete(&self, req: ChatRequest) -> BoxFuture<anyhow::Result<String>> {
        let this = self.clone();
        Box::pin(async move { this.generate(req).await })
    }
}

#[derive(Debug, Clone, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Content {
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

fn extract_text(r: &GenerateContentResponse) -> Option<String> {
    // Concatenate all text parts of the first candidate.
    let cand = r.candidates.first()?;
    let content = cand.content.as_ref()?;
    let mut out = String::new();
    for p in &content.parts {
        if let Some(t) = &p.text {
            out.push_str(t);
        }
    }
    if out.is_empty() { None } else { Some(out) }
}
