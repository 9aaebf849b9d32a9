use crate::client::{Conversation, ConversationClient, SubmitOutcome};
use crate::config::{self, Config};
use crate::conversation::{MessageId, ModelChoice};
use crate::provider::gemini::GeminiProvider;
use crate::provider::openai::OpenAiProvider;
use crate::relay::{self, AppState, Providers};
use anyhow::{anyhow, Context};
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;

pub const OPENAI_KEY_VAR: &str = "OPENAI_API_KEY";
pub const GOOGLE_KEY_VAR: &str = "GOOGLE_API_KEY";

fn api_key(var: &str, configured: Option<&String>) -> Option<String> {
    std::env::var(var)
        .ok()
        .or_else(|| configured.cloned())
        .filter(|k| !k.trim().is_empty())
}

/// Build the provider clients for which a credential is available.
pub fn build_providers(http: &reqwest::Client, cfg: Option<&Config>) -> anyhow::Result<Providers> {
    let mut providers = Providers::new();

    match api_key(OPENAI_KEY_VAR, cfg.and_then(|c| c.openai.api_key.as_ref())) {
        Some(key) => {
            let mut p = OpenAiProvider::new(http.clone(), key)?;
            if let Some(c) = cfg {
                if let Some(model) = &c.openai.model {
                    p = p.with_model(model);
                }
                if let Some(base) = &c.openai.base_url {
                    p = p.with_base_url(base)?;
                }
                if let Some(window) = c.history_window {
                    p = p.with_history_window(window);
                }
            }
            providers = providers.with(ModelChoice::ChatGpt, Arc::new(p));
        }
        None => tracing::warn!("{OPENAI_KEY_VAR} not set; chatgpt requests will be refused"),
    }

    match api_key(GOOGLE_KEY_VAR, cfg.and_then(|c| c.gemini.api_key.as_ref())) {
        Some(key) => {
            let mut p = GeminiProvider::new(http.clone(), key)?;
            if let Some(c) = cfg {
                if let Some(model) = &c.gemini.model {
                    p = p.with_model(model);
                }
                if let Some(base) = &c.gemini.base_url {
                    p = p.with_base_url(base)?;
                }
                if let Some(delay) = c.fragment_delay() {
                    p = p.with_fragment_delay(delay);
                }
            }
            providers = providers.with(ModelChoice::Gemini, Arc::new(p));
        }
        None => tracing::warn!("{GOOGLE_KEY_VAR} not set; gemini requests will be refused"),
    }

    Ok(providers)
}

pub async fn cmd_serve(
    http: &reqwest::Client,
    cfg: Option<&Config>,
    listen: Option<SocketAddr>,
) -> anyhow::Result<()> {
    let addr = match listen.or_else(|| cfg.and_then(|c| c.listen)) {
        Some(a) => a,
        None => config::DEFAULT_LISTEN.parse()?,
    };
    let default_model = cfg.and_then(|c| c.default_model).unwrap_or_default();

    let providers = build_providers(http, cfg)?;
    let state = AppState::new(providers).with_default_model(default_model);
    let app = relay::build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!(%addr, %default_model, "relay listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await
        .context("relay server failed")?;
    Ok(())
}

/// Ask one question through the relay and print the answer as it streams.
pub async fn cmd_ask(client: ConversationClient, prompt: String) -> anyhow::Result<()> {
    let mut updates = client.subscribe();
    let mut task = tokio::spawn({
        let client = client.clone();
        async move { client.submit(&prompt).await }
    });

    let mut out = std::io::stdout();
    let mut printer = Printer::default();

    let result = loop {
        tokio::select! {
            res = &mut task => break res.context("chat task failed")?,
            changed = updates.changed() => {
                if changed.is_err() {
                    break (&mut task).await.context("chat task failed")?;
                }
                printer.print_new(&client.snapshot(), &mut out)?;
            }
        }
    };
    if let Ok(SubmitOutcome::Completed { message }) = &result {
        printer.follow(*message);
    }
    printer.print_new(&client.snapshot(), &mut out)?;
    writeln!(out).ok();

    match result {
        Ok(SubmitOutcome::Rejected) => {
            anyhow::bail!("No prompt provided. Try: codechat \"What is a closure?\"")
        }
        Ok(_) => Ok(()),
        Err(e) => Err(anyhow!(e.describe())),
    }
}

/// Tracks how much of the streamed answer has been written out.
#[derive(Default)]
struct Printer {
    target: Option<MessageId>,
    printed: usize,
}

impl Printer {
    /// Pin the answer to print. Needed once the turn is over, since the
    /// streaming target is cleared by then.
    fn follow(&mut self, id: MessageId) {
        self.target.get_or_insert(id);
    }

    fn print_new(&mut self, snapshot: &Conversation, out: &mut impl Write) -> anyhow::Result<()> {
        if self.target.is_none() {
            self.target = snapshot.streaming_target();
        }
        let Some(msg) = self.target.and_then(|id| snapshot.message(id)) else {
            return Ok(());
        };
        if let Some(fresh) = msg.content.get(self.printed..) {
            write!(out, "{fresh}").context("failed to write to stdout")?;
            out.flush().ok();
            self.printed = msg.content.len();
        }
        Ok(())
    }
}
