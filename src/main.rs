mod cli;

use anyhow::Context;
use clap::Parser;
use codechat::client::ConversationClient;
use codechat::{app, config, paths};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();

    #[cfg(feature = "tui")]
    let default_filter = if matches!(args.cmd, Some(cli::Command::Tui)) { "warn" } else { "info" };
    #[cfg(not(feature = "tui"))]
    let default_filter = "info";

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .init();

    let config_path = paths::config_path()?;
    let cfg = config::Config::load_optional(&config_path)?;
    tracing::debug!(?config_path, ?cfg, "resolved config");

    let http = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("failed to build HTTP client")?;

    match args.cmd {
        Some(cli::Command::Serve { listen }) => app::cmd_serve(&http, cfg.as_ref(), listen).await,
        #[cfg(feature = "tui")]
        Some(cli::Command::Tui) => {
            let client = conversation_client(http, cfg.as_ref(), &args)?;
            codechat::tui::run_tui(client).await
        }
        None => {
            let prompt = args.prompt.join(" ");
            if prompt.trim().is_empty() {
                anyhow::bail!("No prompt provided. Try: codechat \"What is a closure?\" or `codechat serve`");
            }
            let client = conversation_client(http, cfg.as_ref(), &args)?;
            app::cmd_ask(client, prompt).await
        }
    }
}

fn conversation_client(
    http: reqwest::Client,
    cfg: Option<&config::Config>,
    args: &cli::Args,
) -> anyhow::Result<ConversationClient> {
    let relay_url = args
        .url
        .clone()
        .or_else(|| cfg.and_then(|c| c.relay_url.clone()))
        .unwrap_or_else(|| config::DEFAULT_RELAY_URL.to_string());

    let model = args
        .model
        .or_else(|| cfg.and_then(|c| c.default_model))
        .unwrap_or_default();

    ConversationClient::new(http, &relay_url, model)
}
