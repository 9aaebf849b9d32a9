use clap::{Parser, Subcommand};
use codechat::conversation::ModelChoice;
use std::net::SocketAddr;

/// Coding-assistant chat relay and client
#[derive(Debug, Parser)]
#[command(name = "codechat")]
#[command(version)]
#[command(about = "Coding-assistant chat relay and client", long_about = None)]
pub struct Args {
    /// Model to ask (chatgpt or gemini)
    #[arg(short = 'm', long = "model")]
    pub model: Option<ModelChoice>,

    /// Relay base URL (default: config relay_url or http://127.0.0.1:3000/)
    #[arg(long = "url", env = "CODECHAT_RELAY_URL")]
    pub url: Option<String>,

    #[command(subcommand)]
    pub cmd: Option<Command>,

    /// Question text (positional) (used when no subcommand is given)
    #[arg(value_name = "PROMPT")]
    pub prompt: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the relay server
    Serve {
        /// Listen address (default: config listen or 127.0.0.1:3000)
        #[arg(long = "listen")]
        listen: Option<SocketAddr>,
    },

    /// Run an interactive terminal chat UI against the relay
    #[cfg(feature = "tui")]
    Tui,
}
