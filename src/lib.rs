pub mod app;
pub mod client;
pub mod config;
pub mod conversation;
pub mod frame;
pub mod paths;
pub mod prompt;
pub mod provider;
pub mod relay;
pub mod segment;
pub mod sse;

#[cfg(feature = "tui")]
pub mod tui;
