use crate::conversation::ModelChoice;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_LISTEN: &str = "127.0.0.1:3000";
pub const DEFAULT_RELAY_URL: &str = "http://127.0.0.1:3000/";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Relay listen address.
    pub listen: Option<SocketAddr>,

    /// Model used when a request does not name one.
    pub default_model: Option<ModelChoice>,

    /// Recent turns kept when bounding OpenAI context.
    pub history_window: Option<usize>,

    /// Pause between simulated Gemini fragments.
    pub fragment_delay_ms: Option<u64>,

    /// Where the client finds the relay.
    pub relay_url: Option<String>,

    #[serde(default)]
    pub openai: ProviderConfig,

    #[serde(default)]
    pub gemini: ProviderConfig,
}

#[derive(Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    pub model: Option<String>,
    pub base_url: Option<String>,

    /// Used only when the provider's environment variable is unset.
    pub api_key: Option<String>,
}

impl fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Config {
    /// Load config if the file exists, otherwise return Ok(None).
    pub fn load_optional(path: impl AsRef<Path>) -> anyhow::Result<Option<Self>> {
        let path = path.as_ref();
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(anyhow::Error::new(e))
                    .with_context(|| format!("failed to read config: {}", path.display()))
            }
        };

        let s = String::from_utf8(bytes).context("config is not valid UTF-8")?;
        let cfg: Config = toml::from_str(&s)
            .with_context(|| format!("failed to parse TOML: {}", path.display()))?;
        Ok(Some(cfg))
    }

    pub fn fragment_delay(&self) -> Option<Duration> {
        self.fragment_delay_ms.map(Duration::from_millis)
    }
}
