//! Where codechat looks for its config file.
//!
//! The file is optional, so nothing here creates directories.

use anyhow::Context;
use std::env;
use std::path::PathBuf;

pub const HOME_VAR: &str = "CODECHAT_HOME";
pub const CONFIG_VAR: &str = "CODECHAT_CONFIG";
const CONFIG_FILE: &str = "config.toml";

/// Inputs for config resolution, read from the environment by `from_env`.
#[derive(Debug, Clone, Default)]
pub struct ConfigLocation {
    pub explicit: Option<PathBuf>,
    pub codechat_home: Option<PathBuf>,
    pub xdg_config_home: Option<PathBuf>,
    pub home: Option<PathBuf>,
}

impl ConfigLocation {
    pub fn from_env() -> Self {
        let var = |name: &str| env::var_os(name).filter(|v| !v.is_empty()).map(PathBuf::from);
        Self {
            explicit: var(CONFIG_VAR),
            codechat_home: var(HOME_VAR),
            xdg_config_home: var("XDG_CONFIG_HOME"),
            home: var("HOME"),
        }
    }

    /// `$CODECHAT_CONFIG`, else `$CODECHAT_HOME/config/config.toml`, else
    /// `$XDG_CONFIG_HOME/codechat/config.toml`, else
    /// `~/.config/codechat/config.toml`.
    pub fn resolve(&self) -> Option<PathBuf> {
        if let Some(path) = &self.explicit {
            return Some(path.clone());
        }
        let dir = if let Some(base) = &self.codechat_home {
            base.join("config")
        } else if let Some(xdg) = &self.xdg_config_home {
            xdg.join("codechat")
        } else {
            self.home.as_ref()?.join(".config").join("codechat")
        };
        Some(dir.join(CONFIG_FILE))
    }
}

pub fn config_path() -> anyhow::Result<PathBuf> {
    ConfigLocation::from_env()
        .resolve()
        .with_context(|| format!("cannot locate config: set {CONFIG_VAR}, {HOME_VAR} or HOME"))
}
