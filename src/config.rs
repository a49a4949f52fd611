//! Configuration for the `binproto-debug` harness.
//!
//! Sources, lowest precedence first:
//! - defaults ([`DebugConfig::default`])
//! - a TOML file ([`DebugConfig::from_file`] / [`DebugConfig::from_toml`])
//! - `BINPROTO_*` environment variables ([`DebugConfig::apply_env`])
//! - command-line flags, applied by the binary
//!
//! ```toml
//! mode = "proxy"
//! raddr = "127.0.0.1:4000"
//! laddr = "[::1]:31337"
//! log_filter = "binproto=debug"
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_LADDR: &str = "[::1]:31337";
pub const DEFAULT_LOG_FILTER: &str = "binproto=info";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("configuration validation failed:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}

/// What the harness does with its connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Dial `raddr`, send typed commands, print incoming units.
    Client,
    /// Accept one connection on `laddr`, forward it to `raddr`, print both directions.
    Proxy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    pub mode: Option<Mode>,
    /// Address to connect to.
    pub raddr: Option<String>,
    /// Address to listen on in proxy mode.
    pub laddr: String,
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for DebugConfig {
    fn default() -> Self {
        DebugConfig {
            mode: None,
            raddr: None,
            laddr: DEFAULT_LADDR.to_string(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl DebugConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Defaults overlaid with the environment.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `BINPROTO_MODE`, `BINPROTO_RADDR`, `BINPROTO_LADDR`,
    /// `BINPROTO_LOG`. Unparseable values are ignored.
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    fn apply_vars<F: Fn(&str) -> Option<String>>(&mut self, var: F) {
        if let Some(mode) = var("BINPROTO_MODE") {
            match mode.to_ascii_lowercase().as_str() {
                "client" => self.mode = Some(Mode::Client),
                "proxy" => self.mode = Some(Mode::Proxy),
                _ => {}
            }
        }
        if let Some(raddr) = var("BINPROTO_RADDR") {
            self.raddr = Some(raddr);
        }
        if let Some(laddr) = var("BINPROTO_LADDR") {
            self.laddr = laddr;
        }
        if let Some(filter) = var("BINPROTO_LOG") {
            self.log_filter = filter;
        }
    }

    /// List of problems; empty when the configuration is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        match self.mode {
            None => errors.push("mode must be 'client' or 'proxy'".to_string()),
            Some(_) if self.raddr.as_deref().map_or(true, str::is_empty) => {
                errors.push("raddr is required".to_string())
            }
            Some(_) => {}
        }
        if self.mode == Some(Mode::Proxy) && self.laddr.is_empty() {
            errors.push("laddr is required in proxy mode".to_string());
        }
        errors
    }

    pub fn validate_strict(&self) -> Result<(), ConfigError> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}
