use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use salsa_adapters::http::HttpSourceConfig;
use salsa_adapters::nats::NatsConfig;
use salsa_app::config::AlertSettings;

/// Top-level layout of `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub alerts: AlertSettings,
    #[serde(default)]
    pub source: HttpSourceConfig,
    /// Without a broker, notifications are only logged.
    #[serde(default)]
    pub nats: Option<NatsConfig>,
}

impl ServerConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("failed to parse config: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}
