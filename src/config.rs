use crate::controller::Delivery;
use crate::render::MarkupPolicy;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub render: RenderConfig,
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct RenderConfig {
    #[serde(default)]
    pub markup: MarkupPolicy,
    #[serde(default = "default_history_lines")]
    pub history_lines: usize,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct ExchangeConfig {
    #[serde(default)]
    pub delivery: Delivery,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            markup: MarkupPolicy::default(),
            history_lines: default_history_lines(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&content).context("failed to parse config toml")?;

        if cfg.render.history_lines == 0 {
            bail!("render.history_lines must be greater than zero");
        }
        Ok(cfg)
    }

    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }
}

fn default_history_lines() -> usize {
    40
}

fn default_log_filter() -> String {
    "warn".to_string()
}
