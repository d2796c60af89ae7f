use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::str::FromStr;

use crate::model::bar::Timeframe;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub feed: FeedConfig,
    pub pair: PairConfig,
    pub publisher: PublisherConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub ws_base_url: String,
    #[serde(default)]
    pub symbols: Vec<String>,
    pub ping_interval_secs: u64,
    pub reconnect_delay_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PairConfig {
    pub symbol_x: String,
    pub symbol_y: String,
    pub timeframe: String,
    pub window: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    pub period_secs: u64,
    pub lookback_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl FeedConfig {
    /// Symbols to ingest, uppercased and deduplicated, preserving order.
    pub fn tracked_symbols(&self) -> Vec<String> {
        let mut out = Vec::new();
        for sym in &self.symbols {
            let s = sym.trim().to_ascii_uppercase();
            if !s.is_empty() && !out.iter().any(|v| v == &s) {
                out.push(s);
            }
        }
        out
    }
}

impl PairConfig {
    pub fn timeframe(&self) -> Result<Timeframe> {
        Timeframe::from_str(&self.timeframe)
            .map_err(|e| anyhow::anyhow!(e))
            .context("pair.timeframe is invalid")
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config_path = Path::new("config/default.toml");
        let config_str = std::fs::read_to_string(config_path)
            .with_context(|| format!("failed to read {}", config_path.display()))?;

        let mut config: Config =
            toml::from_str(&config_str).context("failed to parse config/default.toml")?;

        if let Ok(url) = std::env::var("PAIRSTREAM_WS_URL") {
            config.feed.ws_base_url = url;
        }
        if let Ok(path) = std::env::var("PAIRSTREAM_DB_PATH") {
            config.store.path = path;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.pair.timeframe()?;
        if self.pair.window == 0 {
            bail!("pair.window must be > 0");
        }
        if self.publisher.period_secs == 0 {
            bail!("publisher.period_secs must be > 0");
        }
        let tracked = self.feed.tracked_symbols();
        for sym in [&self.pair.symbol_x, &self.pair.symbol_y] {
            let s = sym.trim().to_ascii_uppercase();
            if s.is_empty() {
                bail!("pair symbols must not be empty");
            }
            if !tracked.iter().any(|v| v == &s) {
                bail!("pair symbol '{}' is not in feed.symbols", s);
            }
        }
        Ok(())
    }
}
