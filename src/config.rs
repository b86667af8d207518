use crate::api::coingecko::COINGECKO_API_BASE;
use crate::execution::DEFAULT_INITIAL_BALANCE;
use crate::feed::DEFAULT_FEED_URL;
use crate::models::MarketSymbol;
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

pub const DEFAULT_SYMBOL: &str = "KRW-BTC";
pub const DEFAULT_CONFIG_FILE: &str = "tickpilot";
pub const DEFAULT_LOG_FILTER: &str = "tickpilot=info";
const ENV_PREFIX: &str = "TICKPILOT";

/// Runtime settings
///
/// Sources, lowest priority first: built-in defaults, optional TOML file,
/// `TICKPILOT_*` environment variables. Trading thresholds are constants,
/// not settings.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Settings {
    pub feed_url: String,
    pub symbol: String,
    pub initial_balance: f64,
    pub metadata_enabled: bool,
    pub coingecko_api_base: String,
    pub coingecko_api_key: Option<String>,
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            feed_url: DEFAULT_FEED_URL.to_string(),
            symbol: DEFAULT_SYMBOL.to_string(),
            initial_balance: DEFAULT_INITIAL_BALANCE,
            metadata_enabled: true,
            coingecko_api_base: COINGECKO_API_BASE.to_string(),
            coingecko_api_key: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }
}

impl Settings {
    /// Load settings from `path` (extension optional, file may be absent) and the environment
    pub fn load(path: Option<&str>) -> Result<Self> {
        let file = path.unwrap_or(DEFAULT_CONFIG_FILE);
        let defaults = Settings::default();

        let settings: Settings = Config::builder()
            .set_default("feed_url", defaults.feed_url)?
            .set_default("symbol", defaults.symbol)?
            .set_default("initial_balance", defaults.initial_balance)?
            .set_default("metadata_enabled", defaults.metadata_enabled)?
            .set_default("coingecko_api_base", defaults.coingecko_api_base)?
            .set_default("log_filter", defaults.log_filter)?
            .add_source(File::with_name(file).required(path.is_some()))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.market_symbol()?;
        if !self.initial_balance.is_finite() || self.initial_balance <= 0.0 {
            anyhow::bail!("initial_balance must be positive, got {}", self.initial_balance);
        }
        if self.feed_url.trim().is_empty() {
            anyhow::bail!("feed_url must not be empty");
        }
        Ok(())
    }

    pub fn market_symbol(&self) -> Result<MarketSymbol> {
        MarketSymbol::new(self.symbol.as_str())
            .with_context(|| format!("Invalid market symbol '{}'", self.symbol))
    }
}
