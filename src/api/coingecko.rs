use crate::models::MarketSymbol;
use anyhow::{Context, Result};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::sync::Arc;

pub const COINGECKO_API_BASE: &str = "https://api.coingecko.com/api/v3";
const RATE_LIMIT_RPM: u32 = 30; // Demo API: 30 requests per minute
const REQUEST_TIMEOUT_SECS: u64 = 10;

// Type alias for the rate limiter to simplify signatures
type CoinGeckoRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Exchange pairs with a known CoinGecko coin id
const COIN_IDS: &[(&str, &str)] = &[
    ("BTC", "bitcoin"),
    ("ETH", "ethereum"),
    ("XRP", "ripple"),
    ("SOL", "solana"),
    ("DOGE", "dogecoin"),
    ("ZRX", "0x"),
];

/// CoinGecko coin id for a market, if the base asset is known
pub fn coin_id_for(symbol: &MarketSymbol) -> Option<&'static str> {
    let base = symbol.base_asset();
    COIN_IDS
        .iter()
        .find(|(asset, _)| *asset == base)
        .map(|(_, coin_id)| *coin_id)
}

/// CoinGecko API client for coin metadata
///
/// This struct is cloneable to allow sharing across async tasks.
/// All clones share the same rate limiter.
#[derive(Clone)]
pub struct CoinGeckoClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    rate_limiter: Arc<CoinGeckoRateLimiter>,
}

/// Response from /coins/{id}, only the fields we read
#[derive(Debug, Deserialize)]
struct CoinDetail {
    #[allow(dead_code)]
    id: String,
    image: CoinImage,
}

#[derive(Debug, Deserialize)]
struct CoinImage {
    #[allow(dead_code)]
    thumb: Option<String>,
    small: Option<String>,
    large: Option<String>,
}

impl CoinGeckoClient {
    /// Create a client against the public API
    pub fn new(api_key: Option<String>) -> Result<Self> {
        Self::with_base_url(COINGECKO_API_BASE, api_key)
    }

    /// Create a client against a custom base URL (mirrors, tests)
    pub fn with_base_url(base_url: impl Into<String>, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client")?;

        let rpm = NonZeroU32::new(RATE_LIMIT_RPM).context("Rate limit must be non-zero")?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(rpm)));

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            rate_limiter,
        })
    }

    /// Make a rate-limited API request
    ///
    /// Single attempt, never retried.
    async fn make_request(&self, url: &str) -> Result<reqwest::Response> {
        self.rate_limiter.until_ready().await;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Network error calling CoinGecko")?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status.as_u16() == 429 {
            anyhow::bail!("Rate limited by CoinGecko (429)");
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        anyhow::bail!("CoinGecko API error ({}): {}", status, error_text)
    }

    /// Fetch the small logo URL for a coin
    pub async fn get_coin_image(&self, coin_id: &str) -> Result<String> {
        let mut url = format!(
            "{}/coins/{}?localization=false&tickers=false&community_data=false&developer_data=false",
            self.base_url, coin_id
        );
        if let Some(api_key) = &self.api_key {
            url.push_str("&x_cg_demo_api_key=");
            url.push_str(api_key);
        }

        tracing::debug!("Fetching coin metadata for {}", coin_id);

        let response = self.make_request(&url).await?;

        let detail: CoinDetail = response
            .json()
            .await
            .context("Failed to parse coin detail")?;

        detail
            .image
            .small
            .or(detail.image.large)
            .with_context(|| format!("No image for coin {}", coin_id))
    }

    /// Resolve a market to its coin id and fetch the logo URL
    pub async fn get_market_image(&self, symbol: &MarketSymbol) -> Result<String> {
        let coin_id = coin_id_for(symbol)
            .with_context(|| format!("No CoinGecko id known for {}", symbol))?;
        self.get_coin_image(coin_id).await
    }
}
