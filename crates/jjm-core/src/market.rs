//! Live market data for the chat context
//!
//! Four independent sources, each fetched with its own timeout:
//! - USD→IDR exchange rate (falls back to a fixed rate on failure)
//! - Spot gold in USD per troy ounce
//! - Spot Bitcoin in USD and IDR
//! - Jakarta Composite Index (^JKSE)
//!
//! Everything except the exchange rate is simply omitted when its source
//! fails, so a snapshot is always available.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::format_rupiah;
use crate::error::{Error, Result};

/// Environment variable enabling market enrichment (`1`/`true`)
pub const MARKET_DATA_ENV: &str = "JJM_MARKET_DATA";

/// Environment variable overriding the per-source timeout in seconds
pub const MARKET_TIMEOUT_ENV: &str = "JJM_MARKET_TIMEOUT_SECS";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Used when the exchange rate source is unavailable
pub const FALLBACK_USD_IDR: f64 = 16_000.0;

const GRAMS_PER_TROY_OUNCE: f64 = 31.103_476_8;

const FX_URL: &str = "https://open.er-api.com/v6/latest/USD";
const GOLD_URL: &str = "https://api.gold-api.com/price/XAU";
const BITCOIN_URL: &str =
    "https://api.coingecko.com/api/v3/simple/price?ids=bitcoin&vs_currencies=usd,idr";
const INDEX_URL: &str = "https://query1.finance.yahoo.com/v8/finance/chart/%5EJKSE";

/// Source URLs and timeout
#[derive(Debug, Clone)]
pub struct MarketConfig {
    pub timeout: Duration,
    pub fx_url: String,
    pub gold_url: String,
    pub bitcoin_url: String,
    pub index_url: String,
    pub fallback_usd_idr: f64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            fx_url: FX_URL.to_string(),
            gold_url: GOLD_URL.to_string(),
            bitcoin_url: BITCOIN_URL.to_string(),
            index_url: INDEX_URL.to_string(),
            fallback_usd_idr: FALLBACK_USD_IDR,
        }
    }
}

impl MarketConfig {
    /// `Some` when `JJM_MARKET_DATA` is enabled
    pub fn from_env() -> Option<Self> {
        let enabled = std::env::var(MARKET_DATA_ENV)
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
            .unwrap_or(false);
        if !enabled {
            return None;
        }

        let timeout = std::env::var(MARKET_TIMEOUT_ENV)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);

        Some(Self {
            timeout,
            ..Self::default()
        })
    }

    /// Every source served from one host at `/fx`, `/gold`, `/btc` and `/index`
    pub fn with_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            fx_url: format!("{}/fx", base),
            gold_url: format!("{}/gold", base),
            bitcoin_url: format!("{}/btc", base),
            index_url: format!("{}/index", base),
            ..Self::default()
        }
    }
}

/// USD→IDR rate and whether it came from the live source
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ExchangeRate {
    pub usd_idr: f64,
    pub live: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BitcoinPrice {
    pub usd: f64,
    pub idr: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IndexQuote {
    pub price: f64,
    pub previous_close: Option<f64>,
}

impl IndexQuote {
    pub fn change_percent(&self) -> Option<f64> {
        self.previous_close
            .filter(|prev| *prev != 0.0)
            .map(|prev| (self.price - prev) / prev * 100.0)
    }
}

/// Partial result combining every source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSnapshot {
    pub exchange_rate: ExchangeRate,
    pub gold_usd_per_ounce: Option<f64>,
    pub bitcoin: Option<BitcoinPrice>,
    pub jakarta_composite: Option<IndexQuote>,
}

impl MarketSnapshot {
    /// Gold converted to rupiah per gram
    pub fn gold_idr_per_gram(&self) -> Option<f64> {
        self.gold_usd_per_ounce
            .map(|usd| usd * self.exchange_rate.usd_idr / GRAMS_PER_TROY_OUNCE)
    }

    /// Indonesian text block for the system prompt
    pub fn render(&self) -> String {
        let mut lines = Vec::new();

        let rate_note = if self.exchange_rate.live {
            ""
        } else {
            " (perkiraan)"
        };
        lines.push(format!(
            "- Kurs USD/IDR: {}{}",
            format_rupiah(self.exchange_rate.usd_idr),
            rate_note
        ));

        if let (Some(usd), Some(idr_gram)) = (self.gold_usd_per_ounce, self.gold_idr_per_gram()) {
            lines.push(format!(
                "- Emas: ${:.2}/oz (sekitar {}/gram)",
                usd,
                format_rupiah(idr_gram)
            ));
        }

        if let Some(btc) = self.bitcoin {
            lines.push(format!(
                "- Bitcoin: ${:.0} ({})",
                btc.usd,
                format_rupiah(btc.idr)
            ));
        }

        if let Some(index) = self.jakarta_composite {
            match index.change_percent() {
                Some(change) => lines.push(format!(
                    "- IHSG: {:.2} ({:+.2}% dari penutupan sebelumnya)",
                    index.price, change
                )),
                None => lines.push(format!("- IHSG: {:.2}", index.price)),
            }
        }

        lines.join("\n")
    }
}

#[derive(Deserialize)]
struct FxResponse {
    rates: std::collections::HashMap<String, f64>,
}

#[derive(Deserialize)]
struct GoldResponse {
    price: f64,
}

#[derive(Deserialize)]
struct CoinGeckoResponse {
    bitcoin: CoinGeckoPrice,
}

#[derive(Deserialize)]
struct CoinGeckoPrice {
    usd: f64,
    idr: f64,
}

#[derive(Deserialize)]
struct ChartResponse {
    chart: ChartBody,
}

#[derive(Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Vec<ChartResult>,
}

#[derive(Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: f64,
    chart_previous_close: Option<f64>,
}

/// Fetches a `MarketSnapshot` from the configured sources
#[derive(Clone)]
pub struct MarketClient {
    http_client: Client,
    config: MarketConfig,
}

impl MarketClient {
    pub fn new(config: MarketConfig) -> Self {
        // Yahoo rejects requests without a browser-ish user agent
        let http_client = Client::builder()
            .user_agent("Mozilla/5.0 (compatible; jjm/0.1)")
            .timeout(config.timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build market HTTP client, using defaults");
                Client::new()
            });
        Self {
            http_client,
            config,
        }
    }

    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// Fetch all sources concurrently. Never fails.
    pub async fn snapshot(&self) -> MarketSnapshot {
        let (fx, gold, bitcoin, index) = tokio::join!(
            self.guarded("fx", self.fetch_usd_idr()),
            self.guarded("gold", self.fetch_gold()),
            self.guarded("bitcoin", self.fetch_bitcoin()),
            self.guarded("jkse", self.fetch_index()),
        );

        let exchange_rate = match fx {
            Some(rate) => ExchangeRate {
                usd_idr: rate,
                live: true,
            },
            None => ExchangeRate {
                usd_idr: self.config.fallback_usd_idr,
                live: false,
            },
        };

        MarketSnapshot {
            exchange_rate,
            gold_usd_per_ounce: gold,
            bitcoin,
            jakarta_composite: index,
        }
    }

    /// Apply the per-source timeout and turn failures into `None`
    async fn guarded<T, F>(&self, source: &'static str, fut: F) -> Option<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        match tokio::time::timeout(self.config.timeout, fut).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                debug!(source, error = %e, "Market source failed");
                None
            }
            Err(_) => {
                debug!(source, "Market source timed out");
                None
            }
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.http_client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(Error::InvalidData(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }
        Ok(response.json().await?)
    }

    async fn fetch_usd_idr(&self) -> Result<f64> {
        let body: FxResponse = self.get_json(&self.config.fx_url).await?;
        body.rates
            .get("IDR")
            .copied()
            .filter(|rate| *rate > 0.0)
            .ok_or_else(|| Error::InvalidData("IDR rate missing".into()))
    }

    async fn fetch_gold(&self) -> Result<f64> {
        let body: GoldResponse = self.get_json(&self.config.gold_url).await?;
        Ok(body.price)
    }

    async fn fetch_bitcoin(&self) -> Result<BitcoinPrice> {
        let body: CoinGeckoResponse = self.get_json(&self.config.bitcoin_url).await?;
        Ok(BitcoinPrice {
            usd: body.bitcoin.usd,
            idr: body.bitcoin.idr,
        })
    }

    async fn fetch_index(&self) -> Result<IndexQuote> {
        let body: ChartResponse = self.get_json(&self.config.index_url).await?;
        let meta = body
            .chart
            .result
            .into_iter()
            .next()
            .map(|r| r.meta)
            .ok_or_else(|| Error::InvalidData("Empty chart result".into()))?;
        Ok(IndexQuote {
            price: meta.regular_market_price,
            previous_close: meta.chart_previous_close,
        })
    }
}
