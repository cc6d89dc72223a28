use crate::core::config::CryptoProviderConfig;
use crate::core::rates::{RateSample, RateSource};
use crate::core::registry::BASE_CURRENCY;
use crate::providers::util::{get_json, http_client};
use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, instrument};

const ASSET_LIMIT: usize = 2000;

/// Crypto asset prices in USD from a CoinCap style API.
pub struct CryptoSource {
    base_url: String,
    interval: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Asset {
    symbol: String,
    price_usd: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AssetsResponse {
    data: Vec<Asset>,
}

impl CryptoSource {
    pub fn new(config: &CryptoProviderConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            interval: Duration::from_secs(config.interval_secs),
            client: http_client()?,
        })
    }

    async fn assets(&self) -> Result<Vec<Asset>> {
        let url = format!("{}/v2/assets?limit={ASSET_LIMIT}", self.base_url);
        let response: AssetsResponse = get_json(&self.client, &url).await?;
        Ok(response.data)
    }
}

#[async_trait]
impl RateSource for CryptoSource {
    fn name(&self) -> &str {
        "crypto"
    }

    fn poll_interval(&self) -> Duration {
        self.interval
    }

    #[instrument(skip(self))]
    async fn list_currencies(&self) -> Result<Vec<String>> {
        let mut seen = HashSet::new();
        let codes: Vec<String> = self
            .assets()
            .await?
            .into_iter()
            .map(|asset| asset.symbol)
            .filter(|symbol| seen.insert(symbol.clone()))
            .collect();
        debug!("Crypto API lists {} assets", codes.len());
        Ok(codes)
    }

    /// The API ranks assets by market cap, so the first asset using a symbol wins.
    #[instrument(skip(self, codes), fields(count = codes.len()))]
    async fn fetch_rates(&self, codes: &[String]) -> Result<Vec<RateSample>> {
        let wanted: HashSet<&str> = codes.iter().map(String::as_str).collect();
        let mut seen = HashSet::new();
        let samples: Vec<RateSample> = self
            .assets()
            .await?
            .into_iter()
            .filter(|asset| wanted.contains(asset.symbol.as_str()))
            .filter_map(|asset| {
                let price: f64 = asset.price_usd.as_deref()?.parse().ok()?;
                seen.insert(asset.symbol.clone())
                    .then(|| RateSample::new(asset.symbol, price, BASE_CURRENCY))
            })
            .collect();
        debug!("Fetched {} crypto prices", samples.len());
        Ok(samples)
    }
}
