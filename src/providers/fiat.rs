use crate::core::config::FiatProviderConfig;
use crate::core::rates::{RateSample, RateSource};
use crate::providers::util::{get_json, http_client};
use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, instrument};

/// Fiat exchange rates from a currencylayer style API.
pub struct FiatSource {
    base_url: String,
    access_key: String,
    interval: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<i64>,
    info: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    success: bool,
    #[serde(default)]
    currencies: HashMap<String, String>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct LiveResponse {
    success: bool,
    source: Option<String>,
    #[serde(default)]
    quotes: HashMap<String, f64>,
    error: Option<ApiError>,
}

fn api_failure(error: Option<ApiError>) -> anyhow::Error {
    match error {
        Some(ApiError { code, info }) => anyhow!(
            "Fiat API error {}: {}",
            code.unwrap_or_default(),
            info.unwrap_or_else(|| "no details".to_string())
        ),
        None => anyhow!("Fiat API reported failure"),
    }
}

impl FiatSource {
    pub fn new(config: &FiatProviderConfig, access_key: &str) -> Result<Self> {
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_key: access_key.to_string(),
            interval: Duration::from_secs(config.interval_secs),
            client: http_client()?,
        })
    }
}

#[async_trait]
impl RateSource for FiatSource {
    fn name(&self) -> &str {
        "fiat"
    }

    fn poll_interval(&self) -> Duration {
        self.interval
    }

    #[instrument(skip(self))]
    async fn list_currencies(&self) -> Result<Vec<String>> {
        let url = format!("{}/list?access_key={}", self.base_url, self.access_key);
        let response: ListResponse = get_json(&self.client, &url).await?;
        if !response.success {
            return Err(api_failure(response.error));
        }
        let mut codes: Vec<String> = response.currencies.into_keys().collect();
        codes.sort();
        debug!("Fiat API lists {} currencies", codes.len());
        Ok(codes)
    }

    /// Quotes are units of each currency per one unit of the API's source
    /// currency, so every sample is the inverse quote in that source.
    #[instrument(skip(self, codes), fields(count = codes.len()))]
    async fn fetch_rates(&self, codes: &[String]) -> Result<Vec<RateSample>> {
        let url = format!(
            "{}/live?access_key={}&currencies={}",
            self.base_url,
            self.access_key,
            codes.join(",")
        );
        let response: LiveResponse = get_json(&self.client, &url).await?;
        if !response.success {
            return Err(api_failure(response.error));
        }
        let Some(source) = response.source else {
            bail!("Fiat API response has no source currency");
        };

        let mut samples: Vec<RateSample> = response
            .quotes
            .into_iter()
            .filter_map(|(pair, quote)| {
                let code = pair.strip_prefix(source.as_str())?;
                if code.is_empty() || code == source || quote <= 0.0 {
                    return None;
                }
                Some(RateSample::new(code, 1.0 / quote, source.as_str()))
            })
            .collect();
        samples.sort_by(|a, b| a.code.cmp(&b.code));
        debug!("Fetched {} fiat rates", samples.len());
        Ok(samples)
    }
}
