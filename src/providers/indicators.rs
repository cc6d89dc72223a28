use crate::core::config::IndicatorProviderConfig;
use crate::core::rates::{RateSample, RateSource};
use crate::providers::util::{get_json, http_client};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, instrument};

/// Indicators published in the feed, all quoted in Chilean pesos.
const INDICATORS: &[&str] = &["uf", "utm"];
const QUOTE_CURRENCY: &str = "CLP";

/// Chilean economic indicators (UF, UTM) from indicadoresdeldia.cl.
pub struct IndicatorSource {
    base_url: String,
    interval: Duration,
    start_delay: Duration,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct IndicatorsResponse {
    indicador: HashMap<String, String>,
}

/// Parses a locale formatted money string such as `$28.123,45`.
///
/// `.` groups thousands and `,` separates decimals.
pub fn parse_money(text: &str) -> Result<Decimal> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, ',' | '-'))
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return Err(anyhow!("No amount in {text:?}"));
    }
    Decimal::from_str(&cleaned).with_context(|| format!("Invalid amount {text:?}"))
}

impl IndicatorSource {
    pub fn new(config: &IndicatorProviderConfig) -> Result<Self> {
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            interval: Duration::from_secs(config.interval_secs),
            start_delay: Duration::from_secs(config.start_delay_secs),
            client: http_client()?,
        })
    }
}

#[async_trait]
impl RateSource for IndicatorSource {
    fn name(&self) -> &str {
        "indicators"
    }

    fn poll_interval(&self) -> Duration {
        self.interval
    }

    fn start_delay(&self) -> Duration {
        self.start_delay
    }

    async fn list_currencies(&self) -> Result<Vec<String>> {
        Ok(INDICATORS.iter().map(|key| key.to_uppercase()).collect())
    }

    #[instrument(skip(self, codes))]
    async fn fetch_rates(&self, codes: &[String]) -> Result<Vec<RateSample>> {
        let url = format!("{}/webservice/indicadores.json", self.base_url);
        let response: IndicatorsResponse = get_json(&self.client, &url).await?;

        let mut samples = Vec::with_capacity(codes.len());
        for code in codes {
            let key = code.to_lowercase();
            let raw = response
                .indicador
                .get(&key)
                .with_context(|| format!("Indicator {key} missing from response"))?;
            let amount = parse_money(raw)?
                .to_f64()
                .with_context(|| format!("Indicator {key} out of range: {raw}"))?;
            samples.push(RateSample::new(code.clone(), amount, QUOTE_CURRENCY));
        }
        debug!("Fetched {} indicators", samples.len());
        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_money() {
        assert_eq!(parse_money("$28.123,45").unwrap(), Decimal::new(2812345, 2));
        assert_eq!(parse_money("$46.972").unwrap(), Decimal::new(46972, 0));
        assert_eq!(parse_money("1.234.567,8").unwrap(), Decimal::new(12345678, 1));
        assert_eq!(parse_money("-$3,5").unwrap(), Decimal::new(-35, 1));
        assert!(parse_money("$").is_err());
        assert!(parse_money("1,2,3").is_err());
    }

    fn source(server: &MockServer) -> IndicatorSource {
        IndicatorSource::new(&IndicatorProviderConfig {
            base_url: server.uri(),
            interval_secs: 3600,
            start_delay_secs: 3,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_fetch_indicators() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/webservice/indicadores.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "date": "2024-01-02",
                "indicador": {"uf": "$36.790,35", "utm": "$64.666", "ipc": "0,5%"}
            })))
            .mount(&server)
            .await;

        let source = source(&server);
        assert_eq!(source.start_delay(), Duration::from_secs(3));
        let codes = source.list_currencies().await.unwrap();
        assert_eq!(codes, vec!["UF", "UTM"]);

        let samples = source.fetch_rates(&codes).await.unwrap();
        assert_eq!(
            samples,
            vec![
                RateSample::new("UF", 36790.35, "CLP"),
                RateSample::new("UTM", 64666.0, "CLP"),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_indicator_fails_the_poll() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/webservice/indicadores.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "indicador": {"uf": "$36.790,35"}
            })))
            .mount(&server)
            .await;

        let err = source(&server)
            .fetch_rates(&["UF".to_string(), "UTM".to_string()])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Indicator utm missing from response");
    }
}
