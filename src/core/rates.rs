//! Rate feed abstractions

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A conversion rate: one unit of the sampled code is worth `amount` of `unit`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rate {
    pub amount: f64,
    pub unit: String,
}

impl Rate {
    pub fn new(amount: f64, unit: impl Into<String>) -> Self {
        Self {
            amount,
            unit: unit.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSample {
    pub code: String,
    pub rate: Rate,
}

impl RateSample {
    pub fn new(code: impl Into<String>, amount: f64, unit: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            rate: Rate::new(amount, unit),
        }
    }
}

/// One poll worth of samples from a single source.
#[derive(Debug, Clone)]
pub struct RateBatch {
    pub source: String,
    pub received_at: DateTime<Utc>,
    pub samples: Vec<RateSample>,
}

impl RateBatch {
    pub fn new(source: impl Into<String>, samples: Vec<RateSample>) -> Self {
        Self {
            source: source.into(),
            received_at: Utc::now(),
            samples,
        }
    }
}

#[async_trait]
pub trait RateSource: Send + Sync {
    fn name(&self) -> &str;

    fn poll_interval(&self) -> Duration;

    /// Delay before the first subscription, to stagger rate limited endpoints.
    fn start_delay(&self) -> Duration {
        Duration::ZERO
    }

    async fn list_currencies(&self) -> Result<Vec<String>>;

    async fn fetch_rates(&self, codes: &[String]) -> Result<Vec<RateSample>>;
}

/// Polls `fetch_rates` right away and then every `poll_interval`.
///
/// The stream ends after yielding the first error; resubscribing is up to the caller.
pub fn ticker(
    source: Arc<dyn RateSource>,
    codes: Vec<String>,
) -> BoxStream<'static, Result<RateBatch>> {
    let interval = tokio::time::interval(source.poll_interval().max(Duration::from_millis(1)));
    stream::unfold(
        Some((source, codes, interval)),
        |state| async move {
            let (source, codes, mut interval) = state?;
            interval.tick().await;
            match source.fetch_rates(&codes).await {
                Ok(samples) => {
                    let batch = RateBatch::new(source.name(), samples);
                    Some((Ok(batch), Some((source, codes, interval))))
                }
                Err(e) => Some((Err(e), None)),
            }
        },
    )
    .boxed()
}
