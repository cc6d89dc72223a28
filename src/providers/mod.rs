pub mod crypto;
pub mod fiat;
pub mod indicators;
pub mod util;

use crate::core::config::AppConfig;
use crate::core::rates::RateSource;
use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, warn};

/// Builds the rate sources enabled in `config`.
///
/// The fiat source needs an access key and is skipped without one.
pub fn build_sources(config: &AppConfig) -> Result<Vec<Arc<dyn RateSource>>> {
    let mut sources: Vec<Arc<dyn RateSource>> = Vec::new();

    if let Some(fiat) = &config.providers.fiat {
        match fiat.access_key.as_deref().filter(|key| !key.is_empty()) {
            Some(key) => sources.push(Arc::new(fiat::FiatSource::new(fiat, key)?)),
            None => warn!("Fiat rates disabled: providers.fiat.access_key is not set"),
        }
    }
    if let Some(crypto) = &config.providers.crypto {
        sources.push(Arc::new(crypto::CryptoSource::new(crypto)?));
    }
    if let Some(indicators) = &config.providers.indicators {
        sources.push(Arc::new(indicators::IndicatorSource::new(indicators)?));
    }

    debug!(
        "Rate sources: {:?}",
        sources.iter().map(|s| s.name()).collect::<Vec<_>>()
    );
    Ok(sources)
}
