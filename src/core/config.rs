use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fmt, fs, path::PathBuf, time::Duration};
use tracing::debug;

#[derive(Deserialize, Serialize, Clone)]
pub struct FiatProviderConfig {
    pub base_url: String,
    pub access_key: Option<String>,
    #[serde(default = "default_fiat_interval")]
    pub interval_secs: u64,
}

// The access key is left out so the config can be logged.
impl fmt::Debug for FiatProviderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FiatProviderConfig")
            .field("base_url", &self.base_url)
            .field(
                "access_key",
                &self.access_key.as_ref().map(|_| "REDACTED"),
            )
            .field("interval_secs", &self.interval_secs)
            .finish()
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CryptoProviderConfig {
    pub base_url: String,
    #[serde(default = "default_crypto_interval")]
    pub interval_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndicatorProviderConfig {
    pub base_url: String,
    #[serde(default = "default_indicator_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_indicator_start_delay")]
    pub start_delay_secs: u64,
}

fn default_fiat_interval() -> u64 {
    60 * 60
}

fn default_crypto_interval() -> u64 {
    3 * 60
}

fn default_indicator_interval() -> u64 {
    60 * 60
}

fn default_indicator_start_delay() -> u64 {
    3
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ProvidersConfig {
    pub fiat: Option<FiatProviderConfig>,
    pub crypto: Option<CryptoProviderConfig>,
    pub indicators: Option<IndicatorProviderConfig>,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        ProvidersConfig {
            fiat: Some(FiatProviderConfig {
                base_url: "http://apilayer.net/api".to_string(),
                access_key: None,
                interval_secs: default_fiat_interval(),
            }),
            crypto: Some(CryptoProviderConfig {
                base_url: "https://api.coincap.io".to_string(),
                interval_secs: default_crypto_interval(),
            }),
            indicators: Some(IndicatorProviderConfig {
                base_url: "http://indicadoresdeldia.cl".to_string(),
                interval_secs: default_indicator_interval(),
                start_delay_secs: default_indicator_start_delay(),
            }),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FormatConfig {
    /// Maximum number of fraction digits shown for a result.
    #[serde(default = "default_precision")]
    pub precision: usize,
    /// Group the integer part in thousands (`1,234,567`).
    #[serde(default = "default_grouping")]
    pub grouping: bool,
}

fn default_precision() -> usize {
    6
}

fn default_grouping() -> bool {
    true
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self {
            precision: default_precision(),
            grouping: default_grouping(),
        }
    }
}

fn default_retry_delay() -> u64 {
    3
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub format: FormatConfig,
    /// Extra function names rejected on top of the builtin deny-list.
    #[serde(default)]
    pub disabled_functions: Vec<String>,
    pub data_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            retry_delay_secs: default_retry_delay(),
            providers: ProvidersConfig::default(),
            format: FormatConfig::default(),
            disabled_functions: Vec::new(),
            data_path: None,
        }
    }
}

impl AppConfig {
    /// Loads the default config file, falling back to defaults when it does not exist.
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        if !config_path.exists() {
            debug!("No config at {}, using defaults", config_path.display());
            return Ok(Self::default());
        }
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("in", "mathpad", "mathpad")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("in", "mathpad", "mathpad")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
retry_delay_secs: 10
providers:
  fiat:
    base_url: "http://example.com/fiat"
    access_key: "secret"
  crypto:
    base_url: "http://example.com/crypto"
    interval_secs: 60
format:
  precision: 2
disabled_functions:
  - random
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.retry_delay(), Duration::from_secs(10));

        let fiat = config.providers.fiat.expect("fiat provider");
        assert_eq!(fiat.base_url, "http://example.com/fiat");
        assert_eq!(fiat.access_key.as_deref(), Some("secret"));
        assert_eq!(fiat.interval_secs, 3600);

        let crypto = config.providers.crypto.expect("crypto provider");
        assert_eq!(crypto.interval_secs, 60);
        assert!(config.providers.indicators.is_none());

        assert_eq!(config.format.precision, 2);
        assert!(config.format.grouping);
        assert_eq!(config.disabled_functions, vec!["random".to_string()]);
        assert!(config.data_path.is_none());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").expect("Failed to deserialize");
        assert_eq!(config.retry_delay_secs, 3);
        assert_eq!(config.format, FormatConfig::default());

        let indicators = config.providers.indicators.expect("indicator provider");
        assert_eq!(indicators.start_delay_secs, 3);
        assert!(config.providers.fiat.expect("fiat").access_key.is_none());
    }

    #[test]
    fn test_debug_output_hides_access_key() {
        let config = AppConfig {
            providers: ProvidersConfig {
                fiat: Some(FiatProviderConfig {
                    base_url: "http://example.com".to_string(),
                    access_key: Some("s3cr3t".to_string()),
                    interval_secs: 60,
                }),
                crypto: None,
                indicators: None,
            },
            ..AppConfig::default()
        };
        let shown = format!("{config:#?}");
        assert!(!shown.contains("s3cr3t"));
        assert!(shown.contains("REDACTED"));
    }

    #[test]
    fn test_legacy_base_currency_key_is_ignored() {
        let config: AppConfig =
            serde_yaml::from_str("base_currency: EUR\nretry_delay_secs: 5").expect("Failed to deserialize");
        assert_eq!(config.retry_delay_secs, 5);
    }

    #[test]
    fn test_load_from_missing_path_fails() {
        let result = AppConfig::load_from_path("/definitely/not/here.yaml");
        assert!(result.is_err());
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }
}
