use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::future::Future;
use std::time::Duration;
use tracing::debug;

pub const RETRIES: usize = 3;
pub const RETRY_DELAY_MS: u64 = 500;

/// Retries an async operation a bounded number of times.
///
/// Total runs are one initial attempt plus `retries`, `delay_ms` apart.
pub async fn with_retry<F, Fut, T, E>(mut operation: F, retries: usize, delay_ms: u64) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Into<anyhow::Error>,
{
    let mut attempt = 1;
    loop {
        match operation().await.map_err(Into::<anyhow::Error>::into) {
            Ok(val) => return Ok(val),
            Err(err) => {
                if attempt > retries {
                    return Err(err);
                }
                debug!("Attempt {attempt}/{retries} failed: {err}. Retrying...");
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}

pub fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("mathpad/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to build HTTP client")
}

/// Query parameters whose values never reach logs or error messages.
const SECRET_PARAMS: &[&str] = &["access_key", "api_key", "apikey", "key", "token"];

/// `url` with the values of secret query parameters masked.
pub fn redact_url(url: &str) -> String {
    let Ok(mut parsed) = reqwest::Url::parse(url) else {
        return "<invalid url>".to_string();
    };
    let pairs: Vec<(String, String)> = parsed
        .query_pairs()
        .map(|(name, value)| {
            let value = if SECRET_PARAMS.contains(&name.as_ref()) {
                "REDACTED".to_string()
            } else {
                value.into_owned()
            };
            (name.into_owned(), value)
        })
        .collect();
    if !pairs.is_empty() {
        parsed.query_pairs_mut().clear().extend_pairs(&pairs);
    }
    parsed.to_string()
}

/// GETs `url` with retries and decodes the JSON body.
///
/// Non-success statuses are errors and are retried like transport failures.
/// Errors and logs only ever show the redacted url.
pub async fn get_json<T: DeserializeOwned>(client: &reqwest::Client, url: &str) -> Result<T> {
    let shown = redact_url(url);
    debug!("Requesting {shown}");
    let response = with_retry(
        || async {
            client
                .get(url)
                .send()
                .await
                .and_then(reqwest::Response::error_for_status)
                .map_err(reqwest::Error::without_url)
        },
        RETRIES,
        RETRY_DELAY_MS,
    )
    .await
    .with_context(|| format!("Request failed: {shown}"))?;

    let text = response
        .text()
        .await
        .map_err(reqwest::Error::without_url)
        .with_context(|| format!("Failed to read response from {shown}"))?;
    serde_json::from_str(&text)
        .with_context(|| format!("Unexpected response from {shown}: '{}'", truncate(&text, 200)))
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}
