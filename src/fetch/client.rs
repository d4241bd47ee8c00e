use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde_json::Value;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::warn;

pub struct SnapshotClient {
    client: Client,
}

impl SnapshotClient {
    pub fn new(timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self { client }
    }

    /// The exporter serves the snapshot from static hosting behind caches, so
    /// every request carries a `cb=<timestamp>` query parameter.
    fn cache_busted(url: &str) -> String {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        let separator = if url.contains('?') { '&' } else { '?' };
        format!("{}{}cb={}", url, separator, stamp)
    }

    /// Fetch and parse the snapshot document. Transport errors and 5xx
    /// responses retry with backoff, 429 waits out `Retry-After`, any other
    /// non-success status fails immediately. Whatever goes wrong surfaces as
    /// one load error; there is no partial document.
    pub async fn fetch_document(&self, url: &str) -> Result<Value> {
        let target = Self::cache_busted(url);
        let max_retries = 3;

        for attempt in 0..max_retries {
            match self.client.get(&target).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return response
                            .json::<Value>()
                            .await
                            .context("Response body is not valid JSON");
                    } else if status.as_u16() == 429 {
                        let wait = response
                            .headers()
                            .get("Retry-After")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(2u64.pow(attempt as u32));
                        warn!("Rate limited, waiting {}s", wait);
                        tokio::time::sleep(Duration::from_secs(wait)).await;
                        continue;
                    } else if status.as_u16() >= 500 && attempt < max_retries - 1 {
                        let wait = 2u64.pow(attempt as u32);
                        warn!("HTTP {}, retrying in {}s", status, wait);
                        tokio::time::sleep(Duration::from_secs(wait)).await;
                        continue;
                    } else {
                        return Err(anyhow!("HTTP {}", status));
                    }
                }
                Err(e) => {
                    if attempt < max_retries - 1 {
                        let wait = 2u64.pow(attempt as u32);
                        warn!("Request error, retrying in {}s: {}", wait, e);
                        tokio::time::sleep(Duration::from_secs(wait)).await;
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }

        Err(anyhow!("Max retries exceeded"))
    }
}
