use std::time::Duration;

use reqwest::{Client, StatusCode};
use url::Url;

use crate::config::FetchConfig;
use crate::error::{AppError, Result};

pub struct PageFetcher {
    client: Client,
    max_retries: u32,
    backoff: Duration,
}

enum Attempt {
    Retryable(String),
    Fatal(String),
}

impl PageFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| AppError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.backoff_ms),
        })
    }

    /// Fetch a page as text. Connection failures, timeouts, 429 and 5xx
    /// responses are retried with exponential backoff; anything else fails
    /// on the first attempt.
    pub async fn fetch(&self, url: &Url) -> Result<String> {
        let mut attempt = 0;
        loop {
            let reason = match self.fetch_once(url).await {
                Ok(body) => {
                    tracing::debug!(url = %url, bytes = body.len(), "Fetched page");
                    return Ok(body);
                }
                Err(Attempt::Fatal(reason)) => reason,
                Err(Attempt::Retryable(reason)) if attempt < self.max_retries => {
                    let backoff = self.backoff * 2u32.pow(attempt);
                    tracing::warn!(
                        url = %url,
                        attempt = attempt + 1,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        %reason,
                        "Fetch failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                    continue;
                }
                Err(Attempt::Retryable(reason)) => reason,
            };

            return Err(AppError::Fetch {
                url: url.to_string(),
                reason,
            });
        }
    }

    async fn fetch_once(&self, url: &Url) -> std::result::Result<String, Attempt> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let reason = format!("HTTP {}", status);
            return Err(if is_transient(status) {
                Attempt::Retryable(reason)
            } else {
                Attempt::Fatal(reason)
            });
        }

        response.text().await.map_err(classify)
    }
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn classify(err: reqwest::Error) -> Attempt {
    if err.is_timeout() || err.is_connect() || err.is_request() {
        Attempt::Retryable(err.to_string())
    } else {
        Attempt::Fatal(err.to_string())
    }
}
