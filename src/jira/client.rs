use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::error::JiraError;
use super::transport::Transport;
use crate::config::{JiraConfig, RetryConfig};

/// Reqwest-backed [`Transport`] with Basic auth and 429 backoff.
pub struct JiraClient {
    client: Client,
    base_url: String,
    email: String,
    api_token: String,
    retry: RetryConfig,
}

impl JiraClient {
    pub fn new(config: &JiraConfig) -> Result<Self, JiraError> {
        Self::with_base_url(
            config.base_url.clone(),
            config.email.clone(),
            config.api_token.clone(),
            config.retry.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Create a client pointing at a custom base URL (useful for testing).
    pub fn with_base_url(
        base_url: String,
        email: String,
        api_token: String,
        retry: RetryConfig,
        timeout: Duration,
    ) -> Result<Self, JiraError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            email,
            api_token,
            retry,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue a request with extra headers layered over the required ones.
    ///
    /// HTTP 429 is retried with exponential backoff up to
    /// `retry.max_retries` times. The wait honors the server's `Retry-After`
    /// but never exceeds `retry.max_delay_ms()`.
    pub async fn request_with_headers(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        overrides: &HeaderMap,
    ) -> Result<Option<Value>, JiraError> {
        let mut attempt = 0;
        loop {
            match self.send_once(method.clone(), path, body, overrides).await {
                Err(JiraError::RateLimited { retry_after_ms })
                    if attempt < self.retry.max_retries =>
                {
                    attempt += 1;
                    let delay_ms = self
                        .retry
                        .delay_for_attempt(attempt)
                        .max(retry_after_ms)
                        .min(self.retry.max_delay_ms());
                    warn!(
                        %method, path, attempt, max = self.retry.max_retries, delay_ms,
                        "rate limited, backing off"
                    );
                    sleep(Duration::from_millis(delay_ms)).await;
                }
                other => return other,
            }
        }
    }

    fn headers(overrides: &HeaderMap) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        for (name, value) in overrides {
            headers.insert(name.clone(), value.clone());
        }
        headers
    }

    async fn send_once(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        overrides: &HeaderMap,
    ) -> Result<Option<Value>, JiraError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "jira request");

        let mut request = self
            .client
            .request(method.clone(), &url)
            .basic_auth(&self.email, Some(&self.api_token))
            .headers(Self::headers(overrides));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status();
        debug!(%method, path, status = status.as_u16(), "jira response");

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs.saturating_mul(1000))
                .unwrap_or(1000);
            return Err(JiraError::RateLimited { retry_after_ms });
        }

        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(JiraError::from_status(status.as_u16(), &text, path, 0));
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| JiraError::Decode(format!("{path}: {e}")))
    }
}

impl Transport for JiraClient {
    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Option<Value>, JiraError> {
        self.request_with_headers(method, path, body, &HeaderMap::new())
            .await
    }
}
