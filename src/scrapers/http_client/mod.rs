//! HTTP client with request-level retry and a fixed inter-request delay.

mod response;
mod user_agent;

pub use response::HttpResponse;
pub use user_agent::resolve_user_agent;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};

use super::browser::BrowserCookie;
use crate::config::Config;
use crate::error::ExtractError;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Statuses that mean "slow down", retried with backoff.
fn is_busy(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE
}

/// HTTP client shared by every ladder level of one engine.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    request_delay: Duration,
    retries: u32,
    backoff_base: Duration,
}

impl HttpClient {
    /// Create a client from the portal, timeout and retry settings.
    pub fn new(config: &Config) -> Result<Self, ExtractError> {
        Self::build(config, None)
    }

    /// Create a client that carries cookies from a browser session, so
    /// download links behind a session still resolve.
    pub fn with_cookies(
        config: &Config,
        cookies: &[BrowserCookie],
        origin: &str,
    ) -> Result<Self, ExtractError> {
        let jar = reqwest::cookie::Jar::default();
        if let Ok(url) = origin.parse::<reqwest::Url>() {
            for cookie in cookies.iter().filter(|c| !c.name.is_empty()) {
                let cookie_str = format!(
                    "{}={}; Domain={}; Path={}",
                    cookie.name,
                    cookie.value,
                    cookie.domain,
                    if cookie.path.is_empty() { "/" } else { &cookie.path }
                );
                jar.add_cookie_str(&cookie_str, &url);
            }
        }
        debug!("HTTP client seeded with {} browser cookies", cookies.len());
        Self::build(config, Some(Arc::new(jar)))
    }

    fn build(
        config: &Config,
        jar: Option<Arc<reqwest::cookie::Jar>>,
    ) -> Result<Self, ExtractError> {
        let user_agent = resolve_user_agent(config.portal.user_agent.as_deref());

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        if let Ok(lang) = HeaderValue::from_str(&config.portal.accept_language) {
            headers.insert(ACCEPT_LANGUAGE, lang);
        }

        let mut builder = Client::builder()
            .user_agent(&user_agent)
            .default_headers(headers)
            .timeout(config.timeouts.request())
            .connect_timeout(config.timeouts.connect())
            .gzip(true)
            .brotli(true);
        builder = match jar {
            Some(jar) => builder.cookie_provider(jar),
            None => builder.cookie_store(true),
        };

        let client = builder
            .build()
            .map_err(|e| ExtractError::Http(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            request_delay: config.retry.request_delay(),
            retries: config.retry.request_retries,
            backoff_base: Duration::from_millis(config.retry.request_backoff_ms),
        })
    }

    /// GET with the configured number of retries.
    ///
    /// Timeouts, connection failures and 429/503 are retried with exponential
    /// backoff. Any other status is returned as-is for the caller to judge.
    pub async fn get(&self, url: &str) -> Result<HttpResponse, ExtractError> {
        self.get_with_retries(url, self.retries).await
    }

    /// GET with an explicit retry count (endpoint probing uses fewer).
    pub async fn get_with_retries(
        &self,
        url: &str,
        retries: u32,
    ) -> Result<HttpResponse, ExtractError> {
        let result = self.fetch_with_backoff(url, retries).await;
        // Applied after every page fetch regardless of outcome.
        tokio::time::sleep(self.request_delay).await;
        result
    }

    fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.backoff_base.saturating_mul(factor)
    }

    async fn fetch_with_backoff(
        &self,
        url: &str,
        retries: u32,
    ) -> Result<HttpResponse, ExtractError> {
        let mut attempt = 0;
        loop {
            let outcome = self.fetch_once(url).await;
            let transient = match outcome {
                Ok(response) if is_busy(response.status) => {
                    format!("HTTP {} from {}", response.status.as_u16(), url)
                }
                Ok(response) => return Ok(response),
                Err(e) if e.is_timeout() || e.is_connect() => e.to_string(),
                Err(e) => return Err(ExtractError::Http(e.to_string())),
            };

            if attempt >= retries {
                return Err(ExtractError::Transient(transient));
            }
            let wait = self.backoff(attempt);
            warn!(
                "Request retry {}/{} for {} after {:?}: {}",
                attempt + 1,
                retries,
                url,
                wait,
                transient
            );
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }

    async fn fetch_once(&self, url: &str) -> Result<HttpResponse, reqwest::Error> {
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let status = response.status();
        let final_url = response.url().to_string();

        let mut headers = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.to_string(), v.to_string());
            }
        }

        let body = response.bytes().await?.to_vec();
        Ok(HttpResponse {
            status,
            headers,
            url: final_url,
            body,
        })
    }
}
