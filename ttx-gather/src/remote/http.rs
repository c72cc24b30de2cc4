//! HTTP fetcher with rate limiting and transient-failure retries
//!
//! Requests are paced by a token bucket shared by every task using the
//! fetcher. 429 and 5xx responses and transport errors are retried with
//! exponential backoff; any other non-success status fails immediately.

use super::{FetchError, FetchTarget, Fetcher, RawContent};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, StatusCode};
use std::num::NonZeroU32;
use std::time::Duration;
use ttx_common::config::{RemoteSection, DEFAULT_BASE_URL};

const DEFAULT_REQUESTS_PER_SECOND: u32 = 2;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 500;

/// HTTP fetcher settings
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    pub base_url: String,
    pub requests_per_second: NonZeroU32,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub user_agent: String,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            requests_per_second: NonZeroU32::new(DEFAULT_REQUESTS_PER_SECOND)
                .unwrap_or(NonZeroU32::MIN),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            user_agent: default_user_agent(),
        }
    }
}

impl HttpFetcherConfig {
    /// Apply the `[remote]` TOML section on top of the defaults
    pub fn from_section(section: &RemoteSection) -> Self {
        let defaults = Self::default();
        Self {
            base_url: section.base_url.clone().unwrap_or(defaults.base_url),
            requests_per_second: section
                .requests_per_second
                .and_then(NonZeroU32::new)
                .unwrap_or(defaults.requests_per_second),
            timeout: section
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_attempts: section.max_attempts.unwrap_or(defaults.max_attempts).max(1),
            user_agent: section.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }
}

fn default_user_agent() -> String {
    format!("ttx/{}", env!("CARGO_PKG_VERSION"))
}

/// reqwest-backed [`Fetcher`]
pub struct HttpFetcher {
    client: Client,
    base_url: String,
    max_attempts: u32,
    rate_limiter: DefaultDirectRateLimiter,
}

impl HttpFetcher {
    pub fn new(config: HttpFetcherConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(config.timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            max_attempts: config.max_attempts.max(1),
            rate_limiter: RateLimiter::direct(Quota::per_second(config.requests_per_second)),
        })
    }

    /// URL for a fetch target
    pub fn url_for(&self, target: &FetchTarget) -> String {
        match target {
            FetchTarget::ListingIndex => format!("{}/talks/quick-list", self.base_url),
            FetchTarget::ListingPage(page) => {
                format!("{}/talks/quick-list?page={}", self.base_url, page)
            }
            FetchTarget::Talk(id) if id.is_numeric() => {
                format!("{}/talks/view/id/{}", self.base_url, id)
            }
            FetchTarget::Talk(id) => format!("{}/talks/{}", self.base_url, id),
            FetchTarget::Transcript { page_url, facet } => {
                let page = page_url.split(['?', '#']).next().unwrap_or(page_url);
                format!("{}/transcript?language={}", page.trim_end_matches('/'), facet)
            }
        }
    }

    fn backoff(attempt: u32) -> Duration {
        Duration::from_millis(BACKOFF_BASE_MS << (attempt.saturating_sub(1)).min(6))
    }

    fn is_retryable(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, target: &FetchTarget) -> Result<RawContent, FetchError> {
        let url = self.url_for(target);
        let mut last = String::new();

        for attempt in 1..=self.max_attempts {
            self.rate_limiter.until_ready().await;
            tracing::debug!(url = %url, attempt, "GET");

            match self.client.get(&url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let final_url = response.url().to_string();
                        match response.text().await {
                            Ok(body) => return Ok(RawContent { url: final_url, body }),
                            Err(e) => last = e.to_string(),
                        }
                    } else if Self::is_retryable(status) {
                        last = format!("HTTP status {}", status.as_u16());
                    } else {
                        return Err(FetchError::Status(status.as_u16()));
                    }
                }
                Err(e) => last = e.to_string(),
            }

            if attempt < self.max_attempts {
                let delay = Self::backoff(attempt);
                tracing::debug!(url = %url, attempt, delay_ms = delay.as_millis() as u64, error = %last, "Retrying request");
                tokio::time::sleep(delay).await;
            }
        }

        Err(FetchError::Exhausted {
            attempts: self.max_attempts,
            last,
        })
    }
}
