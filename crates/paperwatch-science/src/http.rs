use std::time::{Duration, Instant};

use reqwest::header::HeaderMap;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::warn;

use crate::error::{Result, ScienceError};

// ─── BackoffPolicy ────────────────────────────────────────────────────────────

/// Retry schedule applied to HTTP 429 responses only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub max_retries: u32,
    pub base: Duration,
}

impl BackoffPolicy {
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            base: Duration::ZERO,
        }
    }

    pub fn exponential(max_retries: u32, base: Duration) -> Self {
        Self { max_retries, base }
    }

    /// `base * 2^attempt`: 30s, 60s, 120s for a 30s base.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::none()
    }
}

// ─── RateLimitedClient ────────────────────────────────────────────────────────

pub struct RateLimitedClient {
    client: reqwest::Client,
    source: String,
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
    backoff: BackoffPolicy,
}

impl RateLimitedClient {
    pub fn new(
        source: &str,
        min_interval: Duration,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .gzip(true)
            .build()?;
        Ok(Self {
            client,
            source: source.to_string(),
            min_interval,
            last_request: Mutex::new(None),
            backoff: BackoffPolicy::none(),
        })
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    async fn wait_for_rate_limit(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(t) = *last {
            let elapsed = t.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// Sends the request built by `build`, replaying it on 429 per the backoff policy.
    async fn send(&self, build: impl Fn() -> RequestBuilder) -> Result<Response> {
        let mut attempt = 0u32;
        loop {
            self.wait_for_rate_limit().await;
            let resp = build().send().await?;
            if resp.status() != StatusCode::TOO_MANY_REQUESTS {
                return Ok(resp);
            }
            if attempt >= self.backoff.max_retries {
                return Err(ScienceError::RateLimit(self.source.clone(), attempt));
            }
            let wait = self.backoff.delay(attempt);
            warn!(
                source = %self.source,
                attempt = attempt + 1,
                max = self.backoff.max_retries,
                "rate limited, waiting {}s",
                wait.as_secs()
            );
            sleep(wait).await;
            attempt += 1;
        }
    }

    async fn read_body(&self, url: &str, resp: Response) -> Result<String> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ScienceError::ApiError(
                self.source.clone(),
                format!("HTTP {} for {url}: {}", status.as_u16(), truncate(&body, 200)),
            ));
        }
        resp.text().await.map_err(ScienceError::Http)
    }

    pub async fn get(&self, url: &str) -> Result<String> {
        self.get_with_headers(url, HeaderMap::new()).await
    }

    pub async fn get_with_headers(&self, url: &str, headers: HeaderMap) -> Result<String> {
        let resp = self
            .send(|| self.client.get(url).headers(headers.clone()))
            .await?;
        self.read_body(url, resp).await
    }

    /// GET that maps 404 to `None`, with a per-request timeout override.
    pub async fn get_optional(&self, url: &str, timeout: Duration) -> Result<Option<String>> {
        let resp = self
            .send(|| self.client.get(url).timeout(timeout))
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        self.read_body(url, resp).await.map(Some)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let text = self.get(url).await?;
        serde_json::from_str(&text).map_err(|e| ScienceError::Parse(e.to_string()))
    }

    pub async fn post_json_with_headers<B: Serialize, R: DeserializeOwned>(
        &self,
        url: &str,
        body: &B,
        headers: HeaderMap,
    ) -> Result<R> {
        let resp = self
            .send(|| self.client.post(url).headers(headers.clone()).json(body))
            .await?;
        let text = self.read_body(url, resp).await?;
        serde_json::from_str(&text).map_err(|e| ScienceError::Parse(e.to_string()))
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Server;

    fn client(backoff: BackoffPolicy) -> RateLimitedClient {
        RateLimitedClient::new("test", Duration::ZERO, Duration::from_secs(5), "paperwatch-test")
            .unwrap()
            .with_backoff(backoff)
    }

    #[test]
    fn backoff_doubles_each_attempt() {
        let policy = BackoffPolicy::exponential(3, Duration::from_secs(30));
        assert_eq!(policy.delay(0), Duration::from_secs(30));
        assert_eq!(policy.delay(1), Duration::from_secs(60));
        assert_eq!(policy.delay(2), Duration::from_secs(120));
    }

    #[tokio::test]
    async fn rate_limit_exhausts_retries() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/limited")
            .with_status(429)
            .expect(3)
            .create_async()
            .await;

        let client = client(BackoffPolicy::exponential(2, Duration::ZERO));
        let err = client
            .get(&format!("{}/limited", server.url()))
            .await
            .unwrap_err();

        assert!(matches!(err, ScienceError::RateLimit(ref s, 2) if s == "test"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn no_backoff_fails_on_first_429() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/limited")
            .with_status(429)
            .expect(1)
            .create_async()
            .await;

        let err = client(BackoffPolicy::none())
            .get(&format!("{}/limited", server.url()))
            .await
            .unwrap_err();

        assert!(matches!(err, ScienceError::RateLimit(_, 0)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_success_is_api_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/boom")
            .with_status(500)
            .with_body("oops")
            .create_async()
            .await;

        let err = client(BackoffPolicy::none())
            .get(&format!("{}/boom", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, ScienceError::ApiError(_, ref msg) if msg.contains("HTTP 500")));
    }

    #[tokio::test]
    async fn optional_get_maps_404_to_none() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;

        let out = client(BackoffPolicy::none())
            .get_optional(&format!("{}/missing", server.url()), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(out.is_none());
    }
}
