//! HTTP fetching with retries, backoff, and politeness
//!
//! The engine owns all network I/O: adapters only ever see fetched page
//! bodies. One `Fetcher` exists per site worker, so requests to a given
//! site are serialized by construction; the fetcher enforces the minimum
//! inter-request delay and a process-wide request ceiling on top of that.

use crate::config::CrawlConfig;
use crate::error::{Error, Result};
use governor::{Quota, RateLimiter};
use nonzero_ext::nonzero;
use rand::Rng;
use reqwest::Client;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

/// Process-wide requests-per-second ceiling shared by all site workers
pub struct GlobalLimiter {
    limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl GlobalLimiter {
    pub fn new(requests_per_second: u32) -> Self {
        let rps = NonZeroU32::new(requests_per_second).unwrap_or(nonzero!(1u32));
        Self {
            limiter: RateLimiter::direct(Quota::per_second(rps)),
        }
    }

    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

/// Minimum-interval gate for one site, with adaptive widening.
///
/// Repeated server errors raise the effective delay in increments; each
/// success decays it back toward the configured base.
struct PolitenessGate {
    last_request: Option<Instant>,
    delay: Duration,
    base_delay: Duration,
    max_delay: Duration,
    increment: Duration,
    error_threshold: u32,
    consecutive_errors: u32,
    adaptive: bool,
}

impl PolitenessGate {
    fn new(delay_ms: u64, cfg: &CrawlConfig) -> Self {
        let base = Duration::from_millis(delay_ms);
        Self {
            last_request: None,
            delay: base,
            base_delay: base,
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            increment: Duration::from_millis(cfg.delay_increment_ms),
            error_threshold: cfg.error_threshold.max(1),
            consecutive_errors: 0,
            adaptive: cfg.adaptive_delay,
        }
    }

    async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.delay {
                let wait = self.delay - elapsed;
                trace!("Politeness: waiting {:?}", wait);
                tokio::time::sleep(wait).await;
            }
        }
        self.last_request = Some(Instant::now());
    }

    fn on_success(&mut self) {
        self.consecutive_errors = 0;
        if self.delay > self.base_delay {
            self.delay = self
                .base_delay
                .max(self.delay.saturating_sub(Duration::from_millis(100)));
        }
    }

    fn on_server_error(&mut self) {
        self.consecutive_errors += 1;
        if self.adaptive && self.consecutive_errors >= self.error_threshold {
            let steps = (self.consecutive_errors / self.error_threshold) as u32;
            let widened = self.base_delay + self.increment * steps;
            self.delay = widened.min(self.max_delay);
            debug!(
                "Raised politeness delay to {:?} after {} consecutive errors",
                self.delay, self.consecutive_errors
            );
        }
    }
}

/// Per-site fetcher: retries with capped, jittered exponential backoff
pub struct Fetcher {
    client: Client,
    global: Arc<GlobalLimiter>,
    gate: PolitenessGate,
    max_retries: u32,
    retry_base: Duration,
    retry_max: Duration,
}

impl Fetcher {
    pub fn new(
        cfg: &CrawlConfig,
        politeness_delay_ms: u64,
        max_retries: u32,
        global: Arc<GlobalLimiter>,
    ) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&cfg.user_agent)
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Network(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            global,
            gate: PolitenessGate::new(politeness_delay_ms, cfg),
            max_retries: max_retries.max(1),
            retry_base: Duration::from_secs(cfg.retry_base_secs),
            retry_max: Duration::from_secs(cfg.retry_max_secs),
        })
    }

    /// Fetch a page body.
    ///
    /// 404 is terminal; 5xx and transport errors retry with exponential
    /// backoff until `max_retries` is exhausted, which yields a network
    /// error the engine treats as aborting the novel.
    pub async fn fetch(&mut self, url: &str) -> Result<String> {
        let mut last_error = String::new();

        for attempt in 0..self.max_retries {
            self.global.wait().await;
            self.gate.wait().await;

            debug!("Fetching: {} (attempt {})", url, attempt + 1);

            match self.client.get(url).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        match response.text().await {
                            Ok(body) => {
                                self.gate.on_success();
                                return Ok(body);
                            }
                            Err(e) => {
                                last_error = format!("body read failed: {}", e);
                            }
                        }
                    } else if status.as_u16() == 404 {
                        return Err(Error::NotFound(url.to_string()));
                    } else if status.is_server_error() {
                        last_error = format!("HTTP {}", status);
                        self.gate.on_server_error();
                        warn!(
                            "Server error {} for {}, attempt {}/{}",
                            status,
                            url,
                            attempt + 1,
                            self.max_retries
                        );
                    } else {
                        last_error = format!("HTTP {}", status);
                        warn!("Unexpected status {} for {}", status, url);
                    }
                }
                Err(e) => {
                    last_error = e.to_string();
                    debug!("Transport error for {}: {}", url, e);
                }
            }

            if attempt + 1 < self.max_retries {
                tokio::time::sleep(self.backoff_wait(attempt)).await;
            }
        }

        Err(Error::Network(format!(
            "{} failed after {} attempts: {}",
            url, self.max_retries, last_error
        )))
    }

    /// Capped exponential backoff with jitter
    fn backoff_wait(&self, attempt: u32) -> Duration {
        let exp = self
            .retry_base
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.retry_max);
        let jitter = Duration::from_millis(rand::thread_rng().gen_range(0..250));
        exp + jitter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher_for_tests(max_retries: u32) -> Fetcher {
        let mut cfg = CrawlConfig::default();
        cfg.timeout_secs = 5;
        cfg.retry_base_secs = 0;
        cfg.retry_max_secs = 0;
        Fetcher::new(&cfg, 1, max_retries, Arc::new(GlobalLimiter::new(1000))).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
            .mount(&server)
            .await;

        let mut fetcher = fetcher_for_tests(3);
        let body = fetcher.fetch(&format!("{}/page", server.uri())).await.unwrap();
        assert_eq!(body, "hello");
    }

    #[tokio::test]
    async fn test_fetch_404_is_terminal() {
        let server = MockServer::start().await;
        let guard = Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount_as_scoped(&server)
            .await;

        let mut fetcher = fetcher_for_tests(5);
        let err = fetcher
            .fetch(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        // No retries were burned on a page that cannot recover
        assert_eq!(guard.received_requests().await.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_string("recovered"))
            .mount(&server)
            .await;

        let mut fetcher = fetcher_for_tests(5);
        let body = fetcher.fetch(&format!("{}/flaky", server.uri())).await.unwrap();
        assert_eq!(body, "recovered");
    }

    #[tokio::test]
    async fn test_fetch_exhausts_retries() {
        let server = MockServer::start().await;
        let guard = Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(503))
            .mount_as_scoped(&server)
            .await;

        let mut fetcher = fetcher_for_tests(3);
        let err = fetcher.fetch(&format!("{}/down", server.uri())).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));
        assert_eq!(guard.received_requests().await.len(), 3);
    }

    #[tokio::test]
    async fn test_politeness_gate_spacing() {
        let mut cfg = CrawlConfig::default();
        cfg.adaptive_delay = false;
        let mut gate = PolitenessGate::new(50, &cfg);

        let start = std::time::Instant::now();
        gate.wait().await;
        gate.wait().await;
        gate.wait().await;
        // Two enforced intervals of 50ms
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[test]
    fn test_adaptive_delay_widens_and_decays() {
        let cfg = CrawlConfig::default();
        let mut gate = PolitenessGate::new(1000, &cfg);

        for _ in 0..cfg.error_threshold {
            gate.on_server_error();
        }
        assert!(gate.delay > gate.base_delay);

        let widened = gate.delay;
        gate.on_success();
        assert!(gate.delay < widened);
        assert_eq!(gate.consecutive_errors, 0);
    }
}
