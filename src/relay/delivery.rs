use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use super::signature;

/// Default maximum delivery attempts per event (initial + 2 retries).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default per-attempt HTTP timeout.
pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(15);

/// Exponential backoff base and cap (milliseconds): 1s, 2s, 4s, ... capped at 10s.
const BACKOFF_BASE_MS: u64 = 1000;
const BACKOFF_CAP_MS: u64 = 10_000;

const USER_AGENT: &str = "courier/1.0";

/// Abstraction over retry waits for testability.
/// Real implementation: `TokioSleeper`. Tests record delays instead of waiting.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Outcome of a single HTTP attempt, deciding whether the loop continues.
enum AttemptOutcome {
    Success,
    /// Receiver said the request itself is unacceptable; retrying cannot help.
    Terminal(String),
    Retryable(String),
}

/// Delivers signed webhook payloads with bounded retries.
///
/// One engine is shared across all jobs; per-job state (URL, secret) is
/// passed per call. Delivery is best-effort: the caller learns success or
/// failure but exhausted retries are not queued anywhere.
#[derive(Clone)]
pub struct DeliveryEngine {
    http_client: Client,
    attempt_timeout: Duration,
    max_attempts: u32,
    sleeper: Arc<dyn Sleeper>,
}

impl DeliveryEngine {
    /// Create a new delivery engine with a shared HTTP client.
    pub fn new(attempt_timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(attempt_timeout)
            .user_agent(USER_AGENT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            attempt_timeout,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Set the maximum delivery attempts.
    pub fn with_max_attempts(mut self, max: u32) -> Self {
        self.max_attempts = max.max(1);
        self
    }

    /// Substitute the sleep implementation (used by tests).
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// POST `body` to `url`, retrying transient failures with exponential
    /// backoff. Returns whether any attempt was accepted with a 2xx.
    ///
    /// The signature is computed once over the exact bytes sent; every
    /// attempt carries the same body and the same `X-Signature` value.
    pub async fn deliver(&self, url: &str, body: &[u8], signing_secret: Option<&str>) -> bool {
        let sig = signing_secret.map(|secret| signature::sign(secret, body));

        for attempt in 1..=self.max_attempts {
            if attempt > 1 {
                let delay = next_delay(attempt - 2);
                tracing::debug!(
                    target: "webhook_delivery",
                    url = %url,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "Waiting before retry"
                );
                self.sleeper.sleep(delay).await;
            }

            match self.attempt(url, body, sig.as_deref(), attempt).await {
                AttemptOutcome::Success => {
                    tracing::info!(
                        target: "webhook_delivery",
                        url = %url,
                        attempt,
                        signed = sig.is_some(),
                        "Webhook delivery succeeded"
                    );
                    return true;
                }
                AttemptOutcome::Terminal(error) => {
                    tracing::warn!(
                        target: "webhook_delivery",
                        url = %url,
                        attempt,
                        error = %error,
                        "Webhook delivery rejected by receiver"
                    );
                    return false;
                }
                AttemptOutcome::Retryable(error) => {
                    tracing::warn!(
                        target: "webhook_delivery",
                        url = %url,
                        attempt,
                        error = %error,
                        has_next_retry = attempt < self.max_attempts,
                        "Webhook delivery attempt failed"
                    );
                }
            }
        }

        false
    }

    /// Execute a single HTTP POST and classify the result.
    async fn attempt(
        &self,
        url: &str,
        body: &[u8],
        sig: Option<&str>,
        attempt: u32,
    ) -> AttemptOutcome {
        let mut request = self
            .http_client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("X-Delivery-Attempt", attempt.to_string())
            .body(body.to_vec());
        if let Some(sig) = sig {
            request = request.header("X-Signature", sig);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    AttemptOutcome::Success
                } else if status.is_client_error() {
                    AttemptOutcome::Terminal(format!("HTTP {}", status.as_u16()))
                } else {
                    AttemptOutcome::Retryable(format!("HTTP {}", status.as_u16()))
                }
            }
            Err(e) => {
                let error = if e.is_timeout() {
                    format!("Request timeout ({}s)", self.attempt_timeout.as_secs())
                } else if e.is_connect() {
                    format!("Connection failed: {e}")
                } else {
                    format!("Request error: {e}")
                };
                AttemptOutcome::Retryable(error)
            }
        }
    }
}

/// Delay before the given retry (0-based): 1s, 2s, 4s, ... capped at 10s.
pub fn next_delay(retry: u32) -> Duration {
    let ms = BACKOFF_BASE_MS
        .saturating_mul(2u64.saturating_pow(retry))
        .min(BACKOFF_CAP_MS);
    Duration::from_millis(ms)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
