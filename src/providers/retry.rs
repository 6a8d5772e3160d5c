/*!
 * Retry policy shared by every translation client.
 *
 * A request is attempted at most `1 + max_retries` times. Retry `n`
 * (zero-based) waits `backoff_time * 2^n` first. Context-limit and fatal
 * errors are returned from the first attempt that raises them. The
 * cancellation flag is checked before and after every call and wait, and a
 * cancelled request yields `Ok(None)`.
 */

use async_trait::async_trait;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::time::{Duration, Instant};

use super::{TranslationClient, TranslationPrompt};
use crate::errors::ClientError;
use crate::providers::{FinishReason, Translation};
use crate::translation::CancellationFlag;

/// Connection and retry settings for a client.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    /// API key, if the provider needs one
    pub api_key: Option<String>,

    /// Model identifier
    pub model: Option<String>,

    /// Base URL of the provider, if not the vendor default
    pub endpoint: Option<String>,

    /// Retries after the first attempt
    pub max_retries: u32,

    /// Base delay for exponential backoff
    pub backoff_time: Duration,

    /// Limit for a single attempt
    pub timeout: Option<Duration>,

    /// Requests per minute
    pub rate_limit: Option<u32>,

    /// Sampling temperature
    pub temperature: f32,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            model: None,
            endpoint: None,
            max_retries: 5,
            backoff_time: Duration::from_secs(4),
            timeout: Some(Duration::from_secs(120)),
            rate_limit: None,
            temperature: 0.0,
        }
    }
}

impl ClientSettings {
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_backoff_time(mut self, backoff_time: Duration) -> Self {
        self.backoff_time = backoff_time;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_rate_limit(mut self, rate_limit: Option<u32>) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    /// Delay before zero-based retry `retry`.
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.backoff_time.saturating_mul(factor)
    }

    /// Minimum spacing between requests implied by the rate limit.
    pub fn min_request_interval(&self) -> Option<Duration> {
        match self.rate_limit {
            Some(rate_limit) if rate_limit > 0 => Some(Duration::from_millis(60_000 / rate_limit as u64)),
            _ => None,
        }
    }
}

/// Source of backoff waits.
#[async_trait]
pub trait BackoffTimer: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Backoff timer backed by the tokio clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

#[async_trait]
impl BackoffTimer for TokioTimer {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Enforces a minimum interval between the requests of one client.
#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_request: Mutex::new(None),
        }
    }

    /// Build a limiter from the settings' requests-per-minute value.
    pub fn from_settings(settings: &ClientSettings) -> Option<Self> {
        settings.min_request_interval().map(Self::new)
    }

    /// Wait until the next request is allowed, then claim the slot.
    pub async fn acquire(&self) {
        let wait = {
            let mut last = self.last_request.lock();
            let now = Instant::now();
            let wait = last
                .map(|previous| self.interval.saturating_sub(now.duration_since(previous)))
                .unwrap_or(Duration::ZERO);
            *last = Some(now + wait);
            wait
        };

        if !wait.is_zero() {
            debug!("Rate limit: waiting {} ms", wait.as_millis());
            tokio::time::sleep(wait).await;
        }
    }
}

/// Run `client.send_request` under the retry policy.
pub async fn request_with_retry<C>(
    client: &C,
    prompt: &TranslationPrompt,
    temperature: f32,
    cancel: &CancellationFlag,
) -> Result<Option<Translation>, ClientError>
where
    C: TranslationClient + ?Sized,
{
    let settings = client.settings();

    if let Some(limit) = client.model_info().await.and_then(|info| info.input_token_limit) {
        let estimated = client.estimate_tokens(prompt);
        if estimated >= limit {
            warn!(
                "{}: prompt of ~{} tokens does not fit the model limit of {}",
                client.name(),
                estimated,
                limit
            );
            return Err(ClientError::ContextLimit {
                prompt_tokens: estimated,
                limit,
            });
        }
    }

    let max_attempts = settings.max_retries.saturating_add(1);
    let mut attempt: u32 = 0;

    loop {
        if cancel.is_cancelled() {
            info!("{}: request cancelled", client.name());
            return Ok(None);
        }

        if let Some(limiter) = client.rate_limiter() {
            limiter.acquire().await;
        }

        attempt += 1;
        debug!("{}: attempt {}/{}", client.name(), attempt, max_attempts);

        let result = match settings.timeout {
            Some(timeout) => tokio::time::timeout(timeout, client.send_request(prompt, temperature))
                .await
                .unwrap_or_else(|_| {
                    Err(ClientError::Timeout {
                        timeout_ms: timeout.as_millis() as u64,
                    })
                }),
            None => client.send_request(prompt, temperature).await,
        };

        if cancel.is_cancelled() {
            info!("{}: request cancelled", client.name());
            return Ok(None);
        }

        let error = match result {
            Ok(translation) if translation.finish_reason.is_failure() => {
                if client.is_fatal_finish(&translation.finish_reason) {
                    return Err(ClientError::Impossible(format!(
                        "response ended with finish reason '{}'",
                        translation.finish_reason
                    )));
                }
                ClientError::IncompleteResponse {
                    message: format!("response ended with finish reason '{}'", translation.finish_reason),
                    finish_reason: translation.finish_reason,
                }
            }
            Ok(translation) => {
                if let FinishReason::Other(reason) = &translation.finish_reason {
                    warn!("{}: unrecognised finish reason '{}'", client.name(), reason);
                }
                return Ok(Some(translation));
            }
            Err(error) => error,
        };

        if error.is_context_limit() || error.is_fatal() || !error.is_retryable() {
            return Err(error);
        }

        if attempt >= max_attempts {
            return Err(ClientError::RetriesExhausted {
                attempts: attempt,
                last: Box::new(error),
            });
        }

        let delay = client.settings().backoff_delay(attempt - 1);
        warn!(
            "{}: {} (attempt {}/{}), retrying in {} ms",
            client.name(),
            error,
            attempt,
            max_attempts,
            delay.as_millis()
        );

        if cancel.is_cancelled() {
            return Ok(None);
        }
        client.timer().sleep(delay).await;
    }
}
