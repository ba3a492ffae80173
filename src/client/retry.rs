//! Bounded retry with exponential back-off for a single gateway request.

use super::transport::{HttpRequest, HttpResponse, Transport};
use crate::config::RetryConfig;
use crate::error::{Error, Result};
use std::time::Duration;
use tracing::{debug, warn};

/// How often and how patiently one request is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts including the first. Zero is treated as one.
    pub max_attempts: u32,
    /// Delay after a transient failure, and the base of the rate-limit back-off.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay(),
        }
    }
}

impl RetryPolicy {
    /// Back-off before retrying after the rate-limited attempt `attempt` (0-based).
    ///
    /// `base_delay * 2^attempt`, saturating.
    #[must_use]
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Send `request`, retrying rate limits and transient failures.
///
/// - 429: wait [`RetryPolicy::backoff_delay`] and retry.
/// - transport error or 5xx: wait `base_delay` and retry.
/// - any other status: returned as is, including 4xx.
///
/// # Errors
///
/// Returns [`Error::AllRetriesExhausted`] once every attempt has failed.
pub async fn send_with_retry(
    transport: &dyn Transport,
    request: &HttpRequest,
    policy: &RetryPolicy,
) -> Result<HttpResponse> {
    let attempts = policy.attempts();
    let mut last_error = None;

    for attempt in 0..attempts {
        let delay = match transport.send(request).await {
            Ok(response) if response.is_rate_limited() => {
                let delay = policy.backoff_delay(attempt);
                warn!(
                    "Rate limited by {} (attempt {}/{}), backing off {:?}",
                    request.url,
                    attempt + 1,
                    attempts,
                    delay
                );
                last_error = Some(Error::RateLimited(request.url.clone()));
                delay
            }
            Ok(response) if response.is_server_error() => {
                warn!(
                    "{} returned {} (attempt {}/{})",
                    request.url,
                    response.status,
                    attempt + 1,
                    attempts
                );
                last_error = Some(Error::TransientNetworkFailure(format!(
                    "{} returned {}",
                    request.url, response.status
                )));
                policy.base_delay
            }
            Ok(response) => return Ok(response),
            Err(e) => {
                warn!(
                    "Request to {} failed (attempt {}/{}): {e}",
                    request.url,
                    attempt + 1,
                    attempts
                );
                last_error = Some(e);
                policy.base_delay
            }
        };

        if attempt + 1 < attempts {
            debug!("Retrying {} in {:?}", request.url, delay);
            tokio::time::sleep(delay).await;
        }
    }

    Err(Error::AllRetriesExhausted {
        url: request.url.clone(),
        attempts,
        last: last_error.map_or_else(|| "no attempt made".to_string(), |e| e.to_string()),
    })
}
