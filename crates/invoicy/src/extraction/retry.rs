//! HTTP-level retry for model calls.
//!
//! One attempt is supplied as a closure so image and PDF payloads share the
//! same loop.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::config::TransportConfig;

use super::error::ExtractionError;

/// Statuses that mean "try again later".
pub const RETRYABLE_STATUSES: [u16; 3] = [429, 503, 529];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub fallback_base: Duration,
}

impl RetryPolicy {
    /// Wait before retrying after `attempt` (zero-based) failed.
    pub fn delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        retry_after.unwrap_or(self.fallback_base * (attempt + 1))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            fallback_base: Duration::from_secs(15),
        }
    }
}

impl From<&TransportConfig> for RetryPolicy {
    fn from(config: &TransportConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            fallback_base: Duration::from_secs(config.fallback_base_secs),
        }
    }
}

/// What one HTTP attempt came back with.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub retry_after: Option<Duration>,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Parses a `retry-after` header given in whole seconds.
pub fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    value
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

pub async fn send_with_retry<F, Fut>(
    policy: &RetryPolicy,
    mut attempt_fn: F,
) -> Result<String, ExtractionError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<RawResponse, ExtractionError>>,
{
    let mut last_status = 0;

    for attempt in 0..policy.max_retries {
        let response = attempt_fn().await?;

        if response.is_success() {
            return Ok(response.body);
        }

        if !RETRYABLE_STATUSES.contains(&response.status) {
            return Err(ExtractionError::Fatal(format!(
                "model API returned status {}: {}",
                response.status, response.body
            )));
        }

        last_status = response.status;
        if attempt + 1 == policy.max_retries {
            break;
        }
        let wait = policy.delay(attempt, response.retry_after);
        warn!(
            status = response.status,
            attempt = attempt + 1,
            wait_secs = wait.as_secs_f64(),
            "Model API busy, retrying"
        );
        tokio::time::sleep(wait).await;
    }

    Err(ExtractionError::RateLimited {
        attempts: policy.max_retries,
        last_status,
    })
}
