use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;

use crate::error::LlmError;

/// How often and how long to wait before resending a request the server asked us to back off on.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub(crate) const fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }

    /// `Retry-After` (in seconds) wins over exponential backoff. Both are capped at `max_delay`.
    fn delay(&self, response: &reqwest::Response, attempt: u32) -> Duration {
        let hinted = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let delay = hinted.unwrap_or_else(|| self.base_delay.saturating_mul(1 << attempt.min(16)));
        delay.min(self.max_delay)
    }
}

fn is_transient(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
    )
}

/// Send a request, resending it on 429 and 503 until `policy.max_retries` is used up.
///
/// Any other response, successful or not, is handed back to the caller.
///
/// # Errors
///
/// Returns `LlmError::RateLimited` or `LlmError::Unavailable` when the last attempt is still
/// throttled, and `LlmError::Http` for transport failures.
pub(crate) async fn send_with_retry<F, Fut>(
    backend: &str,
    policy: RetryPolicy,
    mut send: F,
) -> Result<reqwest::Response, LlmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<reqwest::Response, reqwest::Error>>,
{
    let mut attempt = 0;
    loop {
        let response = send().await.map_err(LlmError::Http)?;
        let status = response.status();
        if !is_transient(status) {
            return Ok(response);
        }
        if attempt >= policy.max_retries {
            return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                LlmError::RateLimited
            } else {
                LlmError::Unavailable
            });
        }

        let delay = policy.delay(&response, attempt);
        attempt += 1;
        tracing::warn!(
            backend,
            %status,
            attempt,
            max_retries = policy.max_retries,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "backing off"
        );
        tokio::time::sleep(delay).await;
    }
}
