//! Which HTTP failures are worth another attempt.

use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Attempts made for one request before giving up.
pub const MAX_RETRIES: usize = 3;

/// Pause between attempts.
pub const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Failures another attempt will not fix.
#[derive(Error, Debug)]
pub enum NonRetryableError {
    #[error("rate limited by {0}, try again later")]
    RateLimited(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("request rejected by {url} with HTTP {status}")]
    Rejected { url: String, status: u16 },
}

/// Classify a failed request. `Ok(())` means the failure is transient.
pub fn classify_error(error: &reqwest::Error) -> Result<(), NonRetryableError> {
    let url = error
        .url()
        .map(|u| u.to_string())
        .unwrap_or_else(|| "server".to_string());

    match error.status() {
        Some(StatusCode::TOO_MANY_REQUESTS) => Err(NonRetryableError::RateLimited(url)),
        Some(StatusCode::NOT_FOUND) => Err(NonRetryableError::NotFound(url)),
        Some(status) if status.is_client_error() => Err(NonRetryableError::Rejected {
            url,
            status: status.as_u16(),
        }),
        // 5xx, connection errors and timeouts
        _ => Ok(()),
    }
}

/// Wrap a failure from `error_for_status()` so the retry loop can tell
/// transient errors from permanent ones.
pub fn check_retryable(error: reqwest::Error) -> anyhow::Error {
    match classify_error(&error) {
        Ok(()) => anyhow::Error::from(error),
        Err(permanent) => anyhow::Error::from(permanent),
    }
}
