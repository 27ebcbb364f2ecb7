//! Bounded retry and wall-clock timeout around a single request
//!
//! Only transient failures are retried: transport errors without a status and
//! 5xx responses. Anything else (including 4xx) fails on the first attempt.

use crate::error::{BoxError, RequestError};
use std::future::Future;
use std::time::Duration;
use tokio_retry::strategy::FixedInterval;
use tokio_retry::RetryIf;
use tracing::{debug, warn};

/// Pause between two attempts
const RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Header GitHub uses to report the remaining request quota
const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";

/// Anything that may carry an HTTP status: responses and transport errors
pub trait HttpStatus {
    fn http_status(&self) -> Option<u16>;

    /// True for 403/429 answers whose quota header reads zero
    fn rate_limit_exhausted(&self) -> bool {
        false
    }
}

impl HttpStatus for reqwest::Response {
    fn http_status(&self) -> Option<u16> {
        Some(self.status().as_u16())
    }

    fn rate_limit_exhausted(&self) -> bool {
        matches!(self.status().as_u16(), 403 | 429)
            && self
                .headers()
                .get(RATE_LIMIT_REMAINING_HEADER)
                .and_then(|value| value.to_str().ok())
                .is_some_and(|remaining| remaining.trim() == "0")
    }
}

impl HttpStatus for reqwest::Error {
    fn http_status(&self) -> Option<u16> {
        self.status().map(|status| status.as_u16())
    }
}

/// Invoke `request_fn` up to `try_limits` times
///
/// 200 and 201 return immediately. Transient failures are retried; any other
/// outcome ends the loop and is returned as the error. When every attempt
/// fails the last error is returned.
pub async fn send_request_with_retry<F, Fut, R, E>(
    mut request_fn: F,
    try_limits: usize,
) -> Result<R, RequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, E>>,
    R: HttpStatus,
    E: HttpStatus + Into<BoxError>,
{
    if try_limits == 0 {
        return Err(RequestError::NotSent);
    }

    let strategy = FixedInterval::new(RETRY_INTERVAL).take(try_limits - 1);
    let mut attempt = 0usize;

    RetryIf::spawn(
        strategy,
        || {
            attempt += 1;
            debug!(attempt, try_limits, "sending request");
            let request = request_fn();
            async move { classify(request.await) }
        },
        |err: &RequestError| {
            let retry = err.is_transient();
            if retry {
                debug!(error = %err, "transient request failure, retrying");
            }
            retry
        },
    )
    .await
}

/// [`send_request_with_retry`] bounded by a wall-clock budget
///
/// When the budget runs out the pending attempt is dropped and
/// [`RequestError::Timeout`] is returned instead of the network error.
pub async fn send_request_with_timeout<F, Fut, R, E>(
    request_fn: F,
    timeout: Duration,
    try_limits: usize,
) -> Result<R, RequestError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<R, E>>,
    R: HttpStatus,
    E: HttpStatus + Into<BoxError>,
{
    match tokio::time::timeout(timeout, send_request_with_retry(request_fn, try_limits)).await {
        Ok(result) => result,
        Err(_) => {
            warn!(timeout_ms = timeout.as_millis() as u64, "request timed out");
            Err(RequestError::Timeout { timeout })
        }
    }
}

fn classify<R, E>(outcome: Result<R, E>) -> Result<R, RequestError>
where
    R: HttpStatus,
    E: HttpStatus + Into<BoxError>,
{
    match outcome {
        Ok(response) => match response.http_status() {
            Some(200 | 201) => Ok(response),
            Some(status) if response.rate_limit_exhausted() => {
                Err(RequestError::RateLimited { status })
            }
            Some(status) => Err(RequestError::Status { status }),
            None => Err(RequestError::Network {
                status: None,
                source: "response carried no status".into(),
            }),
        },
        Err(err) => {
            let status = err.http_status();
            Err(RequestError::Network {
                status,
                source: err.into(),
            })
        }
    }
}
