//! HTTP middleware for retry logic

use std::{io, thread, time::Duration};

use reqwest::Method;
use tracing::{debug, warn};

use crate::{
    config::HttpConfig,
    error::HttpError,
    outcome::{self, FailureKind},
    Result,
};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum retry attempts after the first one
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Backoff multiplier
    pub backoff_multiplier: f64,
    /// Retry non-idempotent requests that may already have been sent
    pub retry_sent_requests: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            initial_delay: Duration::ZERO,
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            retry_sent_requests: true,
        }
    }
}

impl RetryConfig {
    /// Retry settings carried by a client configuration
    pub fn from_http_config(config: &HttpConfig) -> Self {
        Self {
            max_attempts: config.max_retry_times,
            initial_delay: config.retry_delay,
            retry_sent_requests: config.retry_sent_requests,
            ..Default::default()
        }
    }

    /// Calculate delay for given attempt number
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay.as_millis() as f64
            * self.backoff_multiplier.powi(attempt as i32);

        let delay = Duration::from_millis(delay_ms as u64);
        std::cmp::min(delay, self.max_delay)
    }
}

/// Whether `method` can be repeated without changing server state.
pub fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::TRACE | Method::PUT | Method::DELETE
    )
}

/// Decide whether a failed attempt may be repeated.
///
/// Only connection-level I/O failures qualify: resets, aborts, broken
/// pipes and peers that closed before answering. Timeouts, refused
/// connections, TLS failures and anything that produced a response are
/// final. Non-idempotent requests are repeated after a connection was
/// established only when `retry_sent_requests` is set.
pub fn is_retryable(error: &HttpError, method: &Method, retry_sent_requests: bool) -> bool {
    let HttpError::RequestFailed(err) = error else {
        return false;
    };

    if FailureKind::classify(error) != FailureKind::Unknown {
        return false;
    }
    if err.is_builder() || err.is_redirect() || err.is_decode() {
        return false;
    }
    if outcome::is_tls_failure(err) || !is_transient_io(err) {
        return false;
    }

    is_idempotent(method) || retry_sent_requests || err.is_connect()
}

fn is_transient_io(err: &reqwest::Error) -> bool {
    let io_transient = outcome::io_kinds(err).any(|kind| {
        matches!(
            kind,
            io::ErrorKind::ConnectionReset
                | io::ErrorKind::ConnectionAborted
                | io::ErrorKind::BrokenPipe
                | io::ErrorKind::UnexpectedEof
        )
    });

    io_transient
        || outcome::chain(err)
            .filter_map(|e| e.downcast_ref::<hyper::Error>())
            .any(|e| e.is_incomplete_message() || e.is_closed() || e.is_canceled())
}

/// Retry middleware for HTTP operations
#[derive(Debug, Clone)]
pub struct RetryMiddleware {
    config: RetryConfig,
}

impl RetryMiddleware {
    /// Create new retry middleware
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Execute operation with retry logic, blocking between attempts
    pub fn execute<F, T>(&self, method: &Method, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut attempt = 0;

        loop {
            match operation() {
                Ok(result) => {
                    if attempt > 0 {
                        debug!("Request succeeded after {attempt} retries");
                    }
                    return Ok(result);
                }
                Err(e) => {
                    if !is_retryable(&e, method, self.config.retry_sent_requests) {
                        debug!("Non-retryable error: {e}");
                        return Err(e);
                    }

                    if attempt >= self.config.max_attempts {
                        if attempt == 0 {
                            return Err(e);
                        }
                        return Err(HttpError::RetryLimitExceeded {
                            attempts: attempt + 1,
                            last: Box::new(e),
                        });
                    }

                    let delay = self.config.calculate_delay(attempt);
                    warn!(
                        "Request failed (attempt {}/{}), retrying in {:?}: {}",
                        attempt + 1,
                        self.config.max_attempts + 1,
                        delay,
                        e
                    );
                    if !delay.is_zero() {
                        thread::sleep(delay);
                    }
                    attempt += 1;
                }
            }
        }
    }
}
