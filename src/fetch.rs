//! Network acquisition with bounded retry and exponential backoff.
//!
//! Every network-bound read goes through [`RetryingFetcher`], which wraps a
//! [`FetchTransport`] (the thing that actually moves bytes) in a retry loop.
//! Retry is modeled as an explicit state machine rather than nested control
//! flow: [`next_state`] is a pure function from (attempt, error class) to the
//! next [`RetryState`] and delay, which makes the policy testable without a
//! clock or a network.
//!
//! Error classification:
//! - transient (retried): connect failures, timeouts, 5xx, 429
//! - permanent (not retried): 4xx, malformed references
//!
//! Delays grow exponentially from `base_ms`, capped at `cap_ms`, with up to
//! +12.5% multiplicative jitter so a thousand items recovering from the same
//! outage don't hammer the origin in lockstep.

use crate::config::RetryConfig;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    /// Retryable: the next attempt may succeed.
    #[error("transient fetch error: {0}")]
    Transient(String),
    /// Not retryable: the reference itself is bad.
    #[error("permanent fetch error: {0}")]
    Permanent(String),
    /// All attempts used up; the last transient error is carried along.
    #[error("fetch failed after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

impl FetchError {
    fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient(_))
    }
}

/// Transport that actually moves bytes for one reference.
///
/// Implementations report errors pre-classified as transient or permanent;
/// the fetcher never inspects transport internals.
pub trait FetchTransport: Sync {
    fn get(&self, reference: &str) -> Result<Vec<u8>, FetchError>;
}

/// One step of the retry state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryState {
    /// Run attempt number `attempt` (1-based).
    Attempting { attempt: u32 },
    /// Wait `delay`, then run attempt number `attempt`.
    Backoff { attempt: u32, delay: Duration },
    /// All attempts consumed.
    Exhausted,
    Succeeded,
}

/// Decide the state following a failed attempt.
///
/// Pure: no clock, no randomness. Jitter is layered on by the caller so the
/// policy itself stays deterministic and testable.
pub fn next_state(attempt: u32, error: &FetchError, policy: &RetryConfig) -> RetryState {
    if !error.is_transient() || attempt >= policy.max_attempts {
        return RetryState::Exhausted;
    }
    // attempt 1 waits base, attempt 2 waits 2*base, ... capped.
    let exp = attempt.saturating_sub(1).min(31);
    let delay_ms = policy
        .base_ms
        .saturating_mul(1u64 << exp)
        .min(policy.cap_ms.max(policy.base_ms));
    RetryState::Backoff {
        attempt: attempt + 1,
        delay: Duration::from_millis(delay_ms),
    }
}

/// Apply up to +12.5% random jitter to a backoff delay.
fn jittered(delay: Duration) -> Duration {
    delay.mul_f64(1.0 + fastrand::f64() * 0.125)
}

/// Retrying wrapper around a [`FetchTransport`].
pub struct RetryingFetcher<T: FetchTransport> {
    transport: T,
    policy: RetryConfig,
}

impl<T: FetchTransport> RetryingFetcher<T> {
    pub fn new(transport: T, policy: RetryConfig) -> Self {
        Self { transport, policy }
    }

    /// Fetch `reference`, retrying transient failures with backoff.
    ///
    /// Returns the bytes on success, `Permanent` immediately on a
    /// non-retryable error, or `Exhausted` once attempts run out. Callers
    /// at the phase boundary downgrade either failure to an item-level
    /// `Failed` outcome - a bad reference never aborts the batch.
    pub fn fetch(&self, reference: &str) -> Result<Vec<u8>, FetchError> {
        let mut state = RetryState::Attempting { attempt: 1 };
        let mut last_error = String::new();
        let mut attempts_made = 0;

        loop {
            match state {
                RetryState::Attempting { attempt } => {
                    attempts_made = attempt;
                    match self.transport.get(reference) {
                        Ok(bytes) => return Ok(bytes),
                        Err(err @ FetchError::Permanent(_)) => return Err(err),
                        Err(err) => {
                            last_error = err.to_string();
                            state = next_state(attempt, &err, &self.policy);
                        }
                    }
                }
                RetryState::Backoff { attempt, delay } => {
                    std::thread::sleep(jittered(delay));
                    state = RetryState::Attempting { attempt };
                }
                RetryState::Exhausted => {
                    return Err(FetchError::Exhausted {
                        attempts: attempts_made,
                        last_error,
                    });
                }
                RetryState::Succeeded => unreachable!("success returns directly"),
            }
        }
    }

    pub fn policy(&self) -> &RetryConfig {
        &self.policy
    }
}

/// HTTP transport over a blocking reqwest client.
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();
        Self { client }
    }

    fn classify(err: reqwest::Error) -> FetchError {
        if err.is_timeout() || err.is_connect() {
            return FetchError::Transient(err.to_string());
        }
        match err.status() {
            Some(status) if status.is_server_error() || status.as_u16() == 429 => {
                FetchError::Transient(err.to_string())
            }
            Some(_) => FetchError::Permanent(err.to_string()),
            None => FetchError::Transient(err.to_string()),
        }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl FetchTransport for HttpTransport {
    fn get(&self, reference: &str) -> Result<Vec<u8>, FetchError> {
        if !reference.starts_with("http://") && !reference.starts_with("https://") {
            return Err(FetchError::Permanent(format!(
                "not an http(s) reference: {reference}"
            )));
        }
        let response = self
            .client
            .get(reference)
            .send()
            .map_err(Self::classify)?
            .error_for_status()
            .map_err(Self::classify)?;
        let bytes = response.bytes().map_err(Self::classify)?;
        Ok(bytes.to_vec())
    }
}
