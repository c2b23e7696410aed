// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retry logic with exponential backoff for batch submission.
//!
//! The batcher itself never retries: a failed submit is a terminal outcome
//! for every item of the batch. Wrapping the transport in a
//! [`RetryTransport`] moves retries into the collaborator layer, before the
//! batcher ever sees the failure.
//!
//! # Example
//!
//! ```
//! use batch_engine::RetryConfig;
//!
//! // Interactive lookups: retry briefly, then give up
//! let quick = RetryConfig::quick();
//! assert_eq!(quick.max_attempts, 3);
//!
//! // Background sync: tolerate a longer outage
//! let patient = RetryConfig::patient();
//! assert_eq!(patient.max_attempts, 6);
//! ```

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::TransportError;
use crate::transport::BatchTransport;

/// Backoff schedule for retried operations.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub factor: f64,
    /// Total attempts including the first one
    pub max_attempts: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::quick()
    }
}

impl RetryConfig {
    /// Three attempts with fast backoff, for callers waiting on the result.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            factor: 2.0,
        }
    }

    /// Six attempts with backoff capped at 30 seconds.
    #[must_use]
    pub fn patient() -> Self {
        Self {
            max_attempts: 6,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            factor: 2.0,
        }
    }

    /// Fast retry for tests (minimal delays)
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(10),
            factor: 2.0,
        }
    }

    /// Delay to wait after the given (1-based) failed attempt
    #[must_use]
    pub fn delay_after(&self, attempt: usize) -> Duration {
        let mut delay = self.initial_delay;
        for _ in 1..attempt {
            delay = delay.mul_f64(self.factor).min(self.max_delay);
        }
        delay.min(self.max_delay)
    }
}

/// Run `operation` until it succeeds, fails with an error `should_retry`
/// refuses, or runs out of attempts.
pub async fn retry_if<F, Fut, T, E, P>(
    operation_name: &str,
    config: &RetryConfig,
    should_retry: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempts = 0;

    loop {
        match operation().await {
            Ok(val) => {
                if attempts > 0 {
                    info!(operation = operation_name, retries = attempts, "Operation succeeded after retry");
                }
                return Ok(val);
            }
            Err(err) => {
                attempts += 1;
                if attempts >= config.max_attempts || !should_retry(&err) {
                    return Err(err);
                }

                let delay = config.delay_after(attempts);
                warn!(
                    operation = operation_name,
                    attempt = attempts,
                    max_attempts = config.max_attempts,
                    error = %err,
                    ?delay,
                    "Operation failed, retrying"
                );
                sleep(delay).await;
            }
        }
    }
}

/// Retry every failure.
pub async fn retry<F, Fut, T, E>(operation_name: &str, config: &RetryConfig, operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_if(operation_name, config, |_| true, operation).await
}

/// Transport decorator that resubmits a payload on retryable
/// [`TransportError`]s.
pub struct RetryTransport<T> {
    inner: T,
    config: RetryConfig,
}

impl<T> RetryTransport<T> {
    pub fn new(inner: T, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T> BatchTransport for RetryTransport<T>
where
    T: BatchTransport,
    T::Payload: Clone + Sync,
{
    type Payload = T::Payload;
    type Entry = T::Entry;

    async fn submit(&self, payload: Self::Payload) -> Result<Vec<Self::Entry>, TransportError> {
        retry_if("batch_submit", &self.config, TransportError::is_retryable, || {
            self.inner.submit(payload.clone())
        })
        .await
    }
}
