// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Error taxonomy for batched operations.
//!
//! Every variant of [`BatchError`] is a terminal outcome for one caller. The
//! engine never retries; wrap the transport in
//! [`RetryTransport`](crate::resilience::retry::RetryTransport) if submission
//! failures should be retried before they reach callers.

use thiserror::Error;

/// Failure of the transport call itself, independent of any single entry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The request never produced a response (connection reset, DNS, timeout)
    #[error("request failed: {0}")]
    Request(String),
    /// The remote answered with a non-success status
    #[error("remote returned status {status}: {message}")]
    Status { status: u16, message: String },
    /// The response body could not be decoded into entries
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl TransportError {
    /// Whether submitting the same payload again might succeed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Request(_) => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Malformed(_) => false,
        }
    }
}

/// Outcome error delivered to a single caller's [`Completion`](crate::Completion).
///
/// `F` is the strategy's per-entry failure detail.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError<F> {
    /// The batch response explicitly marked this item as failed
    #[error("item rejected: {0}")]
    ItemRejected(F),

    /// The submit call for the batch carrying this item failed
    #[error("batch submission failed: {0}")]
    Transport(#[source] TransportError),

    /// The item was submitted but the response had no entry for it
    #[error("no response entry received for {fingerprint}")]
    UnmatchedResponse { fingerprint: String },

    /// The batcher was torn down before the item completed
    #[error("batcher torn down before completion")]
    Cancelled,

    /// Another caller already has this fingerprint pending
    #[error("fingerprint {fingerprint} is already pending")]
    Conflict { fingerprint: String },

    /// The strategy refused to track the item
    #[error("invalid item: {0}")]
    InvalidItem(String),
}

impl<F> BatchError<F> {
    /// Short label used for metrics and log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ItemRejected(_) => "rejected",
            Self::Transport(_) => "transport",
            Self::UnmatchedResponse { .. } => "unmatched",
            Self::Cancelled => "cancelled",
            Self::Conflict { .. } => "conflict",
            Self::InvalidItem(_) => "invalid",
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Invalid batcher construction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("max_batch_items must be at least 1")]
    ZeroBatchSize,
    #[error("max_wait_ms must be greater than zero when set")]
    ZeroMaxWait,
    #[error("batcher must be created inside a Tokio runtime")]
    NoRuntime,
}
