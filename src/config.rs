// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for a batcher instance.
//!
//! # Example
//!
//! ```
//! use batch_engine::{BatcherConfig, DuplicatePolicy};
//!
//! // Minimal config (uses defaults)
//! let config = BatcherConfig::default();
//! assert_eq!(config.quiet_window_ms, 500);
//! assert_eq!(config.duplicate_policy, DuplicatePolicy::Coalesce);
//!
//! // Respond to the first event fast, then coalesce the burst
//! let config = BatcherConfig {
//!     name: "presence".into(),
//!     quiet_window_ms: 100,
//!     leading_edge: true,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;

/// What to do when an item is enqueued while another item with the same
/// fingerprint is still pending.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Share the existing entry: one wire entry, every caller gets its outcome
    #[default]
    Coalesce,
    /// Fail the later caller with [`BatchError::Conflict`](crate::BatchError::Conflict)
    Reject,
}

/// Configuration for a [`Batcher`](crate::Batcher).
#[derive(Debug, Clone, Deserialize)]
pub struct BatcherConfig {
    /// Name used in log fields and metric labels
    #[serde(default = "default_name")]
    pub name: String,

    /// Flush once no item has been enqueued for this long
    #[serde(default = "default_quiet_window_ms")]
    pub quiet_window_ms: u64,

    /// Flush a burst that keeps trickling in after it has collected this long
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: Option<u64>,

    /// Flush as soon as this many items are queued; also caps the batch size
    #[serde(default = "default_max_batch_items")]
    pub max_batch_items: usize,

    /// Flush the first item of a burst immediately
    #[serde(default)]
    pub leading_edge: bool,

    #[serde(default)]
    pub duplicate_policy: DuplicatePolicy,
}

fn default_name() -> String { "batcher".to_string() }
fn default_quiet_window_ms() -> u64 { 500 }
fn default_max_wait_ms() -> Option<u64> { Some(1500) }
fn default_max_batch_items() -> usize { 50 }

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            quiet_window_ms: default_quiet_window_ms(),
            max_wait_ms: default_max_wait_ms(),
            max_batch_items: default_max_batch_items(),
            leading_edge: false,
            duplicate_policy: DuplicatePolicy::default(),
        }
    }
}

impl BatcherConfig {
    /// Check the config for values the scheduler cannot honor.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_batch_items == 0 {
            return Err(ConfigError::ZeroBatchSize);
        }
        if self.max_wait_ms == Some(0) {
            return Err(ConfigError::ZeroMaxWait);
        }
        Ok(())
    }

    #[must_use]
    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.quiet_window_ms)
    }

    #[must_use]
    pub fn max_wait(&self) -> Option<Duration> {
        self.max_wait_ms.map(Duration::from_millis)
    }
}
