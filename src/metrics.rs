// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for batchers.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application is responsible for choosing the exporter (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `batch_engine_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `batcher`: the configured batcher name
//! - `reason`: flush trigger (quiet, count, max_wait, leading_edge, manual)
//! - `outcome`: success, rejected, transport, unmatched, cancelled, ...

use metrics::{counter, gauge, histogram};
use std::time::{Duration, Instant};

/// Record an enqueue and how it was handled (queued, coalesced, conflict, invalid, closed)
pub fn record_enqueue(batcher: &str, status: &str) {
    counter!(
        "batch_engine_enqueued_total",
        "batcher" => batcher.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record a batch handed to the transport
pub fn record_batch_submitted(batcher: &str, reason: &str, size: usize) {
    counter!(
        "batch_engine_batches_total",
        "batcher" => batcher.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
    histogram!(
        "batch_engine_batch_size",
        "batcher" => batcher.to_string()
    )
    .record(size as f64);
}

/// Record how long the transport took to answer
pub fn record_submit_latency(batcher: &str, success: bool, duration: Duration) {
    histogram!(
        "batch_engine_submit_seconds",
        "batcher" => batcher.to_string(),
        "status" => if success { "success" } else { "error" }
    )
    .record(duration.as_secs_f64());
}

/// Record item outcomes delivered to callers
pub fn record_outcomes(batcher: &str, outcome: &str, count: usize) {
    if count == 0 {
        return;
    }
    counter!(
        "batch_engine_item_outcomes_total",
        "batcher" => batcher.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(count as u64);
}

/// Record response entries that matched nothing
pub fn record_stray_entries(batcher: &str, count: usize) {
    if count == 0 {
        return;
    }
    counter!(
        "batch_engine_stray_entries_total",
        "batcher" => batcher.to_string()
    )
    .increment(count as u64);
}

/// Set number of fingerprints awaiting an outcome
pub fn set_pending_entries(batcher: &str, count: usize) {
    gauge!(
        "batch_engine_pending_entries",
        "batcher" => batcher.to_string()
    )
    .set(count as f64);
}

/// Set number of items queued for the next batch
pub fn set_queued_items(batcher: &str, count: usize) {
    gauge!(
        "batch_engine_queued_items",
        "batcher" => batcher.to_string()
    )
    .set(count as f64);
}

/// A timing guard that records submit latency on drop
pub struct SubmitTimer {
    batcher: String,
    start: Instant,
    success: bool,
}

impl SubmitTimer {
    pub fn start(batcher: &str) -> Self {
        Self {
            batcher: batcher.to_string(),
            start: Instant::now(),
            success: false,
        }
    }

    pub fn succeeded(&mut self) {
        self.success = true;
    }
}

impl Drop for SubmitTimer {
    fn drop(&mut self) {
        record_submit_latency(&self.batcher, self.success, self.start.elapsed());
    }
}
