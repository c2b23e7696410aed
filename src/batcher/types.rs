// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the batcher facade.

use crate::scheduler::SchedulerPhase;

/// Point-in-time view of a batcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatcherStats {
    pub phase: SchedulerPhase,
    /// Items waiting for the next batch
    pub queued: usize,
    /// Fingerprints awaiting an outcome (queued or in flight)
    pub pending: usize,
    /// Size of the batch currently in flight
    pub in_flight: Option<usize>,
    /// Batches settled since creation
    pub batches_submitted: u64,
}

impl std::fmt::Display for BatcherStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} (queued={}, pending={}, in_flight={}, batches={})",
            self.phase,
            self.queued,
            self.pending,
            self.in_flight.unwrap_or(0),
            self.batches_submitted
        )
    }
}
