// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Teardown: the explicit end of a batcher's lifetime.

use tracing::info;

use crate::error::BatchError;
use crate::metrics;
use crate::strategy::BatchStrategy;

use super::Batcher;

impl<S: BatchStrategy, T> Batcher<S, T> {
    /// Stop the batcher.
    ///
    /// Cancels the worker so no scheduled flush can fire afterwards, rejects
    /// every pending completion (queued or in flight) with
    /// [`BatchError::Cancelled`], and makes every later
    /// [`enqueue`](Self::enqueue) fail fast with the same error.
    ///
    /// Returns the number of fingerprints rejected. Calling it again is a no-op.
    pub fn teardown(&self) -> usize {
        let settled = {
            let mut state = self.shared.state.lock();
            if state.closed {
                None
            } else {
                state.closed = true;
                let discarded = state.queue.clear();
                state.debounce.reset();
                state.in_flight = None;
                Some((state.pending.reject_all(BatchError::Cancelled), discarded))
            }
        };

        // Closed before the abort, so the worker's exit guard has nothing to settle.
        if let Some(worker) = self.worker.lock().take() {
            worker.abort();
        }
        let Some((rejected, discarded)) = settled else {
            return 0;
        };

        let name = self.shared.config.name.as_str();
        metrics::record_outcomes(name, "cancelled", rejected);
        metrics::set_pending_entries(name, 0);
        metrics::set_queued_items(name, 0);
        info!(batcher = %name, rejected, discarded, "Batcher torn down");
        rejected
    }

    #[must_use]
    pub fn is_torn_down(&self) -> bool {
        self.shared.state.lock().closed
    }
}

impl<S: BatchStrategy, T> Drop for Batcher<S, T> {
    fn drop(&mut self) {
        self.teardown();
    }
}
