// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Correlating a batch response back to the callers that are waiting on it.
//!
//! Only entries carried by the batch being settled are ever completed, so a
//! response can never complete an item that belongs to a later batch, and a
//! duplicated response entry can never complete the same item twice.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::error::{BatchError, TransportError};
use crate::pending::PendingTable;
use crate::strategy::BatchStrategy;

/// Per-batch settlement counts
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Items in the batch
    pub total: usize,
    /// Items resolved with a value
    pub succeeded: usize,
    /// Items the response marked as failed
    pub rejected: usize,
    /// Items with no response entry
    pub unmatched: usize,
    /// Response entries that matched no outstanding member of the batch
    pub stray_entries: usize,
}

impl DispatchReport {
    /// Every member got its own entry and nothing stray came back.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.unmatched == 0 && self.stray_entries == 0
    }
}

type Table<S> = PendingTable<
    <S as BatchStrategy>::Fingerprint,
    <S as BatchStrategy>::Value,
    <S as BatchStrategy>::Failure,
>;

/// Settle batch `batch_id` from its response entries.
pub fn dispatch_response<S: BatchStrategy>(
    strategy: &S,
    pending: &mut Table<S>,
    batch_id: u64,
    members: &[S::Fingerprint],
    entries: Vec<S::Entry>,
) -> DispatchReport {
    let mut report = DispatchReport { total: members.len(), ..Default::default() };
    let mut outstanding: HashSet<&S::Fingerprint> = members.iter().collect();

    for entry in entries {
        let fingerprint = strategy.response_fingerprint(&entry);
        if !outstanding.remove(&fingerprint) {
            report.stray_entries += 1;
            warn!(batch_id, fingerprint = ?fingerprint, "Response entry matches no outstanding batch member");
            continue;
        }
        let outcome = strategy.classify(entry).map_err(BatchError::ItemRejected);
        match pending.take_in_batch(&fingerprint, batch_id) {
            Some(handle) => {
                if outcome.is_ok() {
                    report.succeeded += 1;
                } else {
                    report.rejected += 1;
                }
                handle.complete(outcome);
            }
            None => {
                report.stray_entries += 1;
                warn!(batch_id, fingerprint = ?fingerprint, "Batch member no longer pending");
            }
        }
    }

    for fingerprint in members.iter().filter(|fp| outstanding.contains(fp)) {
        if let Some(handle) = pending.take_in_batch(fingerprint, batch_id) {
            report.unmatched += 1;
            warn!(batch_id, fingerprint = ?fingerprint, "No response entry for batch member");
            handle.complete(Err(BatchError::UnmatchedResponse {
                fingerprint: format!("{:?}", fingerprint),
            }));
        }
    }

    debug!(
        batch_id,
        total = report.total,
        succeeded = report.succeeded,
        rejected = report.rejected,
        unmatched = report.unmatched,
        stray = report.stray_entries,
        "Batch dispatched"
    );
    report
}

/// Reject every still-pending member of batch `batch_id` with the transport error.
pub fn fail_batch<S: BatchStrategy>(
    pending: &mut Table<S>,
    batch_id: u64,
    members: &[S::Fingerprint],
    error: &TransportError,
) -> usize {
    let mut failed = 0;
    for fingerprint in members {
        if let Some(handle) = pending.take_in_batch(fingerprint, batch_id) {
            handle.complete(Err(BatchError::Transport(error.clone())));
            failed += 1;
        }
    }
    failed
}
