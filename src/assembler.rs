// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Batch assembly: the ordered queue of accepted items and the step that
//! turns a drained prefix of it into a wire payload.
//!
//! # Example
//!
//! ```
//! use batch_engine::BatchQueue;
//! use tokio::time::Instant;
//!
//! let mut queue: BatchQueue<String, String> = BatchQueue::new();
//! queue.push("a".into(), "a".into(), Instant::now());
//! queue.push("b".into(), "b".into(), Instant::now());
//!
//! let drained = queue.drain(10);
//! assert_eq!(drained.fingerprints, vec!["a".to_string(), "b".to_string()]);
//! assert!(queue.is_empty());
//! ```

use std::collections::VecDeque;

use tokio::time::Instant;
use tracing::debug;

use crate::scheduler::FlushReason;
use crate::strategy::BatchStrategy;

#[derive(Debug)]
struct Queued<K, I> {
    fingerprint: K,
    item: I,
    enqueued_at: Instant,
}

/// Items taken off the queue for one batch, in enqueue order.
#[derive(Debug)]
pub struct Drained<K, I> {
    pub fingerprints: Vec<K>,
    pub items: Vec<I>,
}

impl<K, I> Drained<K, I> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Append-only queue of accepted items, cleared from the front by [`drain`](Self::drain).
#[derive(Debug)]
pub struct BatchQueue<K, I> {
    entries: VecDeque<Queued<K, I>>,
}

impl<K, I> Default for BatchQueue<K, I> {
    fn default() -> Self {
        Self { entries: VecDeque::new() }
    }
}

impl<K, I> BatchQueue<K, I> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fingerprint: K, item: I, now: Instant) {
        self.entries.push_back(Queued { fingerprint, item, enqueued_at: now });
    }

    /// Remove up to `limit` items from the front, preserving enqueue order.
    pub fn drain(&mut self, limit: usize) -> Drained<K, I> {
        let count = limit.min(self.entries.len());
        let mut fingerprints = Vec::with_capacity(count);
        let mut items = Vec::with_capacity(count);
        for queued in self.entries.drain(..count) {
            fingerprints.push(queued.fingerprint);
            items.push(queued.item);
        }
        Drained { fingerprints, items }
    }

    /// Drop everything queued. Returns how many items were discarded.
    pub fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        count
    }

    /// Arrival time of the oldest queued item
    #[must_use]
    pub fn oldest(&self) -> Option<Instant> {
        self.entries.front().map(|q| q.enqueued_at)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: PartialEq, I> BatchQueue<K, I> {
    #[must_use]
    pub fn contains(&self, fingerprint: &K) -> bool {
        self.entries.iter().any(|q| &q.fingerprint == fingerprint)
    }
}

/// A batch ready for submission
#[derive(Debug)]
pub struct AssembledBatch<K, P> {
    pub id: u64,
    pub reason: FlushReason,
    /// Members of the batch, in enqueue order
    pub fingerprints: Vec<K>,
    pub payload: P,
}

impl<K, P> AssembledBatch<K, P> {
    #[must_use]
    pub fn len(&self) -> usize {
        self.fingerprints.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fingerprints.is_empty()
    }
}

/// Drain up to `limit` items and run them through the strategy's `prepare`.
pub fn assemble<S: BatchStrategy>(
    strategy: &S,
    queue: &mut BatchQueue<S::Fingerprint, S::Item>,
    limit: usize,
    id: u64,
    reason: FlushReason,
) -> Option<AssembledBatch<S::Fingerprint, S::Payload>> {
    let drained = queue.drain(limit);
    if drained.is_empty() {
        return None;
    }
    debug!(batch_id = id, count = drained.len(), remaining = queue.len(), %reason, "Batch drained");
    let payload = strategy.prepare(drained.items);
    Some(AssembledBatch { id, reason, fingerprints: drained.fingerprints, payload })
}
