// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Pending table: outstanding completions keyed by fingerprint.
//!
//! An entry exists from the moment an item is accepted until its outcome is
//! delivered. Entries are removed from the table *before* their waiters are
//! woken, so a caller reacting to its outcome never observes a stale entry.
//!
//! Under [`DuplicatePolicy::Coalesce`] one entry may carry several waiters;
//! all of them receive the same outcome.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::warn;

use crate::config::DuplicatePolicy;
use crate::error::BatchError;

/// Final result for one enqueued item.
pub type Outcome<V, F> = Result<V, BatchError<F>>;

/// Future returned by [`Batcher::enqueue`](crate::Batcher::enqueue).
///
/// Resolves exactly once. If the batcher goes away without completing the
/// entry, resolves to [`BatchError::Cancelled`].
#[must_use = "a completion does nothing unless awaited"]
pub struct Completion<V, F> {
    inner: CompletionInner<V, F>,
}

enum CompletionInner<V, F> {
    Waiting(oneshot::Receiver<Outcome<V, F>>),
    Ready(Option<Outcome<V, F>>),
}

impl<V, F> Completion<V, F> {
    pub(crate) fn ready(outcome: Outcome<V, F>) -> Self {
        Self { inner: CompletionInner::Ready(Some(outcome)) }
    }

    fn waiting(rx: oneshot::Receiver<Outcome<V, F>>) -> Self {
        Self { inner: CompletionInner::Waiting(rx) }
    }
}

// Never structurally pinned: the receiver is Unpin and the ready value is moved out.
impl<V, F> Unpin for Completion<V, F> {}

impl<V, F> Future for Completion<V, F> {
    type Output = Outcome<V, F>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.get_mut().inner {
            CompletionInner::Waiting(rx) => match Pin::new(rx).poll(cx) {
                Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
                Poll::Ready(Err(_)) => Poll::Ready(Err(BatchError::Cancelled)),
                Poll::Pending => Poll::Pending,
            },
            CompletionInner::Ready(outcome) => {
                Poll::Ready(outcome.take().unwrap_or(Err(BatchError::Cancelled)))
            }
        }
    }
}

impl<V, F> fmt::Debug for Completion<V, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.inner {
            CompletionInner::Waiting(_) => "waiting",
            CompletionInner::Ready(_) => "ready",
        };
        f.debug_struct("Completion").field("state", &state).finish()
    }
}

/// Result of [`PendingTable::track`].
#[derive(Debug)]
pub enum Tracked<V, F> {
    /// A fresh entry; the item must be queued
    New(Completion<V, F>),
    /// Joined an entry that is already pending; the item must not be queued again
    Joined(Completion<V, F>),
}

/// Completion handle for one fingerprint.
pub struct PendingEntry<V, F> {
    waiters: Vec<oneshot::Sender<Outcome<V, F>>>,
    created_at: Instant,
    batch: Option<u64>,
}

impl<V: Clone, F: Clone> PendingEntry<V, F> {
    /// Deliver `outcome` to every waiter. Returns how many were still listening.
    pub fn complete(self, outcome: Outcome<V, F>) -> usize {
        let last = self.waiters.len().saturating_sub(1);
        let mut outcome = Some(outcome);
        let mut delivered = 0;
        for (i, tx) in self.waiters.into_iter().enumerate() {
            let value = if i == last { outcome.take() } else { outcome.clone() };
            if let Some(value) = value {
                if tx.send(value).is_ok() {
                    delivered += 1;
                }
            }
        }
        delivered
    }
}

impl<V, F> PendingEntry<V, F> {
    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    #[must_use]
    pub fn waiters(&self) -> usize {
        self.waiters.len()
    }

    /// Batch currently carrying this entry, if it has been drained
    #[must_use]
    pub fn batch(&self) -> Option<u64> {
        self.batch
    }
}

pub struct PendingTable<K, V, F> {
    entries: HashMap<K, PendingEntry<V, F>>,
}

impl<K, V, F> Default for PendingTable<K, V, F> {
    fn default() -> Self {
        Self { entries: HashMap::new() }
    }
}

impl<K, V, F> PendingTable<K, V, F>
where
    K: Eq + Hash + Clone + fmt::Debug,
    V: Clone,
    F: Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking `fingerprint` and hand back the caller's completion.
    pub fn track(&mut self, fingerprint: K, policy: DuplicatePolicy) -> Result<Tracked<V, F>, BatchError<F>> {
        let (tx, rx) = oneshot::channel();
        if let Some(entry) = self.entries.get_mut(&fingerprint) {
            return match policy {
                DuplicatePolicy::Coalesce => {
                    entry.waiters.push(tx);
                    Ok(Tracked::Joined(Completion::waiting(rx)))
                }
                DuplicatePolicy::Reject => Err(BatchError::Conflict {
                    fingerprint: format!("{:?}", fingerprint),
                }),
            };
        }
        self.entries.insert(
            fingerprint,
            PendingEntry { waiters: vec![tx], created_at: Instant::now(), batch: None },
        );
        Ok(Tracked::New(Completion::waiting(rx)))
    }

    /// Record that `fingerprint` travels in `batch`.
    pub fn assign(&mut self, fingerprint: &K, batch: u64) {
        if let Some(entry) = self.entries.get_mut(fingerprint) {
            entry.batch = Some(batch);
        }
    }

    pub fn resolve(&mut self, fingerprint: &K, value: V) -> bool {
        self.complete(fingerprint, Ok(value))
    }

    pub fn reject(&mut self, fingerprint: &K, error: BatchError<F>) -> bool {
        self.complete(fingerprint, Err(error))
    }

    /// Remove and complete the entry. Unknown fingerprints are logged, not fatal.
    pub fn complete(&mut self, fingerprint: &K, outcome: Outcome<V, F>) -> bool {
        match self.entries.remove(fingerprint) {
            Some(entry) => {
                entry.complete(outcome);
                true
            }
            None => {
                warn!(fingerprint = ?fingerprint, "No pending entry for fingerprint, ignoring outcome");
                false
            }
        }
    }

    /// Remove the entry only if it is carried by `batch`.
    pub fn take_in_batch(&mut self, fingerprint: &K, batch: u64) -> Option<PendingEntry<V, F>> {
        match self.entries.get(fingerprint) {
            Some(entry) if entry.batch == Some(batch) => self.entries.remove(fingerprint),
            _ => None,
        }
    }

    /// Complete every entry with `error` and clear the table.
    pub fn reject_all(&mut self, error: BatchError<F>) -> usize {
        let count = self.entries.len();
        for (_, entry) in self.entries.drain() {
            entry.complete(Err(error.clone()));
        }
        count
    }

    #[must_use]
    pub fn contains(&self, fingerprint: &K) -> bool {
        self.entries.contains_key(fingerprint)
    }

    #[must_use]
    pub fn get(&self, fingerprint: &K) -> Option<&PendingEntry<V, F>> {
        self.entries.get(fingerprint)
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
