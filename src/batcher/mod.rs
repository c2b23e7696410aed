// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Batcher facade.
//!
//! The [`Batcher`] ties the components together:
//! - [`PendingTable`] of completions keyed by fingerprint
//! - [`BatchQueue`] of items waiting for the next batch
//! - [`Debouncer`] deciding when to flush
//! - a worker task that submits through the [`BatchTransport`] and
//!   dispatches the response
//!
//! All mutable state sits behind one mutex that is never held across an
//! `.await`; the worker is the only task that submits, so at most one batch
//! is in flight.
//!
//! # Lifecycle
//!
//! ```text
//! new() → enqueue()* → teardown() (or drop)
//! ```
//!
//! # Example
//!
//! ```rust
//! use batch_engine::{BatchStrategy, BatchTransport, Batcher, BatcherConfig, TransportError};
//!
//! struct Echo;
//!
//! impl BatchStrategy for Echo {
//!     type Item = u32;
//!     type Fingerprint = u32;
//!     type Payload = Vec<u32>;
//!     type Entry = u32;
//!     type Value = u32;
//!     type Failure = String;
//!
//!     fn request_fingerprint(&self, item: &u32) -> u32 { *item }
//!     fn response_fingerprint(&self, entry: &u32) -> u32 { *entry }
//!     fn prepare(&self, items: Vec<u32>) -> Vec<u32> { items }
//!     fn classify(&self, entry: u32) -> Result<u32, String> { Ok(entry * 10) }
//! }
//!
//! struct Loopback;
//!
//! #[async_trait::async_trait]
//! impl BatchTransport for Loopback {
//!     type Payload = Vec<u32>;
//!     type Entry = u32;
//!
//!     async fn submit(&self, payload: Vec<u32>) -> Result<Vec<u32>, TransportError> {
//!         Ok(payload)
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() {
//! let config = BatcherConfig { quiet_window_ms: 5, ..Default::default() };
//! let batcher = Batcher::new(Echo, Loopback, config).expect("valid config");
//!
//! let one = batcher.enqueue(1);
//! let two = batcher.enqueue(2);
//! assert_eq!(one.await, Ok(10));
//! assert_eq!(two.await, Ok(20));
//!
//! batcher.teardown();
//! # }
//! ```

mod types;
mod flush;
mod lifecycle;

pub use types::BatcherStats;

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::assembler::BatchQueue;
use crate::config::BatcherConfig;
use crate::error::{BatchError, ConfigError};
use crate::metrics;
use crate::pending::{Completion, PendingTable, Tracked};
use crate::scheduler::{DebounceConfig, Debouncer, SchedulerPhase};
use crate::strategy::BatchStrategy;
use crate::transport::BatchTransport;

/// State shared between the facade and its worker task.
pub(crate) struct Shared<S: BatchStrategy, T> {
    pub(super) config: BatcherConfig,
    pub(super) strategy: S,
    pub(super) transport: T,
    pub(super) state: Mutex<State<S>>,
    /// Wakes the worker when an enqueue or flush request may change its plan
    pub(super) wakeup: Notify,
}

pub(crate) struct State<S: BatchStrategy> {
    pub(super) queue: BatchQueue<S::Fingerprint, S::Item>,
    pub(super) pending: PendingTable<S::Fingerprint, S::Value, S::Failure>,
    pub(super) debounce: Debouncer,
    /// (batch id, size) of the batch currently submitted
    pub(super) in_flight: Option<(u64, usize)>,
    pub(super) next_batch_id: u64,
    pub(super) batches_submitted: u64,
    pub(super) closed: bool,
}

/// Batches independent items into bulk transport calls and hands each caller
/// its own outcome.
///
/// Dropping the batcher tears it down.
pub struct Batcher<S: BatchStrategy, T> {
    shared: Arc<Shared<S, T>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<S, T> Batcher<S, T>
where
    S: BatchStrategy,
    T: BatchTransport<Payload = S::Payload, Entry = S::Entry>,
{
    /// Create a batcher and start its worker on the current Tokio runtime.
    pub fn new(strategy: S, transport: T, config: BatcherConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| ConfigError::NoRuntime)?;

        info!(
            batcher = %config.name,
            quiet_window_ms = config.quiet_window_ms,
            max_wait_ms = ?config.max_wait_ms,
            max_batch_items = config.max_batch_items,
            leading_edge = config.leading_edge,
            duplicate_policy = ?config.duplicate_policy,
            "Starting batcher"
        );

        let state = State {
            queue: BatchQueue::new(),
            pending: PendingTable::new(),
            debounce: Debouncer::new(DebounceConfig::from(&config)),
            in_flight: None,
            next_batch_id: 1,
            batches_submitted: 0,
            closed: false,
        };
        let shared = Arc::new(Shared {
            config,
            strategy,
            transport,
            state: Mutex::new(state),
            wakeup: Notify::new(),
        });
        let worker = runtime.spawn(flush::run_worker(Arc::clone(&shared)));

        Ok(Self {
            shared,
            worker: Mutex::new(Some(worker)),
        })
    }
}

impl<S: BatchStrategy, T> Batcher<S, T> {
    /// Accept an item for the next batch.
    ///
    /// Returns immediately; the completion resolves once the item's response
    /// entry (or a batch-level failure) has been dispatched. Fails fast with
    /// [`BatchError::InvalidItem`] if the strategy refuses the item and with
    /// [`BatchError::Cancelled`] after [`teardown`](Self::teardown).
    pub fn enqueue(&self, item: S::Item) -> Completion<S::Value, S::Failure> {
        let name = self.shared.config.name.as_str();

        if let Err(reason) = self.shared.strategy.validate(&item) {
            debug!(batcher = %name, reason = %reason, "Refusing invalid item");
            metrics::record_enqueue(name, "invalid");
            return Completion::ready(Err(BatchError::InvalidItem(reason)));
        }

        let fingerprint = self.shared.strategy.request_fingerprint(&item);
        let now = Instant::now();

        let mut state = self.shared.state.lock();
        if state.closed {
            drop(state);
            metrics::record_enqueue(name, "closed");
            return Completion::ready(Err(BatchError::Cancelled));
        }

        match state.pending.track(fingerprint.clone(), self.shared.config.duplicate_policy) {
            Ok(Tracked::New(completion)) => {
                debug!(batcher = %name, fingerprint = ?fingerprint, "Item queued");
                state.queue.push(fingerprint, item, now);
                state.debounce.on_enqueue(now);
                let (pending, queued) = (state.pending.len(), state.queue.len());
                drop(state);
                self.shared.wakeup.notify_one();
                metrics::record_enqueue(name, "queued");
                metrics::set_pending_entries(name, pending);
                metrics::set_queued_items(name, queued);
                completion
            }
            Ok(Tracked::Joined(completion)) => {
                drop(state);
                debug!(batcher = %name, fingerprint = ?fingerprint, "Item coalesced into pending entry");
                metrics::record_enqueue(name, "coalesced");
                completion
            }
            Err(err) => {
                drop(state);
                debug!(batcher = %name, fingerprint = ?fingerprint, "Duplicate item rejected");
                metrics::record_enqueue(name, "conflict");
                Completion::ready(Err(err))
            }
        }
    }

    /// Flush whatever is queued without waiting for the quiet window.
    ///
    /// If a batch is in flight, the queued items go out as soon as it settles.
    pub fn flush_now(&self) {
        {
            let mut state = self.shared.state.lock();
            if state.closed {
                return;
            }
            state.debounce.request_flush();
        }
        self.shared.wakeup.notify_one();
    }

    #[must_use]
    pub fn phase(&self) -> SchedulerPhase {
        self.shared.state.lock().debounce.phase()
    }

    #[must_use]
    pub fn stats(&self) -> BatcherStats {
        let state = self.shared.state.lock();
        BatcherStats {
            phase: state.debounce.phase(),
            queued: state.queue.len(),
            pending: state.pending.len(),
            in_flight: state.in_flight.map(|(_, size)| size),
            batches_submitted: state.batches_submitted,
        }
    }

    #[must_use]
    pub fn config(&self) -> &BatcherConfig {
        &self.shared.config
    }

    #[must_use]
    pub fn strategy(&self) -> &S {
        &self.shared.strategy
    }
}
