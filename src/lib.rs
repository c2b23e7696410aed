// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! # Batch Engine
//!
//! Debounced request batching with fingerprint-based response correlation.
//!
//! Callers enqueue fine-grained items ("fetch the presence of user X") at
//! arbitrary times. The engine coalesces them into infrequent bulk transport
//! calls and hands every caller its own outcome, correlated back from the
//! bulk response.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Batcher::enqueue                        │
//! │  • request fingerprint → PendingTable entry                 │
//! │  • item appended to BatchQueue, Debouncer notified          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                (quiet window / count / max wait / leading edge)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Worker task                          │
//! │  • drain queue in enqueue order → strategy.prepare()        │
//! │  • BatchTransport::submit(payload)                          │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Dispatch                            │
//! │  • response fingerprint → pending entry of this batch       │
//! │  • classify: resolve or reject per entry                    │
//! │  • missing entries → UnmatchedResponse                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - Items are submitted in enqueue order; an item enqueued after a drain
//!   always travels in a later batch.
//! - Every completion resolves exactly once.
//! - One item's rejection never affects its siblings.
//! - A transport failure rejects only the members of the failed batch.
//! - Teardown rejects everything pending and no flush fires afterwards.
//!
//! The engine never retries. See [`resilience::retry::RetryTransport`] for an
//! opt-in transport decorator.
//!
//! ## Modules
//!
//! - [`batcher`]: the [`Batcher`] facade and its worker
//! - [`strategy`] / [`transport`]: the hooks a batcher is built from
//! - [`pending`]: completions keyed by fingerprint
//! - [`scheduler`]: debounce state machine
//! - [`assembler`]: the queue and payload assembly
//! - [`dispatch`]: response correlation
//! - [`presence`]: presence lookups as a concrete batcher

pub mod config;
pub mod error;
pub mod strategy;
pub mod transport;
pub mod pending;
pub mod scheduler;
pub mod assembler;
pub mod dispatch;
pub mod batcher;
pub mod resilience;
pub mod presence;
pub mod metrics;

pub use config::{BatcherConfig, DuplicatePolicy};
pub use error::{BatchError, TransportError, ConfigError};
pub use strategy::BatchStrategy;
pub use transport::BatchTransport;
pub use pending::{Completion, Outcome, PendingTable, PendingEntry, Tracked};
pub use scheduler::{Debouncer, DebounceConfig, FlushReason, SchedulerPhase};
pub use assembler::{BatchQueue, AssembledBatch, Drained};
pub use dispatch::DispatchReport;
pub use batcher::{Batcher, BatcherStats};
pub use resilience::retry::{RetryConfig, RetryTransport};
pub use presence::{PresenceBatcher, PresenceStrategy, PresenceStatus, PresenceFailure, PresenceRequest};
