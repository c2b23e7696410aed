// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The worker task: waits for the scheduler to call a flush, submits the
//! batch and settles it.
//!
//! Exactly one worker runs per batcher, so at most one batch is in flight.

use std::sync::Arc;

use tokio::time::Instant;
use tracing::{debug, error, warn};

use crate::assembler::{assemble, AssembledBatch};
use crate::dispatch::{dispatch_response, fail_batch};
use crate::error::BatchError;
use crate::metrics::{self, SubmitTimer};
use crate::strategy::BatchStrategy;
use crate::transport::BatchTransport;

use super::{Shared, State};

enum Step<K, P> {
    Flush(AssembledBatch<K, P>),
    Wait(Option<Instant>),
}

impl<S: BatchStrategy> State<S> {
    /// Either drain a batch (entering `Flushing`) or report when to look again.
    fn next_step(&mut self, strategy: &S, limit: usize, now: Instant) -> Step<S::Fingerprint, S::Payload> {
        let Some(reason) = self.debounce.poll(now, self.queue.len()) else {
            return Step::Wait(self.debounce.next_deadline());
        };

        let id = self.next_batch_id;
        match assemble(strategy, &mut self.queue, limit, id, reason) {
            Some(batch) => {
                self.next_batch_id += 1;
                for fingerprint in &batch.fingerprints {
                    self.pending.assign(fingerprint, id);
                }
                self.debounce.begin_flush(now, self.queue.len());
                self.in_flight = Some((id, batch.len()));
                Step::Flush(batch)
            }
            None => {
                self.debounce.reset();
                Step::Wait(None)
            }
        }
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

pub(super) async fn run_worker<S, T>(shared: Arc<Shared<S, T>>)
where
    S: BatchStrategy,
    T: BatchTransport<Payload = S::Payload, Entry = S::Entry>,
{
    debug!(batcher = %shared.config.name, "Batch worker started");
    let _exit = WorkerExit { shared: Arc::clone(&shared) };
    loop {
        let step = {
            let mut state = shared.state.lock();
            if state.closed {
                break;
            }
            state.next_step(&shared.strategy, shared.config.max_batch_items, Instant::now())
        };

        match step {
            Step::Flush(batch) => shared.flush(batch).await,
            Step::Wait(deadline) => {
                tokio::select! {
                    _ = shared.wakeup.notified() => {}
                    _ = sleep_until(deadline) => {}
                }
            }
        }
    }
    debug!(batcher = %shared.config.name, "Batch worker stopped");
}

/// Closes the batcher if the worker stops without a teardown, e.g. when a
/// strategy hook or the transport panics. Pending completions resolve with
/// `Cancelled` instead of waiting forever.
struct WorkerExit<S: BatchStrategy, T> {
    shared: Arc<Shared<S, T>>,
}

impl<S: BatchStrategy, T> Drop for WorkerExit<S, T> {
    fn drop(&mut self) {
        let name = self.shared.config.name.as_str();
        let rejected = {
            let mut state = self.shared.state.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.queue.clear();
            state.debounce.reset();
            state.in_flight = None;
            state.pending.reject_all(BatchError::Cancelled)
        };

        metrics::record_outcomes(name, "cancelled", rejected);
        metrics::set_pending_entries(name, 0);
        metrics::set_queued_items(name, 0);
        error!(batcher = %name, rejected, "Batch worker stopped unexpectedly, batcher closed");
    }
}

impl<S, T> Shared<S, T>
where
    S: BatchStrategy,
    T: BatchTransport<Payload = S::Payload, Entry = S::Entry>,
{
    #[tracing::instrument(
        skip_all,
        fields(batcher = %self.config.name, batch_id = batch.id, size = batch.len(), reason = %batch.reason)
    )]
    async fn flush(&self, batch: AssembledBatch<S::Fingerprint, S::Payload>) {
        let AssembledBatch { id, reason, fingerprints, payload } = batch;
        let name = self.config.name.as_str();
        metrics::record_batch_submitted(name, reason.as_str(), fingerprints.len());
        debug!("Submitting batch");

        let mut timer = SubmitTimer::start(name);
        let response = self.transport.submit(payload).await;
        if response.is_ok() {
            timer.succeeded();
        }
        drop(timer);

        let mut state = self.state.lock();
        if state.closed {
            // teardown already rejected every member
            return;
        }

        match response {
            Ok(entries) => {
                let report = dispatch_response(&self.strategy, &mut state.pending, id, &fingerprints, entries);
                metrics::record_outcomes(name, "success", report.succeeded);
                metrics::record_outcomes(name, "rejected", report.rejected);
                metrics::record_outcomes(name, "unmatched", report.unmatched);
                metrics::record_stray_entries(name, report.stray_entries);
            }
            Err(error) => {
                let failed = fail_batch::<S>(&mut state.pending, id, &fingerprints, &error);
                warn!(error = %error, failed, "Batch submission failed");
                metrics::record_outcomes(name, "transport", failed);
            }
        }

        state.in_flight = None;
        state.batches_submitted += 1;
        let queued = state.queue.len();
        state.debounce.finish_flush(queued);
        metrics::set_pending_entries(name, state.pending.len());
        metrics::set_queued_items(name, queued);
    }
}
