// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Debounce scheduling for batch flushes.
//!
//! The [`Debouncer`] is a pure state machine: it is told about enqueues and
//! flush boundaries and answers whether a flush is due ([`Debouncer::poll`])
//! and when it should be asked again ([`Debouncer::next_deadline`]). The
//! batcher's worker task owns the timer; this type never sleeps.
//!
//! ```text
//! Idle ──enqueue──▶ Collecting ──trigger──▶ Flushing ──done──▶ Idle
//!                        ▲                                │
//!                        └──────── items queued ──────────┘
//! ```
//!
//! Triggers, checked in priority order: manual request, leading edge, item
//! count, quiet window, max wait.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use tokio::time::Instant;
//! use batch_engine::{DebounceConfig, Debouncer, FlushReason, SchedulerPhase};
//!
//! let mut debouncer = Debouncer::new(DebounceConfig {
//!     quiet_window: Duration::from_millis(100),
//!     max_wait: None,
//!     max_batch_items: 10,
//!     leading_edge: false,
//! });
//!
//! let start = Instant::now();
//! debouncer.on_enqueue(start);
//! assert_eq!(debouncer.phase(), SchedulerPhase::Collecting);
//! assert_eq!(debouncer.poll(start, 1), None);
//!
//! let later = start + Duration::from_millis(100);
//! assert_eq!(debouncer.poll(later, 1), Some(FlushReason::Quiet));
//! ```

use std::time::Duration;

use tokio::time::Instant;

use crate::config::BatcherConfig;

/// Why a batch was flushed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    /// No enqueue for a full quiet window
    Quiet,
    /// Queue reached `max_batch_items`
    Count,
    /// Burst has been collecting for `max_wait`
    MaxWait,
    /// First item of a burst, flushed immediately
    LeadingEdge,
    /// Requested through [`Batcher::flush_now`](crate::Batcher::flush_now)
    Manual,
}

impl FlushReason {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quiet => "quiet",
            Self::Count => "count",
            Self::MaxWait => "max_wait",
            Self::LeadingEdge => "leading_edge",
            Self::Manual => "manual",
        }
    }
}

impl std::fmt::Display for FlushReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scheduler state of one batcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// Nothing queued, nothing in flight
    Idle,
    /// Items queued, waiting for a trigger
    Collecting,
    /// A batch is in flight
    Flushing,
}

impl std::fmt::Display for SchedulerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Collecting => write!(f, "Collecting"),
            Self::Flushing => write!(f, "Flushing"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DebounceConfig {
    pub quiet_window: Duration,
    pub max_wait: Option<Duration>,
    pub max_batch_items: usize,
    pub leading_edge: bool,
}

impl From<&BatcherConfig> for DebounceConfig {
    fn from(config: &BatcherConfig) -> Self {
        Self {
            quiet_window: config.quiet_window(),
            max_wait: config.max_wait(),
            max_batch_items: config.max_batch_items.max(1),
            leading_edge: config.leading_edge,
        }
    }
}

#[derive(Debug)]
pub struct Debouncer {
    config: DebounceConfig,
    phase: SchedulerPhase,
    last_enqueue: Option<Instant>,
    /// When the oldest still-queued item of the current cycle arrived
    collecting_since: Option<Instant>,
    leading_armed: bool,
    manual: bool,
}

impl Debouncer {
    pub fn new(config: DebounceConfig) -> Self {
        Self {
            config,
            phase: SchedulerPhase::Idle,
            last_enqueue: None,
            collecting_since: None,
            leading_armed: false,
            manual: false,
        }
    }

    #[must_use]
    pub fn phase(&self) -> SchedulerPhase {
        self.phase
    }

    #[must_use]
    pub fn config(&self) -> &DebounceConfig {
        &self.config
    }

    /// Record an item entering the queue.
    pub fn on_enqueue(&mut self, now: Instant) {
        match self.phase {
            SchedulerPhase::Idle => {
                // Leading edge only after a full quiet window, otherwise a
                // steady stream would flush one item at a time.
                let rested = self
                    .last_enqueue
                    .map_or(true, |last| now.saturating_duration_since(last) >= self.config.quiet_window);
                self.phase = SchedulerPhase::Collecting;
                self.collecting_since = Some(now);
                self.leading_armed = self.config.leading_edge && rested;
            }
            SchedulerPhase::Collecting => {}
            SchedulerPhase::Flushing => {
                self.collecting_since.get_or_insert(now);
            }
        }
        self.last_enqueue = Some(now);
    }

    /// Ask for a flush of whatever is queued, at the next opportunity.
    ///
    /// Ignored while `Idle`: nothing is queued, and the request must not
    /// carry over to the next burst.
    pub fn request_flush(&mut self) {
        if self.phase != SchedulerPhase::Idle {
            self.manual = true;
        }
    }

    /// Whether a flush is due now, given `queued` items waiting.
    #[must_use]
    pub fn poll(&self, now: Instant, queued: usize) -> Option<FlushReason> {
        if self.phase != SchedulerPhase::Collecting || queued == 0 {
            return None;
        }
        if self.manual {
            return Some(FlushReason::Manual);
        }
        if self.leading_armed {
            return Some(FlushReason::LeadingEdge);
        }
        if queued >= self.config.max_batch_items {
            return Some(FlushReason::Count);
        }
        if let Some(last) = self.last_enqueue {
            if now >= last + self.config.quiet_window {
                return Some(FlushReason::Quiet);
            }
        }
        if let (Some(max_wait), Some(since)) = (self.config.max_wait, self.collecting_since) {
            if now >= since + max_wait {
                return Some(FlushReason::MaxWait);
            }
        }
        None
    }

    /// Earliest instant at which [`poll`](Self::poll) may start returning a reason.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        if self.phase != SchedulerPhase::Collecting {
            return None;
        }
        let quiet = self.last_enqueue.map(|last| last + self.config.quiet_window);
        let max_wait = match (self.config.max_wait, self.collecting_since) {
            (Some(max_wait), Some(since)) => Some(since + max_wait),
            _ => None,
        };
        match (quiet, max_wait) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// A batch was drained; `remaining` items stay queued for the next one.
    pub fn begin_flush(&mut self, now: Instant, remaining: usize) {
        self.phase = SchedulerPhase::Flushing;
        self.leading_armed = false;
        self.manual = false;
        self.collecting_since = if remaining > 0 { Some(now) } else { None };
    }

    /// The in-flight batch settled; `queued` items are waiting.
    pub fn finish_flush(&mut self, queued: usize) {
        if queued > 0 {
            self.phase = SchedulerPhase::Collecting;
            if self.collecting_since.is_none() {
                self.collecting_since = self.last_enqueue;
            }
        } else {
            self.phase = SchedulerPhase::Idle;
            self.collecting_since = None;
            self.manual = false;
        }
    }

    /// Forget the current cycle (teardown).
    pub fn reset(&mut self) {
        self.phase = SchedulerPhase::Idle;
        self.collecting_since = None;
        self.leading_armed = false;
        self.manual = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(leading_edge: bool) -> DebounceConfig {
        DebounceConfig {
            quiet_window: Duration::from_millis(100),
            max_wait: Some(Duration::from_millis(300)),
            max_batch_items: 3,
            leading_edge,
        }
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn test_idle_initially() {
        let debouncer = Debouncer::new(config(false));
        assert_eq!(debouncer.phase(), SchedulerPhase::Idle);
        assert_eq!(debouncer.next_deadline(), None);
        assert_eq!(debouncer.poll(Instant::now(), 0), None);
    }

    #[test]
    fn test_quiet_window_restarts_on_each_enqueue() {
        let mut debouncer = Debouncer::new(config(false));
        let t0 = Instant::now();

        debouncer.on_enqueue(t0);
        debouncer.on_enqueue(t0 + ms(60));
        assert_eq!(debouncer.poll(t0 + ms(100), 2), None);
        assert_eq!(debouncer.next_deadline(), Some(t0 + ms(160)));
        assert_eq!(debouncer.poll(t0 + ms(160), 2), Some(FlushReason::Quiet));
    }

    #[test]
    fn test_count_threshold() {
        let mut debouncer = Debouncer::new(config(false));
        let t0 = Instant::now();
        debouncer.on_enqueue(t0);
        assert_eq!(debouncer.poll(t0, 2), None);
        assert_eq!(debouncer.poll(t0, 3), Some(FlushReason::Count));
    }

    #[test]
    fn test_max_wait_bounds_trickle() {
        let mut debouncer = Debouncer::new(config(false));
        let t0 = Instant::now();
        for step in 0..=6 {
            debouncer.on_enqueue(t0 + ms(step * 50));
        }
        // last enqueue at 300ms keeps the quiet window open, max wait does not
        assert_eq!(debouncer.poll(t0 + ms(300), 2), Some(FlushReason::MaxWait));
        assert_eq!(debouncer.next_deadline(), Some(t0 + ms(300)));
    }

    #[test]
    fn test_leading_edge_fires_once_per_burst() {
        let mut debouncer = Debouncer::new(config(true));
        let t0 = Instant::now();

        debouncer.on_enqueue(t0);
        assert_eq!(debouncer.poll(t0, 1), Some(FlushReason::LeadingEdge));
        debouncer.begin_flush(t0, 0);
        debouncer.finish_flush(0);
        assert_eq!(debouncer.phase(), SchedulerPhase::Idle);

        // still inside the quiet window: no second leading flush
        debouncer.on_enqueue(t0 + ms(20));
        assert_eq!(debouncer.poll(t0 + ms(20), 1), None);
        assert_eq!(debouncer.poll(t0 + ms(120), 1), Some(FlushReason::Quiet));
        debouncer.begin_flush(t0 + ms(120), 0);
        debouncer.finish_flush(0);

        // after a full quiet window the next burst leads again
        debouncer.on_enqueue(t0 + ms(400));
        assert_eq!(debouncer.poll(t0 + ms(400), 1), Some(FlushReason::LeadingEdge));
    }

    #[test]
    fn test_no_trigger_while_flushing() {
        let mut debouncer = Debouncer::new(config(false));
        let t0 = Instant::now();
        debouncer.on_enqueue(t0);
        debouncer.begin_flush(t0 + ms(100), 0);
        assert_eq!(debouncer.phase(), SchedulerPhase::Flushing);

        debouncer.on_enqueue(t0 + ms(110));
        assert_eq!(debouncer.poll(t0 + ms(500), 5), None);
        assert_eq!(debouncer.next_deadline(), None);

        debouncer.finish_flush(1);
        assert_eq!(debouncer.phase(), SchedulerPhase::Collecting);
        assert_eq!(debouncer.poll(t0 + ms(210), 1), Some(FlushReason::Quiet));
    }

    #[test]
    fn test_manual_flush_takes_priority() {
        let mut debouncer = Debouncer::new(config(false));
        let t0 = Instant::now();
        debouncer.on_enqueue(t0);
        debouncer.request_flush();
        assert_eq!(debouncer.poll(t0, 1), Some(FlushReason::Manual));
        debouncer.begin_flush(t0, 0);
        debouncer.finish_flush(0);

        debouncer.on_enqueue(t0 + ms(1));
        assert_eq!(debouncer.poll(t0 + ms(1), 1), None);
    }

    #[test]
    fn test_manual_flush_while_idle_is_ignored() {
        let mut debouncer = Debouncer::new(config(false));
        let t0 = Instant::now();
        debouncer.request_flush();
        assert_eq!(debouncer.phase(), SchedulerPhase::Idle);

        debouncer.on_enqueue(t0 + ms(60_000));
        assert_eq!(debouncer.poll(t0 + ms(60_000), 1), None);
        assert_eq!(debouncer.poll(t0 + ms(60_100), 1), Some(FlushReason::Quiet));
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let mut debouncer = Debouncer::new(config(true));
        let t0 = Instant::now();
        debouncer.on_enqueue(t0);
        debouncer.request_flush();
        debouncer.reset();
        assert_eq!(debouncer.phase(), SchedulerPhase::Idle);
        assert_eq!(debouncer.poll(t0, 1), None);
    }

    #[test]
    fn test_flush_reason_display() {
        assert_eq!(FlushReason::LeadingEdge.to_string(), "leading_edge");
        assert_eq!(SchedulerPhase::Collecting.to_string(), "Collecting");
    }
}
