//! Property-based tests (fuzzing) for the batcher and the presence codec.
//!
//! Random enqueue schedules run against a transport that fails or drops
//! entries for a fixed subset of ids. Whatever the schedule, every completion
//! must resolve exactly once with the outcome its id dictates, and batches
//! must keep enqueue order without repeating an id.
//!
//! Run with: `cargo test --test proptest_fuzz`

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use proptest::prelude::*;
use serde_json::{json, Value};

use batch_engine::presence::decode_compositions;
use batch_engine::{
    BatchError, BatchStrategy, BatchTransport, Batcher, BatcherConfig, BatcherStats, TransportError,
};

// =============================================================================
// Faulty Transport
// =============================================================================

/// Ids with `id % 3 == 1` are answered with a failure entry.
fn fails(id: u8) -> bool {
    id % 3 == 1
}

/// Ids with `id % 5 == 4` are missing from the response.
fn dropped(id: u8) -> bool {
    id % 5 == 4
}

#[derive(Debug, Clone)]
struct Reply {
    id: u8,
    ok: bool,
}

struct Ids;

impl BatchStrategy for Ids {
    type Item = u8;
    type Fingerprint = u8;
    type Payload = Vec<u8>;
    type Entry = Reply;
    type Value = u32;
    type Failure = u8;

    fn request_fingerprint(&self, item: &u8) -> u8 {
        *item
    }

    fn response_fingerprint(&self, entry: &Reply) -> u8 {
        entry.id
    }

    fn prepare(&self, items: Vec<u8>) -> Vec<u8> {
        items
    }

    fn classify(&self, entry: Reply) -> Result<u32, u8> {
        if entry.ok {
            Ok(u32::from(entry.id) * 10)
        } else {
            Err(entry.id)
        }
    }
}

#[derive(Default)]
struct Faulty {
    batches: Mutex<Vec<Vec<u8>>>,
}

#[async_trait]
impl BatchTransport for Faulty {
    type Payload = Vec<u8>;
    type Entry = Reply;

    async fn submit(&self, payload: Vec<u8>) -> Result<Vec<Reply>, TransportError> {
        self.batches.lock().push(payload.clone());
        tokio::time::sleep(Duration::from_millis(3)).await;
        Ok(payload
            .into_iter()
            .filter(|id| !dropped(*id))
            .map(|id| Reply { id, ok: !fails(id) })
            .collect())
    }
}

fn expected(id: u8) -> Result<u32, BatchError<u8>> {
    if dropped(id) {
        Err(BatchError::UnmatchedResponse { fingerprint: format!("{:?}", id) })
    } else if fails(id) {
        Err(BatchError::ItemRejected(id))
    } else {
        Ok(u32::from(id) * 10)
    }
}

fn is_subsequence(needle: &[u8], haystack: &[u8]) -> bool {
    let mut rest = haystack.iter();
    needle.iter().all(|n| rest.any(|h| h == n))
}

struct Run {
    outcomes: Vec<(u8, Result<u32, BatchError<u8>>)>,
    batches: Vec<Vec<u8>>,
    stats: BatcherStats,
}

fn run_schedule(schedule: Vec<(u8, u16)>, config: BatcherConfig) -> Run {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .unwrap();

    runtime.block_on(async move {
        let transport = Arc::new(Faulty::default());
        let batcher = Batcher::new(Ids, transport.clone(), config).unwrap();

        let mut completions = Vec::new();
        for (id, gap_ms) in schedule {
            completions.push((id, batcher.enqueue(id)));
            tokio::time::sleep(Duration::from_millis(u64::from(gap_ms))).await;
        }

        let mut outcomes = Vec::new();
        for (id, completion) in completions {
            let outcome = tokio::time::timeout(Duration::from_secs(3600), completion)
                .await
                .expect("completion never resolved");
            outcomes.push((id, outcome));
        }

        let batches = transport.batches.lock().clone();
        Run { outcomes, batches, stats: batcher.stats() }
    })
}

fn config_strategy() -> impl Strategy<Value = BatcherConfig> {
    (1u64..80, prop::option::of(20u64..200), 1usize..6, any::<bool>()).prop_map(
        |(quiet, max_wait, max_items, leading)| BatcherConfig {
            name: "fuzz".into(),
            quiet_window_ms: quiet,
            max_wait_ms: max_wait,
            max_batch_items: max_items,
            leading_edge: leading,
            ..Default::default()
        },
    )
}

// =============================================================================
// Batcher Invariant Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every completion resolves with the outcome its id dictates
    #[test]
    fn prop_every_completion_resolves_once(
        schedule in prop::collection::vec((0u8..12, 0u16..120), 1..40),
        config in config_strategy(),
    ) {
        let enqueued = schedule.len();
        let run = run_schedule(schedule, config);

        prop_assert_eq!(run.outcomes.len(), enqueued);
        for (id, outcome) in &run.outcomes {
            prop_assert_eq!(outcome, &expected(*id), "wrong outcome for id {}", id);
        }
        prop_assert_eq!(run.stats.pending, 0);
        prop_assert_eq!(run.stats.queued, 0);
        prop_assert_eq!(run.stats.in_flight, None);
    }

    /// Batches respect the size cap, never repeat an id, and keep enqueue order
    #[test]
    fn prop_batches_preserve_order_without_repeats(
        schedule in prop::collection::vec((0u8..12, 0u16..120), 1..40),
        config in config_strategy(),
    ) {
        let cap = config.max_batch_items;
        let enqueue_order: Vec<u8> = schedule.iter().map(|(id, _)| *id).collect();
        let run = run_schedule(schedule, config);

        for batch in &run.batches {
            prop_assert!(!batch.is_empty());
            prop_assert!(batch.len() <= cap, "batch {:?} exceeds cap {}", batch, cap);
            let mut unique = batch.clone();
            unique.sort_unstable();
            unique.dedup();
            prop_assert_eq!(unique.len(), batch.len(), "repeated id in {:?}", batch);
        }

        let submitted = run.batches.concat();
        prop_assert!(submitted.len() <= enqueue_order.len());
        prop_assert!(
            is_subsequence(&submitted, &enqueue_order),
            "submitted {:?} out of order for {:?}", submitted, enqueue_order
        );
        prop_assert_eq!(run.stats.batches_submitted as usize, run.batches.len());
    }

    /// Coalesced ids share one wire entry when enqueued back to back
    #[test]
    fn prop_burst_of_duplicates_submits_each_id_once(
        ids in prop::collection::vec(0u8..6, 1..30),
    ) {
        let schedule: Vec<(u8, u16)> = ids.iter().map(|id| (*id, 0)).collect();
        let config = BatcherConfig {
            name: "fuzz".into(),
            quiet_window_ms: 50,
            max_wait_ms: None,
            max_batch_items: 100,
            ..Default::default()
        };
        let run = run_schedule(schedule, config);

        let mut distinct = ids.clone();
        distinct.sort_unstable();
        distinct.dedup();

        prop_assert_eq!(run.batches.len(), 1);
        let mut submitted = run.batches[0].clone();
        submitted.sort_unstable();
        prop_assert_eq!(submitted, distinct);
    }
}

// =============================================================================
// Presence Codec Fuzz Tests
// =============================================================================

/// Generate arbitrary JSON values (including invalid structures)
fn arbitrary_json_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(n.into())),
        ".*".prop_map(Value::String),
    ];

    leaf.prop_recursive(4, 64, 10, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..10).prop_map(Value::Array),
            prop::collection::hash_map(".*", inner, 0..10)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

proptest! {
    /// Decoding should never panic on arbitrary bytes
    #[test]
    fn fuzz_compositions_from_random_bytes(bytes in prop::collection::vec(any::<u8>(), 0..4096)) {
        let _ = decode_compositions(&bytes);
    }

    /// Decoding arbitrary JSON either parses or fails as malformed
    #[test]
    fn fuzz_compositions_from_arbitrary_json(value in arbitrary_json_strategy()) {
        let body = serde_json::to_vec(&value).unwrap();
        if let Err(err) = decode_compositions(&body) {
            prop_assert!(matches!(err, TransportError::Malformed(_)));
        }
    }

    /// Well-formed responses keep every entry in order
    #[test]
    fn prop_compositions_keep_entries(subjects in prop::collection::vec("[a-z0-9-]{1,24}", 0..50)) {
        let list: Vec<Value> = subjects
            .iter()
            .map(|s| json!({ "subject": s, "status": "active" }))
            .collect();
        let body = serde_json::to_vec(&json!({ "statusList": list })).unwrap();

        let decoded = decode_compositions(&body).unwrap();
        let decoded_subjects: Vec<&str> = decoded.iter().map(|s| s.subject.as_str()).collect();
        prop_assert_eq!(decoded_subjects, subjects.iter().map(String::as_str).collect::<Vec<_>>());
    }
}
