// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The per-use-case hooks a [`Batcher`](crate::Batcher) is built from.
//!
//! A strategy describes the shape of one kind of batched call: how an item is
//! identified, how a drained set of items becomes a wire payload, and how each
//! response entry is identified and judged. Correlation rests entirely on
//! `response_fingerprint(entry) == request_fingerprint(item)`.

use std::fmt;
use std::hash::Hash;

pub trait BatchStrategy: Send + Sync + 'static {
    /// One caller-submitted unit of work
    type Item: Send + 'static;
    /// Identity shared by an item and its response entry
    type Fingerprint: Eq + Hash + Clone + fmt::Debug + Send + Sync + 'static;
    /// What the transport sends for one batch
    type Payload: Send + 'static;
    /// One entry of the transport's batch response
    type Entry: Send + 'static;
    /// Success value handed to the caller
    type Value: Clone + Send + 'static;
    /// Per-entry failure detail handed to the caller
    type Failure: fmt::Display + fmt::Debug + Clone + Send + Sync + 'static;

    /// Must be pure and total.
    fn request_fingerprint(&self, item: &Self::Item) -> Self::Fingerprint;

    /// Must be pure and total.
    fn response_fingerprint(&self, entry: &Self::Entry) -> Self::Fingerprint;

    /// Shape drained items (in enqueue order) into a wire payload.
    fn prepare(&self, items: Vec<Self::Item>) -> Self::Payload;

    /// Decide whether a response entry is a success or a failure for its item.
    fn classify(&self, entry: Self::Entry) -> Result<Self::Value, Self::Failure>;

    /// Refuse items that cannot be fingerprinted meaningfully.
    fn validate(&self, _item: &Self::Item) -> Result<(), String> {
        Ok(())
    }
}
