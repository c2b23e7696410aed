// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::TransportError;

/// The network-performing collaborator: sends one batch payload and returns
/// the entries of the batch response.
///
/// A returned `Err` fails every item of the batch. Per-entry failures belong
/// in the entries themselves and are judged by
/// [`BatchStrategy::classify`](crate::BatchStrategy::classify).
#[async_trait]
pub trait BatchTransport: Send + Sync + 'static {
    type Payload: Send + 'static;
    type Entry: Send + 'static;

    async fn submit(&self, payload: Self::Payload) -> Result<Vec<Self::Entry>, TransportError>;
}

#[async_trait]
impl<T: BatchTransport> BatchTransport for Arc<T> {
    type Payload = T::Payload;
    type Entry = T::Entry;

    async fn submit(&self, payload: Self::Payload) -> Result<Vec<Self::Entry>, TransportError> {
        (**self).submit(payload).await
    }
}
