// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Presence lookups as a concrete batcher.
//!
//! Callers ask for the presence of one subject (user id) at a time; the
//! batcher folds those into a single compositions request
//! `{"subjects": [...]}` and correlates the `statusList` entries of the
//! response back by subject.
//!
//! The HTTP call itself belongs to the host application: implement
//! [`BatchTransport`](crate::BatchTransport) with
//! `Payload = PresenceRequest` and `Entry = PresenceStatus`, and use
//! [`decode_compositions`] on the response body.
//!
//! # Example
//!
//! ```
//! use batch_engine::presence::decode_compositions;
//!
//! let body = br#"{"statusList": [{"subject": "u1", "status": "active"}]}"#;
//! let entries = decode_compositions(body).unwrap();
//! assert_eq!(entries[0].subject, "u1");
//! ```

use serde::{Deserialize, Serialize};

use crate::batcher::Batcher;
use crate::config::BatcherConfig;
use crate::error::{ConfigError, TransportError};
use crate::strategy::BatchStrategy;
use crate::transport::BatchTransport;

/// Body of one compositions request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceRequest {
    pub subjects: Vec<String>,
}

/// One `statusList` entry of a compositions response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceStatus {
    pub subject: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub last_active: Option<String>,
    #[serde(default, rename = "expiresTTL")]
    pub expires_ttl: Option<i64>,
    #[serde(default)]
    pub error_code: Option<u16>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Compositions response body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompositionsResponse {
    #[serde(default)]
    pub status_list: Vec<PresenceStatus>,
}

/// The service could not report presence for one subject
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceFailure {
    pub subject: String,
    pub code: u16,
    pub message: Option<String>,
}

impl std::fmt::Display for PresenceFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.message {
            Some(message) => write!(f, "presence unavailable for {} ({}): {}", self.subject, self.code, message),
            None => write!(f, "presence unavailable for {} ({})", self.subject, self.code),
        }
    }
}

/// Decode a compositions response body into its entries.
pub fn decode_compositions(body: &[u8]) -> Result<Vec<PresenceStatus>, TransportError> {
    serde_json::from_slice::<CompositionsResponse>(body)
        .map(|response| response.status_list)
        .map_err(|e| TransportError::Malformed(e.to_string()))
}

/// Subjects are their own fingerprint on both sides of the wire.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresenceStrategy;

impl BatchStrategy for PresenceStrategy {
    type Item = String;
    type Fingerprint = String;
    type Payload = PresenceRequest;
    type Entry = PresenceStatus;
    type Value = PresenceStatus;
    type Failure = PresenceFailure;

    fn request_fingerprint(&self, subject: &String) -> String {
        subject.clone()
    }

    fn response_fingerprint(&self, entry: &PresenceStatus) -> String {
        entry.subject.clone()
    }

    fn prepare(&self, subjects: Vec<String>) -> PresenceRequest {
        PresenceRequest { subjects }
    }

    fn classify(&self, entry: PresenceStatus) -> Result<PresenceStatus, PresenceFailure> {
        match entry.error_code {
            Some(code) => Err(PresenceFailure {
                subject: entry.subject,
                code,
                message: entry.error_message,
            }),
            None => Ok(entry),
        }
    }

    fn validate(&self, subject: &String) -> Result<(), String> {
        if subject.trim().is_empty() {
            Err("presence subject must not be empty".to_string())
        } else {
            Ok(())
        }
    }
}

pub type PresenceBatcher<T> = Batcher<PresenceStrategy, T>;

impl<T> Batcher<PresenceStrategy, T>
where
    T: BatchTransport<Payload = PresenceRequest, Entry = PresenceStatus>,
{
    /// Presence batcher with the default schedule, named `presence`.
    pub fn presence(transport: T) -> Result<Self, ConfigError> {
        Self::new(
            PresenceStrategy,
            transport,
            BatcherConfig { name: "presence".to_string(), ..Default::default() },
        )
    }
}
