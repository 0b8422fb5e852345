//! Versioned response stores.
//!
//! The engine talks to storage through the [`StoreBackend`] trait: named
//! buckets of entries keyed by request identity. [`CacheDb`] is the
//! SQLite-backed implementation:
//!
//! - Async access via tokio-rusqlite
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Deleting a store cascades to its entries
//!
//! [`StoreRegistry`] sits on top and owns naming, version sweeps and
//! cross-store lookups.

pub mod connection;
pub mod entries;
pub mod hash;
pub mod migrations;
pub mod registry;

pub use crate::Error;

pub use connection::CacheDb;
pub use registry::{Store, StoreRegistry};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::headers::Headers;
use crate::request::{InterceptedRequest, RequestKey};
use crate::response::ResponseSnapshot;

/// One stored record: the request identity, the response snapshot and when it was written.
///
/// Request headers and body are kept so queued mutating requests can be replayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub key: RequestKey,
    pub request_headers: Headers,
    pub request_body: Option<Bytes>,
    pub response: ResponseSnapshot,
    pub stored_at: DateTime<Utc>,
    pub replay_attempts: u32,
}

impl Entry {
    /// Entry for `request` holding `response`, stamped with the current time.
    pub fn new(request: &InterceptedRequest, response: ResponseSnapshot) -> Self {
        Self {
            key: request.key(),
            request_headers: request.headers.clone(),
            request_body: request.body.clone(),
            response,
            stored_at: Utc::now(),
            replay_attempts: 0,
        }
    }

    /// Rebuild the original request for replay.
    pub fn to_request(&self) -> Result<InterceptedRequest, Error> {
        let url = url::Url::parse(&self.key.url).map_err(|e| Error::CorruptEntry(format!("{}: {e}", self.key.url)))?;
        Ok(InterceptedRequest {
            method: self.key.method.clone(),
            url,
            headers: self.request_headers.clone(),
            body: self.request_body.clone(),
        })
    }
}

/// Asynchronous, origin-scoped storage of named buckets.
///
/// Implementations must treat deletes of missing stores or entries as no-ops,
/// and `put` must create the target store when it does not exist yet.
#[async_trait::async_trait]
pub trait StoreBackend: Send + Sync {
    /// Create the store if absent.
    async fn open(&self, store: &str) -> Result<(), Error>;

    async fn match_entry(&self, store: &str, key: &RequestKey) -> Result<Option<Entry>, Error>;

    /// Insert or replace the entry for `entry.key`.
    async fn put(&self, store: &str, entry: &Entry) -> Result<(), Error>;

    /// Returns whether an entry was removed.
    async fn delete(&self, store: &str, key: &RequestKey) -> Result<bool, Error>;

    /// Set the replay counter of an existing entry. Never creates one.
    /// Returns whether the entry was still present.
    async fn record_attempt(&self, store: &str, key: &RequestKey, attempts: u32) -> Result<bool, Error>;

    /// Keys in insertion order.
    async fn keys(&self, store: &str) -> Result<Vec<RequestKey>, Error>;

    async fn list_store_names(&self) -> Result<Vec<String>, Error>;

    /// Returns whether the store existed.
    async fn delete_store(&self, store: &str) -> Result<bool, Error>;
}
