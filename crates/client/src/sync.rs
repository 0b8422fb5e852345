//! Deferred-write queue for mutating requests that failed while offline.
//!
//! Queued requests live in the dynamic store under their own identity, with a
//! `202 Accepted` placeholder as the response. A drain replays each one and
//! removes it on a 2xx answer.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use swcache_core::{AppConfig, Entry, Error, InterceptedRequest, RequestKey, ResponseSnapshot, Store, StoreRegistry};

use crate::fetch::{CacheMode, Transport};

/// Outcome counts of one drain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DrainReport {
    /// Replayed with a 2xx answer and removed.
    pub replayed: usize,
    /// Failed and kept for the next drain.
    pub retained: usize,
    /// Dropped after reaching the attempt limit or being unreadable.
    pub abandoned: usize,
}

pub struct SyncQueue {
    registry: StoreRegistry,
    transport: Arc<dyn Transport>,
    store_name: String,
    patterns: Vec<String>,
    max_attempts: Option<u32>,
    /// Keys a drain in this queue is currently replaying.
    in_flight: Mutex<HashSet<RequestKey>>,
}

/// Releases a claimed key when dropped.
struct Claim<'a> {
    queue: &'a SyncQueue,
    key: RequestKey,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.queue.in_flight_keys().remove(&self.key);
    }
}

impl SyncQueue {
    pub fn new(registry: StoreRegistry, transport: Arc<dyn Transport>, config: &AppConfig) -> Self {
        Self {
            registry,
            transport,
            store_name: config.store_names().dynamic_store,
            patterns: config.sync.patterns.clone(),
            max_attempts: config.sync.max_replay_attempts,
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Whether `key` names a replayable task.
    pub fn accepts(&self, key: &RequestKey) -> bool {
        key.is_mutating() && key.matches_any(&self.patterns)
    }

    /// Queue `request` for replay. Returns `false` when it is not a sync task.
    pub async fn enqueue_failed(&self, request: &InterceptedRequest) -> Result<bool, Error> {
        let key = request.key();
        if !self.accepts(&key) {
            return Ok(false);
        }
        let entry = Entry::new(request, ResponseSnapshot::new(202, ""));
        self.registry.open_store(&self.store_name).await.put(&entry).await?;
        tracing::info!(key = %key, "queued request for background sync");
        Ok(true)
    }

    /// Identities currently waiting for replay.
    pub async fn pending(&self) -> Result<Vec<RequestKey>, Error> {
        let keys = self.registry.open_store(&self.store_name).await.keys().await?;
        Ok(keys.into_iter().filter(|k| self.accepts(k)).collect())
    }

    /// Replay every queued task once. Never fails; problems are logged.
    pub async fn drain(&self) -> DrainReport {
        let mut report = DrainReport::default();
        let store = self.registry.open_store(&self.store_name).await;
        let keys = match self.pending().await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(store = %self.store_name, error = %e, "failed to list sync queue");
                return report;
            }
        };

        for key in keys {
            let Some(_claim) = self.claim(&key) else {
                tracing::debug!(key = %key, "sync task already being replayed");
                continue;
            };

            let entry = match store.match_entry(&key).await {
                Ok(Some(entry)) => entry,
                // Already handled by an overlapping drain.
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "unreadable sync task, dropping");
                    self.remove(&store, &key).await;
                    report.abandoned += 1;
                    continue;
                }
            };

            let request = match entry.to_request() {
                Ok(request) => request,
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "corrupt sync task, dropping");
                    self.remove(&store, &key).await;
                    report.abandoned += 1;
                    continue;
                }
            };

            match self.transport.send(&request, CacheMode::NoStore).await {
                Ok(response) if response.is_success() => {
                    self.remove(&store, &key).await;
                    tracing::info!(key = %key, status = response.status, "replayed sync task");
                    report.replayed += 1;
                    continue;
                }
                Ok(response) => {
                    tracing::debug!(key = %key, status = response.status, "sync replay rejected");
                }
                Err(e) => {
                    tracing::debug!(key = %key, error = %e, "sync replay failed");
                }
            }

            let attempts = entry.replay_attempts.saturating_add(1);
            if self.max_attempts.is_some_and(|max| attempts >= max) {
                tracing::warn!(key = %key, attempts, "abandoning sync task");
                self.remove(&store, &key).await;
                report.abandoned += 1;
                continue;
            }

            // Update in place: an overlapping drain may have removed the task meanwhile.
            match store.record_attempt(&key, attempts).await {
                Ok(true) => report.retained += 1,
                Ok(false) => tracing::debug!(key = %key, "sync task removed during replay"),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "failed to record sync attempt");
                    report.retained += 1;
                }
            }
        }

        tracing::info!(
            replayed = report.replayed,
            retained = report.retained,
            abandoned = report.abandoned,
            "sync drain finished"
        );
        report
    }

    fn claim(&self, key: &RequestKey) -> Option<Claim<'_>> {
        self.in_flight_keys()
            .insert(key.clone())
            .then(|| Claim { queue: self, key: key.clone() })
    }

    fn in_flight_keys(&self) -> MutexGuard<'_, HashSet<RequestKey>> {
        match self.in_flight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("recovered poisoned sync claim lock");
                poisoned.into_inner()
            }
        }
    }

    async fn remove(&self, store: &Store, key: &RequestKey) {
        if let Err(e) = store.delete(key).await {
            tracing::warn!(key = %key, error = %e, "failed to remove sync task");
        }
    }
}
