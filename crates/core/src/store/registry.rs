//! Store registry: named handles, version sweeps and cross-store lookups.

use std::collections::HashSet;
use std::sync::Arc;

use super::{Entry, StoreBackend};
use crate::Error;
use crate::request::RequestKey;

/// Handle to one named store.
///
/// Cheap to clone; background writes take their own copy.
#[derive(Clone)]
pub struct Store {
    name: String,
    backend: Arc<dyn StoreBackend>,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("name", &self.name).finish_non_exhaustive()
    }
}

impl Store {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn match_entry(&self, key: &RequestKey) -> Result<Option<Entry>, Error> {
        self.backend.match_entry(&self.name, key).await
    }

    pub async fn put(&self, entry: &Entry) -> Result<(), Error> {
        self.backend.put(&self.name, entry).await
    }

    pub async fn delete(&self, key: &RequestKey) -> Result<bool, Error> {
        self.backend.delete(&self.name, key).await
    }

    pub async fn record_attempt(&self, key: &RequestKey, attempts: u32) -> Result<bool, Error> {
        self.backend.record_attempt(&self.name, key, attempts).await
    }

    pub async fn keys(&self) -> Result<Vec<RequestKey>, Error> {
        self.backend.keys(&self.name).await
    }
}

/// Owns every store for one origin.
#[derive(Clone)]
pub struct StoreRegistry {
    backend: Arc<dyn StoreBackend>,
    namespace_prefix: String,
}

impl StoreRegistry {
    /// `namespace_prefix` marks stores this registry may sweep (e.g. `"shop-"`).
    pub fn new(backend: Arc<dyn StoreBackend>, namespace_prefix: impl Into<String>) -> Self {
        Self { backend, namespace_prefix: namespace_prefix.into() }
    }

    /// Return the handle for `name`, creating the store if absent.
    ///
    /// Never fails: a backend error is logged and the handle is still returned,
    /// since the first successful `put` creates the store anyway.
    pub async fn open_store(&self, name: &str) -> Store {
        if let Err(e) = self.backend.open(name).await {
            tracing::warn!(store = name, error = %e, "failed to open store");
        }
        Store { name: name.to_string(), backend: Arc::clone(&self.backend) }
    }

    /// Delete every namespaced store not listed in `current`.
    ///
    /// Returns the names that were deleted; a second call with the same set
    /// deletes nothing.
    pub async fn activate_version(&self, current: &HashSet<String>) -> Result<Vec<String>, Error> {
        let mut deleted = Vec::new();
        for name in self.backend.list_store_names().await? {
            if name.starts_with(&self.namespace_prefix)
                && !current.contains(&name)
                && self.backend.delete_store(&name).await?
            {
                tracing::info!(store = %name, "deleted superseded store");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Delete every store, namespaced or not. Returns how many were removed.
    pub async fn clear_all(&self) -> Result<usize, Error> {
        let mut removed = 0;
        for name in self.backend.list_store_names().await? {
            if self.backend.delete_store(&name).await? {
                removed += 1;
            }
        }
        tracing::info!(removed, "cleared all stores");
        Ok(removed)
    }

    pub async fn store_names(&self) -> Result<Vec<String>, Error> {
        self.backend.list_store_names().await
    }

    /// Most recently stored entry for `key` across every store.
    ///
    /// Store failures count as a miss for that store.
    pub async fn match_any(&self, key: &RequestKey) -> Option<Entry> {
        let names = match self.backend.list_store_names().await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "store listing failed, treating as miss");
                return None;
            }
        };

        let mut best: Option<Entry> = None;
        for name in names {
            match self.backend.match_entry(&name, key).await {
                Ok(Some(entry)) => {
                    if best.as_ref().is_none_or(|b| entry.stored_at > b.stored_at) {
                        best = Some(entry);
                    }
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(store = %name, key = %key, error = %e, "store read failed, treating as miss"),
            }
        }
        best
    }
}
