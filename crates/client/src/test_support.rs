//! Scripted collaborators shared by the strategy, sync and engine tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use swcache_core::{AppConfig, CacheDb, Entry, Error, InterceptedRequest, RequestKey, ResponseSnapshot, StoreBackend};
use url::Url;

use crate::fetch::{CacheMode, Transport};

pub(crate) const ORIGIN: &str = "https://shop.example.com";

pub(crate) fn config() -> AppConfig {
    AppConfig { origin: ORIGIN.into(), namespace: "shop".into(), version: "2".into(), ..Default::default() }
}

pub(crate) fn url(path_or_url: &str) -> Url {
    if path_or_url.starts_with('/') {
        Url::parse(&format!("{ORIGIN}{path_or_url}")).unwrap()
    } else {
        Url::parse(path_or_url).unwrap()
    }
}

pub(crate) fn get(path_or_url: &str) -> InterceptedRequest {
    InterceptedRequest::get(url(path_or_url))
}

/// One observed transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Call {
    pub method: String,
    pub url: String,
    pub mode: CacheMode,
}

/// Network stand-in answering from a fixed route table.
///
/// Unknown URLs get a 404. While offline every send fails with a network error.
#[derive(Default)]
pub(crate) struct ScriptedTransport {
    routes: Mutex<HashMap<String, ResponseSnapshot>>,
    failing: Mutex<Vec<String>>,
    offline: AtomicBool,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(&self, path_or_url: &str, response: ResponseSnapshot) {
        self.routes.lock().unwrap().insert(url(path_or_url).to_string(), response);
    }

    /// Make a single URL fail at the transport level.
    pub fn fail(&self, path_or_url: &str) {
        self.failing.lock().unwrap().push(url(path_or_url).to_string());
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &InterceptedRequest, mode: CacheMode) -> Result<ResponseSnapshot, Error> {
        let url = request.url.to_string();
        self.calls
            .lock()
            .unwrap()
            .push(Call { method: request.method.clone(), url: url.clone(), mode });

        if self.offline.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(&url) {
            return Err(Error::Network("scripted offline".into()));
        }
        Ok(self
            .routes
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .unwrap_or_else(|| ResponseSnapshot::new(404, "")))
    }
}

/// SQLite-backed store that counts traffic and can be told to fail.
pub(crate) struct CountingBackend {
    inner: CacheDb,
    pub reads: AtomicUsize,
    pub writes: AtomicUsize,
    pub deletes: AtomicUsize,
    fail_reads: AtomicBool,
}

impl CountingBackend {
    pub async fn new() -> Self {
        Self {
            inner: CacheDb::open_in_memory().await.unwrap(),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            fail_reads: AtomicBool::new(false),
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Total reads, writes and deletes of entries.
    pub fn touches(&self) -> usize {
        self.reads.load(Ordering::SeqCst) + self.writes.load(Ordering::SeqCst) + self.deletes.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl StoreBackend for CountingBackend {
    async fn open(&self, store: &str) -> Result<(), Error> {
        self.inner.open(store).await
    }

    async fn match_entry(&self, store: &str, key: &RequestKey) -> Result<Option<Entry>, Error> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::CorruptEntry("scripted read failure".into()));
        }
        self.inner.match_entry(store, key).await
    }

    async fn put(&self, store: &str, entry: &Entry) -> Result<(), Error> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.put(store, entry).await
    }

    async fn delete(&self, store: &str, key: &RequestKey) -> Result<bool, Error> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(store, key).await
    }

    async fn record_attempt(&self, store: &str, key: &RequestKey, attempts: u32) -> Result<bool, Error> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.record_attempt(store, key, attempts).await
    }

    async fn keys(&self, store: &str) -> Result<Vec<RequestKey>, Error> {
        self.inner.keys(store).await
    }

    async fn list_store_names(&self) -> Result<Vec<String>, Error> {
        self.inner.list_store_names().await
    }

    async fn delete_store(&self, store: &str) -> Result<bool, Error> {
        self.inner.delete_store(store).await
    }
}
