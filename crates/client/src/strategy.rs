//! Strategy execution.
//!
//! One async method per [`Classification`]. Every method resolves to a
//! response: transport failures become stored copies or offline fallbacks,
//! and store failures count as misses.

use std::sync::Arc;

use chrono::{TimeDelta, Utc};
use serde::Serialize;
use swcache_core::freshness::{self, Freshness};
use swcache_core::{AppConfig, Entry, InterceptedRequest, ResponseSnapshot, Store, StoreNames, StoreRegistry};
use tokio::task::JoinHandle;

use crate::classify::Classification;
use crate::fallback;
use crate::fetch::{CacheMode, Transport};

/// Where the returned response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResponseSource {
    Network,
    Store,
    /// An expired stored copy served because the refresh failed.
    StaleStore,
    Fallback,
}

impl ResponseSource {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseSource::Network => "network",
            ResponseSource::Store => "store",
            ResponseSource::StaleStore => "stale-store",
            ResponseSource::Fallback => "fallback",
        }
    }
}

/// Background store writes started while handling a request.
#[derive(Debug, Default)]
pub struct PendingWrites {
    handles: Vec<JoinHandle<()>>,
}

impl PendingWrites {
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Wait for every background write to finish.
    pub async fn settle(self) {
        for handle in self.handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "background store write panicked");
            }
        }
    }

    fn push(&mut self, handle: JoinHandle<()>) {
        self.handles.push(handle);
    }
}

/// Outcome of an intercepted request.
#[derive(Debug)]
pub struct Handled {
    pub classification: Classification,
    pub response: ResponseSnapshot,
    pub source: ResponseSource,
    pub pending: PendingWrites,
}

impl Handled {
    fn new(classification: Classification, response: ResponseSnapshot, source: ResponseSource) -> Self {
        Self { classification, response, source, pending: PendingWrites::default() }
    }

    fn with_pending(mut self, pending: PendingWrites) -> Self {
        self.pending = pending;
        self
    }
}

pub struct Executor {
    registry: StoreRegistry,
    transport: Arc<dyn Transport>,
    stores: StoreNames,
    expiration: TimeDelta,
    expire_unmarked: bool,
    offline_message: String,
}

impl Executor {
    pub fn new(registry: StoreRegistry, transport: Arc<dyn Transport>, config: &AppConfig) -> Self {
        Self {
            registry,
            transport,
            stores: config.store_names(),
            expiration: config.expiration(),
            expire_unmarked: config.expire_unmarked,
            offline_message: config.offline_message.clone(),
        }
    }

    pub async fn execute(&self, classification: Classification, request: &InterceptedRequest) -> Handled {
        tracing::debug!(method = %request.method, url = %request.url, %classification, "routing request");
        match classification {
            Classification::NetworkOnly => self.network_only(request).await,
            Classification::NetworkFirst => self.network_first(request).await,
            Classification::CrossOriginMediaCacheFirst => self.media_cache_first(request).await,
            Classification::OriginAssetCacheFirst => self.origin_asset_cache_first(request).await,
            Classification::DefaultTimedCache => self.timed_cache(request).await,
        }
    }

    pub async fn network_only(&self, request: &InterceptedRequest) -> Handled {
        let class = Classification::NetworkOnly;
        match self.transport.send(request, CacheMode::NoStore).await {
            Ok(response) => Handled::new(class, response, ResponseSource::Network),
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "network-only request failed");
                Handled::new(class, fallback::offline_json(&self.offline_message), ResponseSource::Fallback)
            }
        }
    }

    pub async fn network_first(&self, request: &InterceptedRequest) -> Handled {
        let class = Classification::NetworkFirst;
        match self.transport.send(request, CacheMode::NoCache).await {
            Ok(response) => {
                let mut pending = PendingWrites::default();
                if request.is_get() && response.is_success() {
                    let store = self.registry.open_store(&self.stores.dynamic_store).await;
                    pending.push(spawn_put(store, Entry::new(request, response.clone())));
                }
                Handled::new(class, response, ResponseSource::Network).with_pending(pending)
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "network-first falling back to store");
                if let Some(entry) = self.lookup(request).await {
                    return Handled::new(class, entry.response, ResponseSource::Store);
                }
                let response = if request.url.path().ends_with(".css") {
                    fallback::offline_stylesheet()
                } else {
                    fallback::offline_page()
                };
                Handled::new(class, response, ResponseSource::Fallback)
            }
        }
    }

    pub async fn media_cache_first(&self, request: &InterceptedRequest) -> Handled {
        let class = Classification::CrossOriginMediaCacheFirst;
        if let Some(entry) = self.lookup(request).await {
            return Handled::new(class, entry.response, ResponseSource::Store);
        }
        match self.transport.send(request, CacheMode::Default).await {
            Ok(response) => {
                if request.is_get() && response.is_success() {
                    self.persist(&self.stores.dynamic_store, Entry::new(request, response.clone()))
                        .await;
                }
                Handled::new(class, response, ResponseSource::Network)
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "media unavailable, serving placeholder");
                Handled::new(class, fallback::placeholder_image(), ResponseSource::Fallback)
            }
        }
    }

    /// Stored copies are served without an expiry check.
    pub async fn origin_asset_cache_first(&self, request: &InterceptedRequest) -> Handled {
        let class = Classification::OriginAssetCacheFirst;
        if let Some(entry) = self.lookup(request).await {
            return Handled::new(class, entry.response, ResponseSource::Store);
        }
        match self.transport.send(request, CacheMode::Default).await {
            Ok(response) => {
                if request.is_get() && response.is_success() {
                    self.persist(&self.stores.static_store, Entry::new(request, response.clone()))
                        .await;
                }
                Handled::new(class, response, ResponseSource::Network)
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "origin asset unavailable");
                Handled::new(class, fallback::service_unavailable(), ResponseSource::Fallback)
            }
        }
    }

    pub async fn timed_cache(&self, request: &InterceptedRequest) -> Handled {
        let class = Classification::DefaultTimedCache;
        let stored = self.lookup(request).await;

        if let Some(entry) = &stored
            && !self.needs_refresh(&entry.response)
        {
            return Handled::new(class, entry.response.clone(), ResponseSource::Store);
        }

        match self.transport.send(request, CacheMode::Default).await {
            Ok(response) if response.is_success() => {
                let mut pending = PendingWrites::default();
                if request.is_get() {
                    let store = self.registry.open_store(&self.stores.dynamic_store).await;
                    let stamped = freshness::stamp(response.clone(), Utc::now());
                    pending.push(spawn_put(store, Entry::new(request, stamped)));
                }
                Handled::new(class, response, ResponseSource::Network).with_pending(pending)
            }
            Ok(response) => match stored {
                Some(entry) => {
                    tracing::debug!(url = %request.url, status = response.status, "refresh rejected, serving stale");
                    Handled::new(class, entry.response, ResponseSource::StaleStore)
                }
                None => Handled::new(class, response, ResponseSource::Network),
            },
            Err(e) => match stored {
                Some(entry) => {
                    tracing::debug!(url = %request.url, error = %e, "refresh failed, serving stale");
                    Handled::new(class, entry.response, ResponseSource::StaleStore)
                }
                None => Handled::new(class, fallback::service_unavailable(), ResponseSource::Fallback),
            },
        }
    }

    fn needs_refresh(&self, response: &ResponseSnapshot) -> bool {
        match freshness::check(response, self.expiration, Utc::now()) {
            Freshness::Expired => true,
            Freshness::Unmarked => self.expire_unmarked,
            Freshness::Fresh => false,
        }
    }

    /// Latest stored entry for a GET request; anything else is a miss.
    async fn lookup(&self, request: &InterceptedRequest) -> Option<Entry> {
        if !request.is_get() {
            return None;
        }
        self.registry.match_any(&request.key()).await
    }

    async fn persist(&self, store_name: &str, entry: Entry) {
        let store = self.registry.open_store(store_name).await;
        if let Err(e) = store.put(&entry).await {
            tracing::warn!(store = store_name, key = %entry.key, error = %e, "failed to persist response");
        }
    }
}

fn spawn_put(store: Store, entry: Entry) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Err(e) = store.put(&entry).await {
            tracing::warn!(store = store.name(), key = %entry.key, error = %e, "background store write failed");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{CountingBackend, ScriptedTransport, config, get, url};
    use swcache_core::{RequestKey, StoreBackend};

    struct Harness {
        backend: Arc<CountingBackend>,
        transport: Arc<ScriptedTransport>,
        registry: StoreRegistry,
        executor: Executor,
    }

    async fn harness_with(config: AppConfig) -> Harness {
        let backend = Arc::new(CountingBackend::new().await);
        let transport = Arc::new(ScriptedTransport::new());
        let registry = StoreRegistry::new(backend.clone() as Arc<dyn StoreBackend>, config.namespace_prefix());
        let executor = Executor::new(registry.clone(), transport.clone() as Arc<dyn Transport>, &config);
        Harness { backend, transport, registry, executor }
    }

    async fn harness() -> Harness {
        harness_with(config()).await
    }

    async fn seed(h: &Harness, store: &str, entry: Entry) {
        h.registry.open_store(store).await.put(&entry).await.unwrap();
    }

    async fn stored(h: &Harness, store: &str, path: &str) -> Option<Entry> {
        h.registry
            .open_store(store)
            .await
            .match_entry(&RequestKey::get(&url(path)))
            .await
            .unwrap()
    }

    const DYNAMIC: &str = "shop-dynamic-v2";
    const STATIC: &str = "shop-static-v2";

    fn css() -> ResponseSnapshot {
        ResponseSnapshot::new(200, "body{color:red}").with_header("Content-Type", "text/css")
    }

    #[tokio::test]
    async fn test_network_only_success_never_touches_store() {
        let h = harness().await;
        h.transport.route("/checkout.php", ResponseSnapshot::new(200, r#"{"ok":true}"#));

        let handled = h.executor.network_only(&get("/checkout.php")).await;

        assert_eq!(handled.response.status, 200);
        assert_eq!(handled.source, ResponseSource::Network);
        assert!(handled.pending.is_empty());
        assert_eq!(h.backend.touches(), 0);
        assert_eq!(h.transport.calls()[0].mode, CacheMode::NoStore);
    }

    #[tokio::test]
    async fn test_network_only_offline_envelope() {
        let h = harness().await;
        h.transport.set_offline(true);
        let request = InterceptedRequest::new("POST", url("/api/checkout.php")).with_body(r#"{"items":[1]}"#);

        let handled = h.executor.network_only(&request).await;

        assert_eq!(handled.response.status, 503);
        assert_eq!(handled.response.content_type(), Some("application/json"));
        let body: serde_json::Value = serde_json::from_slice(&handled.response.body).unwrap();
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "Offline");
        assert_eq!(h.backend.touches(), 0);
    }

    #[tokio::test]
    async fn test_network_first_writes_back_copy() {
        let h = harness().await;
        h.transport.route("/style.css", css());

        let handled = h.executor.network_first(&get("/style.css")).await;
        assert_eq!(handled.response, css());
        assert_eq!(handled.pending.len(), 1);
        handled.pending.settle().await;

        let entry = stored(&h, DYNAMIC, "/style.css").await.unwrap();
        assert_eq!(entry.response, css());
        assert_eq!(h.transport.calls()[0].mode, CacheMode::NoCache);
    }

    #[tokio::test]
    async fn test_network_first_skips_non_success() {
        let h = harness().await;
        h.transport.route("/missing.html", ResponseSnapshot::new(404, "nope"));

        let handled = h.executor.network_first(&get("/missing.html")).await;
        assert_eq!(handled.response.status, 404);
        assert!(handled.pending.is_empty());
        assert_eq!(h.backend.writes(), 0);
    }

    #[tokio::test]
    async fn test_network_first_skips_non_get() {
        let h = harness().await;
        h.transport.route("/form.html", ResponseSnapshot::new(200, "ok"));

        let handled = h.executor.network_first(&InterceptedRequest::new("POST", url("/form.html"))).await;
        assert!(handled.pending.is_empty());
        assert_eq!(h.backend.writes(), 0);
    }

    #[tokio::test]
    async fn test_network_first_offline_serves_stored_copy() {
        let h = harness().await;
        let page = ResponseSnapshot::new(200, "<h1>cart</h1>");
        seed(&h, DYNAMIC, Entry::new(&get("/cart.html"), page.clone())).await;
        h.transport.set_offline(true);

        let handled = h.executor.network_first(&get("/cart.html")).await;
        assert_eq!(handled.response, page);
        assert_eq!(handled.source, ResponseSource::Store);
    }

    #[tokio::test]
    async fn test_network_first_offline_fallbacks() {
        let h = harness().await;
        h.transport.set_offline(true);

        let style = h.executor.network_first(&get("/missing.css")).await;
        assert_eq!(style.response.content_type(), Some("text/css"));
        assert_eq!(style.source, ResponseSource::Fallback);

        let page = h.executor.network_first(&get("/missing.html")).await;
        assert!(page.response.content_type().unwrap().starts_with("text/html"));

        let script = h.executor.network_first(&get("/cartScript.js")).await;
        assert!(script.response.content_type().unwrap().starts_with("text/html"));
    }

    #[tokio::test]
    async fn test_media_miss_fetches_and_persists() {
        let h = harness().await;
        let img = "https://res.cloudinary.com/demo/shoe.jpg";
        let jpeg = ResponseSnapshot::new(200, vec![0xFF_u8, 0xD8, 0xFF]).with_header("Content-Type", "image/jpeg");
        h.transport.route(img, jpeg.clone());

        let first = h.executor.media_cache_first(&get(img)).await;
        assert_eq!(first.source, ResponseSource::Network);
        assert_eq!(stored(&h, DYNAMIC, img).await.unwrap().response, jpeg);

        let second = h.executor.media_cache_first(&get(img)).await;
        assert_eq!(second.source, ResponseSource::Store);
        assert_eq!(second.response, jpeg);
        assert_eq!(h.transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_media_offline_placeholder() {
        let h = harness().await;
        h.transport.set_offline(true);

        let handled = h.executor.media_cache_first(&get("https://res.cloudinary.com/demo/shoe.jpg")).await;
        assert_eq!(handled.response.status, 200);
        assert_eq!(handled.response.content_type(), Some("image/svg+xml"));
        assert!(handled.response.text().contains("Offline"));
        assert_eq!(h.backend.writes(), 0);
    }

    #[tokio::test]
    async fn test_media_error_status_not_persisted() {
        let h = harness().await;
        let img = "https://res.cloudinary.com/demo/gone.jpg";
        h.transport.route(img, ResponseSnapshot::new(404, ""));

        let handled = h.executor.media_cache_first(&get(img)).await;
        assert_eq!(handled.response.status, 404);
        assert_eq!(h.backend.writes(), 0);
    }

    #[tokio::test]
    async fn test_origin_asset_served_without_network_or_expiry() {
        let h = harness().await;
        let old = freshness::stamp(ResponseSnapshot::new(200, "{}"), Utc::now() - TimeDelta::days(30));
        seed(&h, STATIC, Entry::new(&get("/manifest.json"), old.clone())).await;

        let handled = h.executor.origin_asset_cache_first(&get("/manifest.json")).await;
        assert_eq!(handled.response, old);
        assert_eq!(handled.source, ResponseSource::Store);
        assert_eq!(h.transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_origin_asset_miss_persists_to_static_store() {
        let h = harness().await;
        h.transport.route("/manifest.json", ResponseSnapshot::new(200, "{}"));

        h.executor.origin_asset_cache_first(&get("/manifest.json")).await;
        assert!(stored(&h, STATIC, "/manifest.json").await.is_some());
        assert!(stored(&h, DYNAMIC, "/manifest.json").await.is_none());
    }

    #[tokio::test]
    async fn test_origin_asset_offline_is_empty_503() {
        let h = harness().await;
        h.transport.set_offline(true);

        let handled = h.executor.origin_asset_cache_first(&get("/manifest.json")).await;
        assert_eq!(handled.response.status, 503);
        assert!(handled.response.body.is_empty());
    }

    #[tokio::test]
    async fn test_timed_fresh_entry_skips_network() {
        let h = harness().await;
        let fresh = freshness::stamp(ResponseSnapshot::new(200, "png"), Utc::now() - TimeDelta::hours(1));
        seed(&h, DYNAMIC, Entry::new(&get("/logo.png"), fresh.clone())).await;

        let handled = h.executor.timed_cache(&get("/logo.png")).await;
        assert_eq!(handled.response, fresh);
        assert_eq!(handled.source, ResponseSource::Store);
        assert_eq!(h.transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_timed_unmarked_entry_skips_network() {
        let h = harness().await;
        let unmarked = ResponseSnapshot::new(200, "png");
        seed(&h, STATIC, Entry::new(&get("/logo.png"), unmarked.clone())).await;

        let handled = h.executor.timed_cache(&get("/logo.png")).await;
        assert_eq!(handled.response, unmarked);
        assert_eq!(h.transport.call_count(), 0);
    }

    #[tokio::test]
    async fn test_timed_unmarked_entry_expires_when_configured() {
        let h = harness_with(AppConfig { expire_unmarked: true, ..config() }).await;
        seed(&h, STATIC, Entry::new(&get("/logo.png"), ResponseSnapshot::new(200, "old"))).await;
        h.transport.route("/logo.png", ResponseSnapshot::new(200, "new"));

        let handled = h.executor.timed_cache(&get("/logo.png")).await;
        assert_eq!(handled.response.text(), "new");
        assert_eq!(h.transport.call_count(), 1);
    }

    #[tokio::test]
    async fn test_timed_expired_entry_refreshed_and_restamped() {
        let h = harness().await;
        let stale = freshness::stamp(ResponseSnapshot::new(200, "old"), Utc::now() - TimeDelta::hours(25));
        seed(&h, DYNAMIC, Entry::new(&get("/logo.png"), stale)).await;
        h.transport.route("/logo.png", ResponseSnapshot::new(200, "new"));

        let handled = h.executor.timed_cache(&get("/logo.png")).await;
        assert_eq!(handled.response.text(), "new");
        assert_eq!(handled.source, ResponseSource::Network);
        handled.pending.settle().await;

        let entry = stored(&h, DYNAMIC, "/logo.png").await.unwrap();
        assert_eq!(entry.response.text(), "new");
        assert!(!freshness::is_expired(&entry.response, TimeDelta::hours(24), Utc::now()));
        assert!(freshness::marker(&entry.response).is_some());
    }

    #[tokio::test]
    async fn test_timed_expired_entry_served_stale_on_error() {
        let h = harness().await;
        let stale = freshness::stamp(ResponseSnapshot::new(200, "old"), Utc::now() - TimeDelta::hours(25));
        seed(&h, DYNAMIC, Entry::new(&get("/logo.png"), stale.clone())).await;
        h.transport.set_offline(true);

        let handled = h.executor.timed_cache(&get("/logo.png")).await;
        assert_eq!(handled.response, stale);
        assert_eq!(handled.source, ResponseSource::StaleStore);
    }

    #[tokio::test]
    async fn test_timed_expired_entry_served_stale_on_error_status() {
        let h = harness().await;
        let stale = freshness::stamp(ResponseSnapshot::new(200, "old"), Utc::now() - TimeDelta::hours(25));
        seed(&h, DYNAMIC, Entry::new(&get("/logo.png"), stale.clone())).await;
        h.transport.route("/logo.png", ResponseSnapshot::new(500, "boom"));

        let handled = h.executor.timed_cache(&get("/logo.png")).await;
        assert_eq!(handled.response, stale);
        assert_eq!(h.backend.writes(), 1);
    }

    #[tokio::test]
    async fn test_timed_miss_persists_stamped_copy() {
        let h = harness().await;
        h.transport.route("/data/products.json", ResponseSnapshot::new(200, "[]"));

        let handled = h.executor.timed_cache(&get("/data/products.json")).await;
        assert!(freshness::marker(&handled.response).is_none());
        handled.pending.settle().await;

        let entry = stored(&h, DYNAMIC, "/data/products.json").await.unwrap();
        assert_eq!(entry.response.body, handled.response.body);
        assert!(freshness::marker(&entry.response).is_some());
    }

    #[tokio::test]
    async fn test_timed_miss_error_status_not_persisted() {
        let h = harness().await;

        let handled = h.executor.timed_cache(&get("/nothing.png")).await;
        assert_eq!(handled.response.status, 404);
        assert!(handled.pending.is_empty());
        assert_eq!(h.backend.writes(), 0);
    }

    #[tokio::test]
    async fn test_timed_miss_offline_is_service_unavailable() {
        let h = harness().await;
        h.transport.set_offline(true);

        let handled = h.executor.timed_cache(&get("/logo.png")).await;
        assert_eq!(handled.response.status, 503);
        assert_eq!(handled.response.status_text, "Service Unavailable");
        assert!(handled.response.body.is_empty());
    }

    #[tokio::test]
    async fn test_store_read_failure_is_a_miss() {
        let h = harness().await;
        seed(&h, DYNAMIC, Entry::new(&get("/logo.png"), ResponseSnapshot::new(200, "old"))).await;
        h.backend.set_fail_reads(true);
        h.transport.route("/logo.png", ResponseSnapshot::new(200, "new"));

        let handled = h.executor.timed_cache(&get("/logo.png")).await;
        assert_eq!(handled.response.text(), "new");
    }

    #[tokio::test]
    async fn test_non_get_never_reads_store() {
        let h = harness().await;
        h.transport.route("/logo.png", ResponseSnapshot::new(200, "ok"));

        let handled = h.executor.timed_cache(&InterceptedRequest::new("PUT", url("/logo.png"))).await;
        assert!(handled.pending.is_empty());
        assert_eq!(h.backend.touches(), 0);
    }

    #[test]
    fn test_source_labels_match_serde() {
        for source in [ResponseSource::Network, ResponseSource::Store, ResponseSource::StaleStore, ResponseSource::Fallback] {
            assert_eq!(serde_json::to_value(source).unwrap(), source.as_str());
        }
    }
}
