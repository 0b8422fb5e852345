//! Lifecycle orchestration.
//!
//! [`Engine`] ties the classifier, strategy executor and sync queue to the
//! lifecycle events of the host: install, activate, request, reconnect and
//! control messages.
//!
//! Requests are only intercepted once activation has completed. Activation
//! holds the phase lock exclusively while it sweeps old store generations, so
//! a request arriving mid-sweep waits for it and then sees the new phase.

use std::sync::Arc;

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use swcache_core::{AppConfig, Entry, Error, InterceptedRequest, Store, StoreBackend, StoreRegistry};
use tokio::sync::RwLock;

use crate::classify::Classifier;
use crate::fetch::{self, CacheMode, Transport};
use crate::strategy::{Executor, Handled, ResponseSource};
use crate::sync::{DrainReport, SyncQueue};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Waiting,
    Active,
}

/// Result of precaching the manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub store: String,
    pub cached: Vec<String>,
    pub failed: Vec<String>,
}

impl InstallReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    /// Superseded stores removed by this activation.
    pub deleted: Vec<String>,
}

/// Message received on the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ControlMessage {
    #[serde(alias = "skipWaiting")]
    ForceActivate,
    #[serde(alias = "clearCache")]
    ClearAll,
}

impl ControlMessage {
    pub fn parse(raw: &str) -> Result<Self, Error> {
        serde_json::from_str(raw).map_err(|e| Error::InvalidInput(format!("control message: {e}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ControlReply {
    pub success: bool,
}

pub struct Engine {
    config: AppConfig,
    classifier: Classifier,
    registry: StoreRegistry,
    transport: Arc<dyn Transport>,
    executor: Executor,
    sync: SyncQueue,
    phase: RwLock<Phase>,
}

impl Engine {
    pub fn new(config: AppConfig, backend: Arc<dyn StoreBackend>, transport: Arc<dyn Transport>) -> Result<Self, Error> {
        let classifier = Classifier::from_config(&config)?;
        let registry = StoreRegistry::new(backend, config.namespace_prefix());
        let executor = Executor::new(registry.clone(), Arc::clone(&transport), &config);
        let sync = SyncQueue::new(registry.clone(), Arc::clone(&transport), &config);

        Ok(Self { config, classifier, registry, transport, executor, sync, phase: RwLock::new(Phase::Waiting) })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn registry(&self) -> &StoreRegistry {
        &self.registry
    }

    pub fn sync_queue(&self) -> &SyncQueue {
        &self.sync
    }

    pub async fn is_active(&self) -> bool {
        *self.phase.read().await == Phase::Active
    }

    /// Precache every manifest path into the static store.
    ///
    /// Paths are fetched concurrently and independently; a failed path is
    /// logged and reported without affecting the others.
    pub async fn on_install(&self) -> InstallReport {
        let store_name = self.config.store_names().static_store;
        let store = self.registry.open_store(&store_name).await;
        let results = join_all(self.config.manifest.iter().map(|path| self.precache(&store, path))).await;

        let mut report = InstallReport { store: store_name, ..Default::default() };
        for (path, result) in self.config.manifest.iter().zip(results) {
            match result {
                Ok(()) => report.cached.push(path.clone()),
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "failed to precache asset");
                    report.failed.push(path.clone());
                }
            }
        }
        tracing::info!(store = %report.store, cached = report.cached.len(), failed = report.failed.len(), "install finished");
        report
    }

    async fn precache(&self, store: &Store, path: &str) -> Result<(), Error> {
        let url = fetch::resolve(self.classifier.origin(), path)?;
        let request = InterceptedRequest::get(url);
        let response = self.transport.send(&request, CacheMode::Reload).await?;
        if !response.is_success() {
            return Err(Error::Network(format!("status {}", response.status)));
        }
        store.put(&Entry::new(&request, response)).await
    }

    /// Sweep superseded store generations and start intercepting requests.
    ///
    /// A failed sweep is logged; the engine is activated regardless.
    pub async fn on_activate(&self) -> ActivationReport {
        let mut phase = self.phase.write().await;
        let deleted = match self.registry.activate_version(&self.config.store_names().current()).await {
            Ok(deleted) => deleted,
            Err(e) => {
                tracing::warn!(error = %e, "store sweep failed during activation");
                Vec::new()
            }
        };
        *phase = Phase::Active;
        tracing::info!(deleted = deleted.len(), version = %self.config.version, "activated");
        ActivationReport { deleted }
    }

    /// Handle a request, or return `None` to leave it to the normal network path.
    pub async fn on_request(&self, request: &InterceptedRequest) -> Option<Handled> {
        if !self.is_active().await {
            tracing::debug!(url = %request.url, "not active, request passes through");
            return None;
        }
        let classification = self.classifier.classify(&request.url)?;
        let handled = self.executor.execute(classification, request).await;

        // Any strategy may have fallen back; the sync patterns decide what is queued.
        if self.config.sync.enqueue_failed && request.is_mutating() && handled.source == ResponseSource::Fallback {
            match self.sync.enqueue_failed(request).await {
                Ok(true) => {}
                Ok(false) => tracing::debug!(url = %request.url, "failed request is not a sync task"),
                Err(e) => tracing::warn!(url = %request.url, error = %e, "failed to queue request for sync"),
            }
        }
        Some(handled)
    }

    /// Drain the sync queue when `tag` is the configured sync tag.
    pub async fn on_reconnect(&self, tag: &str) -> Option<DrainReport> {
        if tag != self.config.sync.tag {
            tracing::debug!(tag, "ignoring unknown sync tag");
            return None;
        }
        Some(self.sync.drain().await)
    }

    pub async fn on_control_message(&self, message: ControlMessage) -> Result<Option<ControlReply>, Error> {
        match message {
            ControlMessage::ForceActivate => {
                self.on_activate().await;
                Ok(None)
            }
            ControlMessage::ClearAll => {
                self.registry.clear_all().await?;
                Ok(Some(ControlReply { success: true }))
            }
        }
    }
}
