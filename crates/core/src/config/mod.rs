//! Engine configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SWCACHE_*)
//! 2. TOML config file (if SWCACHE_CONFIG_FILE set)
//! 3. Built-in defaults
//!
//! Store names are derived from `namespace` and `version`; changing the version
//! retires the previous generation on the next activation.

use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SWCACHE_*)
/// 2. TOML config file (if SWCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the SQLite store database.
    ///
    /// Set via SWCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// The origin this layer serves (scheme, host and port).
    ///
    /// Set via SWCACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Prefix shared by every store this engine owns.
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Version tag baked into store names.
    #[serde(default = "default_version")]
    pub version: String,

    /// Cross-origin hosts whose media is cached (subdomains included).
    #[serde(default = "default_media_hosts")]
    pub media_hosts: Vec<String>,

    /// Path fragments that mark server-side endpoints which must never be cached.
    #[serde(default = "default_network_only_markers")]
    pub network_only_markers: Vec<String>,

    /// Path suffixes served network-first.
    #[serde(default = "default_network_first_suffixes")]
    pub network_first_suffixes: Vec<String>,

    /// Age after which a timed entry is refreshed, in seconds.
    #[serde(default = "default_expiration_secs")]
    pub expiration_secs: u64,

    /// Treat entries without a freshness marker as expired.
    #[serde(default)]
    pub expire_unmarked: bool,

    /// Origin-relative paths precached into the static store at install time.
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// User-Agent string for outbound requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes to accept per response.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Human-readable text placed in the offline JSON envelope.
    #[serde(default = "default_offline_message")]
    pub offline_message: String,

    /// Deferred-write replay settings.
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Settings for the deferred-write sync queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Reconnect tag that triggers a drain.
    #[serde(default = "default_sync_tag")]
    pub tag: String,

    /// URL fragments identifying mutating endpoints.
    #[serde(default = "default_sync_patterns")]
    pub patterns: Vec<String>,

    /// Replays allowed before a task is dropped; unbounded when unset.
    #[serde(default)]
    pub max_replay_attempts: Option<u32>,

    /// Queue mutating requests that fail on the request path.
    #[serde(default)]
    pub enqueue_failed: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            tag: default_sync_tag(),
            patterns: default_sync_patterns(),
            max_replay_attempts: None,
            enqueue_failed: false,
        }
    }
}

/// Names of the current store generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreNames {
    /// Precached origin assets.
    pub static_store: String,
    /// Runtime write-backs and sync tasks.
    pub dynamic_store: String,
}

impl StoreNames {
    /// Both names as a set, for activation sweeps.
    pub fn current(&self) -> HashSet<String> {
        HashSet::from([self.static_store.clone(), self.dynamic_store.clone()])
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./swcache-store.sqlite")
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_namespace() -> String {
    "swcache".into()
}

fn default_version() -> String {
    "1.0.0".into()
}

fn default_media_hosts() -> Vec<String> {
    vec!["cloudinary.com".into()]
}

fn default_network_only_markers() -> Vec<String> {
    vec![".php".into()]
}

fn default_network_first_suffixes() -> Vec<String> {
    vec![".html".into(), ".js".into(), ".css".into()]
}

fn default_expiration_secs() -> u64 {
    24 * 60 * 60
}

fn default_manifest() -> Vec<String> {
    vec!["/".into(), "/index.html".into(), "/style.css".into(), "/script.js".into()]
}

fn default_user_agent() -> String {
    "swcache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    5_242_880 // 5MB
}

fn default_offline_message() -> String {
    "The network connection is unavailable. Please try again.".into()
}

fn default_sync_tag() -> String {
    "sync-orders".into()
}

fn default_sync_patterns() -> Vec<String> {
    vec!["checkout.php".into(), "order".into()]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            origin: default_origin(),
            namespace: default_namespace(),
            version: default_version(),
            media_hosts: default_media_hosts(),
            network_only_markers: default_network_only_markers(),
            network_first_suffixes: default_network_first_suffixes(),
            expiration_secs: default_expiration_secs(),
            expire_unmarked: false,
            manifest: default_manifest(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            offline_message: default_offline_message(),
            sync: SyncConfig::default(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Expiration threshold for the timed strategy.
    pub fn expiration(&self) -> chrono::TimeDelta {
        i64::try_from(self.expiration_secs)
            .ok()
            .and_then(chrono::TimeDelta::try_seconds)
            .unwrap_or(chrono::TimeDelta::MAX)
    }

    /// Prefix that marks a store as owned by this engine.
    pub fn namespace_prefix(&self) -> String {
        format!("{}-", self.namespace)
    }

    /// Store names for the configured version.
    pub fn store_names(&self) -> StoreNames {
        StoreNames {
            static_store: format!("{}-static-v{}", self.namespace, self.version),
            dynamic_store: format!("{}-dynamic-v{}", self.namespace, self.version),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SWCACHE_`
    /// 2. TOML file from `SWCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SWCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SWCACHE_")
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
