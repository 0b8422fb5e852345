//! Request classification.
//!
//! Maps a request URL to the strategy that serves it. Classification is a pure
//! function of the URL: no store or network access, no state between calls.
//!
//! Rules, first match wins:
//! 1. Foreign origin outside the media allowlist: not intercepted.
//! 2. Allowlisted media host: cross-origin media, cache first.
//! 3. Path contains a network-only marker: network only.
//! 4. Path ends with a document/script/stylesheet suffix or `/`: network first.
//! 5. Path is in the precache manifest: origin asset, cache first.
//! 6. Anything else: timed cache.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use swcache_core::{AppConfig, Error};
use url::Url;

/// Strategy category assigned to an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Classification {
    NetworkOnly,
    OriginAssetCacheFirst,
    #[serde(rename = "html-js-css-network-first")]
    NetworkFirst,
    CrossOriginMediaCacheFirst,
    DefaultTimedCache,
}

impl Classification {
    pub fn as_str(self) -> &'static str {
        match self {
            Classification::NetworkOnly => "network-only",
            Classification::OriginAssetCacheFirst => "origin-asset-cache-first",
            Classification::NetworkFirst => "html-js-css-network-first",
            Classification::CrossOriginMediaCacheFirst => "cross-origin-media-cache-first",
            Classification::DefaultTimedCache => "default-timed-cache",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Classifier {
    origin: Url,
    media_hosts: Vec<String>,
    network_only_markers: Vec<String>,
    network_first_suffixes: Vec<String>,
    manifest_paths: HashSet<String>,
}

impl Classifier {
    pub fn from_config(config: &AppConfig) -> Result<Self, Error> {
        let origin = Url::parse(&config.origin).map_err(|e| Error::Config(format!("origin {}: {e}", config.origin)))?;
        if origin.host_str().is_none() {
            return Err(Error::Config(format!("origin {} has no host", config.origin)));
        }

        Ok(Self {
            origin,
            media_hosts: config
                .media_hosts
                .iter()
                .map(|h| h.trim().trim_matches('.').to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
            network_only_markers: config.network_only_markers.iter().filter(|m| !m.is_empty()).cloned().collect(),
            network_first_suffixes: config.network_first_suffixes.iter().filter(|s| !s.is_empty()).cloned().collect(),
            manifest_paths: config.manifest.iter().cloned().collect(),
        })
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    /// Classify `url`, or `None` when the request is left to the normal network path.
    pub fn classify(&self, url: &Url) -> Option<Classification> {
        let same_origin = url.origin() == self.origin.origin();
        let trusted_media = url.host_str().is_some_and(|host| self.is_trusted_media_host(host));

        if !same_origin && !trusted_media {
            return None;
        }
        if trusted_media {
            return Some(Classification::CrossOriginMediaCacheFirst);
        }

        let path = url.path();
        if self.network_only_markers.iter().any(|m| path.contains(m.as_str())) {
            return Some(Classification::NetworkOnly);
        }
        if path.ends_with('/') || self.network_first_suffixes.iter().any(|s| path.ends_with(s.as_str())) {
            return Some(Classification::NetworkFirst);
        }
        if self.manifest_paths.contains(path) {
            return Some(Classification::OriginAssetCacheFirst);
        }
        Some(Classification::DefaultTimedCache)
    }

    /// Hostname equals an allowlisted host or is a subdomain of one.
    ///
    /// Only the host component is compared, so a path segment such as
    /// `evil.com/cloudinary.com/x` cannot pass.
    pub fn is_trusted_media_host(&self, host: &str) -> bool {
        let host = host.trim_end_matches('.').to_ascii_lowercase();
        self.media_hosts.iter().any(|allowed| {
            host == *allowed
                || host
                    .strip_suffix(allowed.as_str())
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }
}
