//! Intercepted requests and their store identity.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::headers::Headers;

/// Methods that change server state and are candidates for deferred replay.
const MUTATING_METHODS: &[&str] = &["POST", "PUT", "PATCH", "DELETE"];

/// A request handed to the engine by the embedding application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedRequest {
    pub method: String,
    pub url: Url,
    pub headers: Headers,
    pub body: Option<Bytes>,
}

impl InterceptedRequest {
    /// Build a request, upper-casing the method.
    pub fn new(method: &str, url: Url) -> Self {
        Self { method: method.to_ascii_uppercase(), url, headers: Headers::new(), body: None }
    }

    pub fn get(url: Url) -> Self {
        Self::new("GET", url)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == "GET"
    }

    pub fn is_mutating(&self) -> bool {
        MUTATING_METHODS.contains(&self.method.as_str())
    }

    /// Identity under which this request is stored.
    pub fn key(&self) -> RequestKey {
        RequestKey::new(&self.method, &self.url)
    }
}

/// Normalized store identity: method plus URL without fragment.
///
/// The `url` crate already lowercases hosts and drops default ports, so
/// stripping the fragment is the only normalization left to do here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: &str, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self { method: method.to_ascii_uppercase(), url: url.into() }
    }

    /// Shorthand for the GET identity of `url`.
    pub fn get(url: &Url) -> Self {
        Self::new("GET", url)
    }

    /// Method changes server state (POST, PUT, PATCH, DELETE).
    pub fn is_mutating(&self) -> bool {
        MUTATING_METHODS.contains(&self.method.as_str())
    }

    /// Whether the URL contains any of `patterns`.
    pub fn matches_any(&self, patterns: &[String]) -> bool {
        patterns.iter().any(|p| !p.is_empty() && self.url.contains(p.as_str()))
    }
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}
