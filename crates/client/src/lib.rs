//! Strategy engine for swcache.
//!
//! This crate provides the request classifier, the caching strategies, offline
//! fallbacks, the background sync queue and the lifecycle engine that drives
//! them, plus the reqwest transport used by the server.

pub mod classify;
pub mod engine;
pub mod fallback;
pub mod fetch;
pub mod strategy;
pub mod sync;

#[cfg(test)]
pub(crate) mod test_support;

pub use classify::{Classification, Classifier};
pub use engine::{ActivationReport, ControlMessage, ControlReply, Engine, InstallReport};
pub use fetch::{CacheMode, FetchClient, FetchConfig, Transport};
pub use strategy::{Executor, Handled, PendingWrites, ResponseSource};
pub use sync::{DrainReport, SyncQueue};
