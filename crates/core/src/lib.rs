//! Core types and shared functionality for swcache.
//!
//! This crate provides:
//! - Request, response and entry data model
//! - Versioned store registry with a SQLite backend
//! - Freshness markers for time-based invalidation
//! - Unified error types
//! - Configuration structures

pub mod config;
pub mod error;
pub mod freshness;
pub mod headers;
pub mod request;
pub mod response;
pub mod store;

pub use config::{AppConfig, ConfigError, StoreNames, SyncConfig};
pub use error::Error;
pub use headers::Headers;
pub use request::{InterceptedRequest, RequestKey};
pub use response::ResponseSnapshot;
pub use store::{CacheDb, Entry, Store, StoreBackend, StoreRegistry};
