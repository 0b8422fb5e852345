//! Store inspection tools.

pub mod get;

pub use get::{CacheGetOutput, CacheGetParams, get_impl};
