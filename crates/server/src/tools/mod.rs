//! MCP tool implementations.
//!
//! This module contains all tools exposed by the sw-cache server.

pub mod cache;
pub mod sw_control;
pub mod sw_fetch;
pub mod sw_lifecycle;

pub use sw_control::{SwControlOutput, SwControlParams};
pub use sw_fetch::{HeaderPair, SwFetchOutput, SwFetchParams};
pub use sw_lifecycle::{SwLifecycleOutput, SwLifecycleParams};
