//! Entry key hashing.

use sha2::{Digest, Sha256};

use crate::request::RequestKey;

/// Compute the primary-key hash for a stored entry.
pub fn compute_entry_key(key: &RequestKey) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.method.as_bytes());
    hasher.update(b"\n");
    hasher.update(key.url.as_bytes());
    hex::encode(hasher.finalize())
}
