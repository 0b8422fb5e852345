//! Freshness markers for time-based invalidation.
//!
//! A marker is a response header holding the write time in epoch milliseconds.
//! It lives inside the stored response, so it survives the store round trip
//! along with status and body.

use chrono::{DateTime, TimeDelta, Utc};

use crate::response::ResponseSnapshot;

/// Header carrying the freshness marker.
pub const MARKER_HEADER: &str = "sw-cache-date";

/// Outcome of checking an entry against the expiration threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Marker present and within the threshold.
    Fresh,
    /// Marker present and older than the threshold.
    Expired,
    /// No marker, or one that does not parse.
    Unmarked,
}

/// Attach `at` as the freshness marker, replacing any previous one.
pub fn stamp(mut response: ResponseSnapshot, at: DateTime<Utc>) -> ResponseSnapshot {
    response
        .headers
        .set(MARKER_HEADER, at.timestamp_millis().to_string());
    response
}

/// Read the marker back, if present and well formed.
pub fn marker(response: &ResponseSnapshot) -> Option<DateTime<Utc>> {
    let millis: i64 = response.headers.get(MARKER_HEADER)?.trim().parse().ok()?;
    DateTime::from_timestamp_millis(millis)
}

pub fn check(response: &ResponseSnapshot, threshold: TimeDelta, now: DateTime<Utc>) -> Freshness {
    match marker(response) {
        Some(stamped) if now - stamped > threshold => Freshness::Expired,
        Some(_) => Freshness::Fresh,
        None => Freshness::Unmarked,
    }
}

/// True only for a marked entry older than `threshold`.
pub fn is_expired(response: &ResponseSnapshot, threshold: TimeDelta, now: DateTime<Utc>) -> bool {
    check(response, threshold, now) == Freshness::Expired
}
