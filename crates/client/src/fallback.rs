//! Offline substitutes served when neither network nor store can answer.
//!
//! Every body here is a constant (the JSON message aside), so these responses
//! are available with no network and an empty or broken store.

use swcache_core::ResponseSnapshot;

/// 300x300 neutral placeholder with an "Offline" caption.
pub const PLACEHOLDER_SVG: &str = concat!(
    r##"<svg width="300" height="300" xmlns="http://www.w3.org/2000/svg">"##,
    r##"<rect width="100%" height="100%" fill="#f0f0f0"/>"##,
    r##"<text x="50%" y="50%" font-family="Arial" font-size="16" fill="#999" text-anchor="middle" dy=".3em">Offline</text>"##,
    "</svg>"
);

pub const OFFLINE_HTML: &str = concat!(
    "<!DOCTYPE html>",
    r#"<html><head><meta charset="utf-8"><title>Offline</title></head>"#,
    "<body><h1>You are offline</h1><p>Check your internet connection and try again.</p></body></html>"
);

pub const OFFLINE_CSS: &str = "/* CSS offline */";

/// Error code carried in the JSON envelope.
pub const OFFLINE_ERROR: &str = "Offline";

pub fn placeholder_image() -> ResponseSnapshot {
    ResponseSnapshot::new(200, PLACEHOLDER_SVG).with_header("Content-Type", "image/svg+xml")
}

pub fn offline_page() -> ResponseSnapshot {
    ResponseSnapshot::new(200, OFFLINE_HTML).with_header("Content-Type", "text/html; charset=utf-8")
}

pub fn offline_stylesheet() -> ResponseSnapshot {
    ResponseSnapshot::new(200, OFFLINE_CSS).with_header("Content-Type", "text/css")
}

/// `{success: false, error: "Offline", message}` with status 503.
pub fn offline_json(message: &str) -> ResponseSnapshot {
    let body = serde_json::json!({
        "success": false,
        "error": OFFLINE_ERROR,
        "message": message,
    });
    ResponseSnapshot::new(503, body.to_string()).with_header("Content-Type", "application/json")
}

/// Empty 503 for the timed strategy when nothing is stored and the network is down.
pub fn service_unavailable() -> ResponseSnapshot {
    ResponseSnapshot::new(503, "")
}
