//! Cache entry headers and freshness classification (§4.12).
//!
//! Every value the facade needs to re-derive at `get` time — TTL, the
//! stale-while-revalidate window, tags, a version marker, when the entry was
//! written — travels as a header on the stored response rather than in a
//! side table, so the substrate stays a plain key-value store.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_CACHE_CONTROL: &str = "Cache-Control";
pub const HEADER_CACHED_AT: &str = "X-Cached-At";
pub const HEADER_CACHE_TAGS: &str = "X-Cache-Tags";
pub const HEADER_VERSION: &str = "X-Cache-Version";
pub const HEADER_OPTIMISTIC: &str = "X-Optimistic";

/// A cache hit as handed back to callers: the body, whether it's being
/// served stale while a revalidation is in flight, its tags, and when it was
/// written.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub data: serde_json::Value,
    pub is_stale: bool,
    pub tags: Vec<String>,
    pub cached_at_millis: u64,
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is after the unix epoch")
        .as_millis() as u64
}

/// Builds `Cache-Control: public, max-age=T, s-maxage=T, stale-while-revalidate=S`.
pub fn build_cache_control(ttl_secs: u64, stale_window_secs: u64) -> String {
    format!("public, max-age={ttl_secs}, s-maxage={ttl_secs}, stale-while-revalidate={stale_window_secs}")
}

/// Parses back `max-age` and `stale-while-revalidate` from a `Cache-Control`
/// header value. Missing or malformed directives are simply absent.
pub fn parse_cache_control(value: &str) -> (Option<u64>, Option<u64>) {
    let mut max_age = None;
    let mut stale_while_revalidate = None;
    for directive in value.split(',') {
        let directive = directive.trim();
        if let Some(n) = directive.strip_prefix("max-age=") {
            max_age = n.parse().ok();
        } else if let Some(n) = directive.strip_prefix("stale-while-revalidate=") {
            stale_while_revalidate = n.parse().ok();
        }
    }
    (max_age, stale_while_revalidate)
}

pub fn build_headers(
    ttl_secs: u64,
    stale_window_secs: u64,
    tags: &[String],
    version: Option<&serde_json::Value>,
    optimistic: bool,
) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    headers.insert(HEADER_CONTENT_TYPE.to_string(), "application/json".to_string());
    headers.insert(
        HEADER_CACHE_CONTROL.to_string(),
        build_cache_control(ttl_secs, stale_window_secs),
    );
    headers.insert(HEADER_CACHE_TAGS.to_string(), tags.join(","));
    headers.insert(HEADER_CACHED_AT.to_string(), now_millis().to_string());
    if let Some(version) = version {
        headers.insert(HEADER_VERSION.to_string(), version.to_string());
    }
    if optimistic {
        headers.insert(HEADER_OPTIMISTIC.to_string(), "true".to_string());
    }
    headers
}

/// The three age bands from §4.12: fresh (`a <= max_age`), stale
/// (`max_age < a <= max_age + stale_window`), expired (`a > max_age + stale_window`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    Stale,
    Expired,
}

pub fn classify(age_secs: u64, max_age: u64, stale_window: u64) -> Freshness {
    if age_secs <= max_age {
        Freshness::Fresh
    } else if age_secs <= max_age + stale_window {
        Freshness::Stale
    } else {
        Freshness::Expired
    }
}
