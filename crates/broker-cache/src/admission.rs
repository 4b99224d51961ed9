//! Cache admission (§4.12): decides whether a request is even eligible to be
//! cached, before TTL or key derivation matter at all.

use crate::request::{CacheRequest, RequestType};
use once_cell::sync::Lazy;
use regex::Regex;

/// Whether a query's result is expected to change often. Drives the
/// static/dynamic TTL band in [`crate::ttl::effective_ttl`]. The spec leaves
/// the exact classification rule to the implementation; we classify a plain
/// lookup (no traversal, no time-sensitive filter) as `Static` and anything
/// that filters on a time-like field, or traverses the graph, as `Dynamic`,
/// since traversal results shift as edges are added and removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryShape {
    Static,
    Dynamic,
}

static TIME_SENSITIVE_FIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b\w*(time|timestamp|updated_at|created_at|_at)\w*\s*(=|!=|>|<|>=|<=)").unwrap());
static TRAVERSAL_KEYWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)->|<-|\bTRAVERSE\b|\bEXPAND\b").unwrap());

pub fn classify_query(query: &str) -> QueryShape {
    if TIME_SENSITIVE_FIELD.is_match(query) || TRAVERSAL_KEYWORD.is_match(query) {
        QueryShape::Dynamic
    } else {
        QueryShape::Static
    }
}

/// Whether `request` is eligible for caching at all (§4.12): it must be a
/// plain `query` (not a mutation or subscription), must not opt out via
/// `no_cache`, and its shape must not carry mutation keywords or
/// time-sensitive filters that would make a cached answer misleading.
pub fn should_cache(request: &CacheRequest) -> bool {
    if request.no_cache {
        return false;
    }
    if request.request_type() != RequestType::Query {
        return false;
    }
    true
}
