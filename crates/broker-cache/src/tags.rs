//! Cache tag generation (§4.12): derives the invalidation tags a cached
//! entry is written with, so a later mutation can purge everything it
//! touched without tracking individual keys.

use broker_types::Namespace;
use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

static PROPERTY_ACCESS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.([A-Za-z_][A-Za-z0-9_]*)\b").unwrap());
static ENTITY_URL: Lazy<Regex> = Lazy::new(|| Regex::new(r#"https?://[^\s"'\)]+"#).unwrap());

/// Common TLDs that would otherwise be mistaken for a `.field` access when a
/// URL appears inline in a query (`example.com` → the regex would read `com`
/// as a property).
const SKIPPED_TLDS: &[&str] = &["com", "org", "net", "io", "dev"];

/// Tags for a namespace: `ns:<host><path>` plus `host:<host>`. A namespace
/// that doesn't parse as a URL (shouldn't normally happen, since every
/// namespace in this system is derived from one) falls back to `ns:<raw>`.
pub fn namespace_tags(namespace: &Namespace) -> Vec<String> {
    match Url::parse(namespace.as_str()) {
        Ok(url) => {
            let mut tags = vec![format!("ns:{}{}", url.host_str().unwrap_or(""), url.path())];
            if let Some(host) = url.host_str() {
                tags.push(format!("host:{host}"));
            }
            tags
        }
        Err(_) => vec![format!("ns:{}", namespace.as_str())],
    }
}

/// Tags for a full cache entry: the namespace's tags, an `entity:<pathname>`
/// tag for the first entity URL literal found in the query (if any), and a
/// `prop:<name>` tag for each dotted property access, deduplicated.
pub fn query_tags(namespace: &Namespace, query: &str) -> Vec<String> {
    let mut tags = namespace_tags(namespace);

    if let Some(m) = ENTITY_URL.find(query) {
        if let Ok(url) = Url::parse(m.as_str()) {
            tags.push(format!("entity:{}", url.path()));
        }
    }

    for cap in PROPERTY_ACCESS.captures_iter(query) {
        let name = &cap[1];
        if SKIPPED_TLDS.contains(&name) {
            continue;
        }
        tags.push(format!("prop:{name}"));
    }

    dedupe_preserving_order(tags)
}

fn dedupe_preserving_order(tags: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    tags.into_iter().filter(|t| seen.insert(t.clone())).collect()
}
