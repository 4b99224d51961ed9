//! Cache key derivation (§4.12): `cache_domain / prefix / url_encode(namespace) / fingerprint(query)`.

use crate::request::CacheRequest;
use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use sha2::{Digest, Sha256};

/// A stable hash of the query text after whitespace-trim, used as the final
/// key segment so two requests for the same query collide on the same key
/// regardless of surrounding formatting.
pub fn fingerprint(query: &str) -> String {
    let trimmed = query.trim();
    let digest = Sha256::digest(trimmed.as_bytes());
    hex::encode(digest)
}

/// Derives the full cache key for `request` under `cache_domain`/`prefix`.
pub fn derive_key(cache_domain: &str, prefix: &str, request: &CacheRequest) -> String {
    let encoded_namespace = utf8_percent_encode(request.namespace.as_str(), NON_ALPHANUMERIC);
    format!(
        "{cache_domain}/{prefix}/{encoded_namespace}/{}",
        fingerprint(&request.query)
    )
}
