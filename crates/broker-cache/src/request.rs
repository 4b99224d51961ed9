//! The query-shaped request the cache facade keys and admits on (§4.12).

use broker_types::Namespace;
use once_cell::sync::Lazy;
use regex::Regex;

/// Inferred from the query text: only `Query` is ever cacheable (§4.12).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Query,
    Mutation,
    Subscription,
}

static MUTATION_KEYWORDS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(MUTATE|INSERT|DELETE|UPDATE)\b").unwrap());
static SUBSCRIBE_KEYWORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bSUBSCRIBE\b").unwrap());

/// Infers a request's type from the raw query keywords (§4.12): any of
/// `MUTATE|INSERT|DELETE|UPDATE` makes it a mutation, `SUBSCRIBE` a
/// subscription, anything else a query.
pub fn infer_request_type(query: &str) -> RequestType {
    if MUTATION_KEYWORDS.is_match(query) {
        RequestType::Mutation
    } else if SUBSCRIBE_KEYWORD.is_match(query) {
        RequestType::Subscription
    } else {
        RequestType::Query
    }
}

/// One cacheable operation: a namespace (for key derivation and tagging), the
/// raw query text (for fingerprinting and shape classification), and the
/// request-scoped cache controls a caller may set.
#[derive(Debug, Clone)]
pub struct CacheRequest {
    pub namespace: Namespace,
    pub query: String,
    pub no_cache: bool,
    pub expected_version: Option<u64>,
    pub ttl_override: Option<u64>,
}

impl CacheRequest {
    pub fn new(namespace: Namespace, query: impl Into<String>) -> Self {
        Self {
            namespace,
            query: query.into(),
            no_cache: false,
            expected_version: None,
            ttl_override: None,
        }
    }

    pub fn request_type(&self) -> RequestType {
        infer_request_type(&self.query)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn classifies_mutation_keywords_case_insensitively() {
        assert_eq!(infer_request_type("mutate { createUser }"), RequestType::Mutation);
        assert_eq!(infer_request_type("INSERT Person"), RequestType::Mutation);
        assert_eq!(infer_request_type("delete where id = 1"), RequestType::Mutation);
    }

    #[test]
    fn classifies_subscribe() {
        assert_eq!(infer_request_type("subscribe { onUpdate }"), RequestType::Subscription);
    }

    #[test]
    fn defaults_to_query() {
        assert_eq!(infer_request_type("MATCH (a) RETURN a"), RequestType::Query);
    }
}
