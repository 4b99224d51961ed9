//! The injected cache collaborator (§4.12, §6): a key-value store keyed by
//! the derived cache key, with headers carried alongside the body so
//! `Cache-Control`/tag/version metadata survives a round trip. Mirrors the
//! role `gazette::Router`'s dialed-channel map plays for RPC transports —
//! production code backs this with a real HTTP-fronted K-V cache, tests back
//! it with [`InMemorySubstrate`].

use crate::error::CacheError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// A stored cache entry: the response body plus the headers it was put with.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResponse {
    pub body: serde_json::Value,
    pub headers: HashMap<String, String>,
}

impl StoredResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

/// A key-value cache substrate: `match` (here `get`), `put`, `delete`, all
/// keyed by the derived cache key string (§4.12 calls the key a "request
/// URL"; we key directly on the derived string rather than modeling a full
/// HTTP request, since that's all the facade ever builds one from).
#[async_trait]
pub trait CacheSubstrate: Send + Sync {
    async fn get(&self, key: &str) -> Option<StoredResponse>;
    async fn put(&self, key: &str, response: StoredResponse) -> Result<(), CacheError>;
    async fn delete(&self, key: &str) -> bool;
}

/// An in-memory substrate for tests and local harnesses, analogous to the
/// `caches.default` store referenced in §6.
#[derive(Default)]
pub struct InMemorySubstrate {
    entries: Mutex<HashMap<String, StoredResponse>>,
}

impl InMemorySubstrate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("substrate mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheSubstrate for InMemorySubstrate {
    async fn get(&self, key: &str) -> Option<StoredResponse> {
        self.entries
            .lock()
            .expect("substrate mutex poisoned")
            .get(key)
            .cloned()
    }

    async fn put(&self, key: &str, response: StoredResponse) -> Result<(), CacheError> {
        self.entries
            .lock()
            .expect("substrate mutex poisoned")
            .insert(key.to_string(), response);
        Ok(())
    }

    async fn delete(&self, key: &str) -> bool {
        self.entries
            .lock()
            .expect("substrate mutex poisoned")
            .remove(key)
            .is_some()
    }
}
