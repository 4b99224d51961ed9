//! Edge response cache (§4.12): a facade over an injected [`CacheSubstrate`]
//! that adds key derivation, admission, TTL, stale-while-revalidate,
//! warming, tag-based invalidation, and optimistic writes on top of a plain
//! key-value `get`/`put`/`delete`.
//!
//! Mirrors `gazette::Router`'s role for RPC transports: the facade itself
//! holds no storage, delegating every read/write to the injected substrate.

mod admission;
mod entry;
pub mod error;
mod invalidate;
mod key;
mod metrics;
mod optimistic;
mod request;
mod substrate;
mod tags;
mod ttl;
mod warm;

pub use admission::{classify_query, should_cache, QueryShape};
pub use entry::CachedResponse;
pub use error::CacheError;
pub use invalidate::{cascade_keys, InvalidationEvent, MutationEvent, MutationOperation};
pub use key::{derive_key, fingerprint};
pub use metrics::{CacheMetrics, CacheMetricsSnapshot};
pub use optimistic::{ConflictReport, ConflictResolution};
pub use request::{infer_request_type, CacheRequest, RequestType};
pub use substrate::{CacheSubstrate, InMemorySubstrate, StoredResponse};
pub use ttl::effective_ttl;
pub use warm::AccessLogEntry;

use std::future::Future;
use std::sync::Arc;

/// Tunables for a [`BrokerEdgeCache`] instance (§4.12).
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub cache_domain: String,
    pub prefix: String,
    pub default_ttl_secs: u64,
    pub max_ttl_secs: u64,
    pub stale_window_secs: u64,
    pub warm_concurrency: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            cache_domain: "edge".to_string(),
            prefix: "query".to_string(),
            default_ttl_secs: ttl::DYNAMIC_TTL_SECS,
            max_ttl_secs: ttl::STATIC_TTL_SECS,
            stale_window_secs: 60,
            warm_concurrency: 10,
        }
    }
}

type InvalidationCallback = dyn Fn(InvalidationEvent) + Send + Sync;

/// The edge cache facade. Cheap to clone-by-reference (wrap in `Arc` at the
/// call site, the way callers wrap `graph-broker`'s other collaborators).
pub struct BrokerEdgeCache {
    substrate: Arc<dyn CacheSubstrate>,
    config: CacheConfig,
    metrics: CacheMetrics,
    on_invalidation: Option<Arc<InvalidationCallback>>,
}

impl BrokerEdgeCache {
    pub fn new(substrate: Arc<dyn CacheSubstrate>, config: CacheConfig) -> Self {
        Self {
            substrate,
            config,
            metrics: CacheMetrics::default(),
            on_invalidation: None,
        }
    }

    pub fn with_on_invalidation(mut self, callback: Arc<InvalidationCallback>) -> Self {
        self.on_invalidation = Some(callback);
        self
    }

    pub fn metrics(&self) -> CacheMetricsSnapshot {
        self.metrics.snapshot()
    }

    fn key_for(&self, request: &CacheRequest) -> String {
        key::derive_key(&self.config.cache_domain, &self.config.prefix, request)
    }

    /// Plain cache read (§4.12 "Get"): a miss on an absent entry, or on a
    /// stale version relative to `request.expected_version`.
    pub async fn get(&self, request: &CacheRequest) -> Option<CachedResponse> {
        self.metrics.record_request();
        let key = self.key_for(request);
        let Some(stored) = self.substrate.get(&key).await else {
            self.metrics.record_miss();
            return None;
        };

        if let Some(expected) = request.expected_version {
            let cached_version: Option<u64> = stored.header(entry::HEADER_VERSION).and_then(|v| v.parse().ok());
            if cached_version.map(|v| v < expected).unwrap_or(false) {
                self.metrics.record_miss();
                return None;
            }
        }

        self.metrics.record_hit();
        Some(to_cached_response(&stored, false))
    }

    /// Writes `data` for `request`, after admission and TTL computation
    /// (§4.12 "Put"). Best-effort: substrate errors are logged, not
    /// propagated, since a cache write failure must never fail the query it
    /// accompanies.
    pub async fn put(&self, request: &CacheRequest, data: serde_json::Value) {
        if !should_cache(request) {
            return;
        }
        self.populate(request, data, false).await;
    }

    /// Writes `data` bypassing admission, used by warming and the
    /// optimistic-write flow, which both write entries a plain `put` would
    /// refuse (warming wants to pre-populate regardless of shape; optimistic
    /// writes mark the entry so `check_conflict` can find it).
    async fn populate(&self, request: &CacheRequest, data: serde_json::Value, optimistic: bool) {
        let shape = classify_query(&request.query);
        let ttl = if optimistic {
            optimistic::OPTIMISTIC_TTL_SECS
        } else {
            ttl::effective_ttl(request.ttl_override, shape, self.config.default_ttl_secs, self.config.max_ttl_secs)
        };
        let tags = tags::query_tags(&request.namespace, &request.query);
        let version = data.get("_version").cloned();
        let headers = entry::build_headers(ttl, self.config.stale_window_secs, &tags, version.as_ref(), optimistic);
        let key = self.key_for(request);
        let bytes = serde_json::to_vec(&data).map(|v| v.len() as u64).unwrap_or(0);

        if let Err(err) = self.substrate.put(&key, StoredResponse { body: data, headers }).await {
            tracing::warn!(%key, error = %err, "cache put failed");
            return;
        }
        self.metrics.record_write(bytes);
    }

    /// Stale-while-revalidate read (§4.12): fresh entries return immediately;
    /// stale entries return immediately too but kick off a detached
    /// background revalidation; anything past the stale window blocks on a
    /// synchronous refresh before returning.
    pub async fn get_or_revalidate<F, Fut>(
        &self,
        request: &CacheRequest,
        revalidate: F,
    ) -> Result<CachedResponse, CacheError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<serde_json::Value, CacheError>> + Send + 'static,
    {
        self.metrics.record_request();
        let key = self.key_for(request);
        let stored = self.substrate.get(&key).await;

        let freshness = stored.as_ref().and_then(|s| {
            let cached_at = s.header(entry::HEADER_CACHED_AT)?.parse::<u64>().ok()?;
            let (max_age, swr) = s
                .header(entry::HEADER_CACHE_CONTROL)
                .map(entry::parse_cache_control)
                .unwrap_or((None, None));
            let age_secs = entry::now_millis().saturating_sub(cached_at) / 1000;
            Some(entry::classify(age_secs, max_age.unwrap_or(0), swr.unwrap_or(0)))
        });

        match (stored, freshness) {
            (Some(stored), Some(entry::Freshness::Fresh)) => {
                self.metrics.record_hit();
                Ok(to_cached_response(&stored, false))
            }
            (Some(stored), Some(entry::Freshness::Stale)) => {
                self.metrics.record_hit();
                let substrate = Arc::clone(&self.substrate);
                let key_for_refresh = key.clone();
                tokio::spawn(async move {
                    match revalidate().await {
                        Ok(fresh) => {
                            // Best-effort rewrite: loses the original tags/TTL
                            // metadata derivation, since the background task
                            // doesn't have the originating request's shape;
                            // it keeps whatever headers were already stored.
                            let mut headers = stored.headers.clone();
                            headers.insert(entry::HEADER_CACHED_AT.to_string(), entry::now_millis().to_string());
                            if let Err(err) = substrate
                                .put(&key_for_refresh, StoredResponse { body: fresh, headers })
                                .await
                            {
                                tracing::warn!(key = %key_for_refresh, error = %err, "background revalidation put failed");
                            }
                        }
                        Err(err) => {
                            tracing::warn!(key = %key_for_refresh, error = %err, "background revalidation failed, keeping stale entry");
                        }
                    }
                });
                Ok(to_cached_response(&stored, true))
            }
            _ => {
                self.metrics.record_miss();
                let fresh = revalidate().await?;
                self.populate(request, fresh.clone(), false).await;
                Ok(CachedResponse {
                    data: fresh,
                    is_stale: false,
                    tags: tags::query_tags(&request.namespace, &request.query),
                    cached_at_millis: entry::now_millis(),
                })
            }
        }
    }

    /// Pre-populates the cache for every query in `queries` (§4.12
    /// "Warming"), `max_concurrency` at a time, skipping queries already
    /// cached when `skip_cached` is set. Writes bypass admission the way
    /// `populate_optimistic` does, since a warming fetch has no request-type
    /// keywords to classify.
    pub async fn warm<F, Fut>(&self, queries: Vec<CacheRequest>, fetch: F, skip_cached: bool)
    where
        F: Fn(CacheRequest) -> Fut + Sync,
        Fut: Future<Output = Result<serde_json::Value, CacheError>> + Send,
    {
        let concurrency = self.config.warm_concurrency;
        let mut to_warm = Vec::with_capacity(queries.len());
        for request in queries {
            if skip_cached {
                let key = self.key_for(&request);
                if self.substrate.get(&key).await.is_some() {
                    continue;
                }
            }
            to_warm.push(request);
        }

        let fetch = &fetch;
        warm::run_batched(to_warm, concurrency, |request| async move {
            match fetch(request.clone()).await {
                Ok(data) => self.populate(&request, data, false).await,
                Err(err) => tracing::warn!(query = %request.query, error = %err, "cache warm fetch failed"),
            }
        })
        .await;
    }

    /// `warm` filtered to queries whose access count meets `min_count`
    /// (§4.12), most-popular first.
    pub async fn warm_by_access_pattern<F, Fut>(&self, log: Vec<AccessLogEntry>, fetch: F, min_count: u64)
    where
        F: Fn(CacheRequest) -> Fut + Sync,
        Fut: Future<Output = Result<serde_json::Value, CacheError>> + Send,
    {
        let queries = warm::filter_by_min_count(log, min_count);
        self.warm(queries, fetch, true).await;
    }

    /// Placeholder tag-purge API (§4.12): the substrate here is a plain
    /// key-value store with no native tag index, so there's nothing to
    /// actually sweep; this reports what a real implementation would have
    /// invalidated.
    pub fn invalidate_by_tags(&self, tags: &[String]) -> serde_json::Value {
        serde_json::json!({"success": true, "invalidated_count": tags.len()})
    }

    /// Invalidates everything derived from a namespace: its tag set and its
    /// base key.
    pub async fn invalidate_namespace(&self, namespace: &broker_types::Namespace) -> serde_json::Value {
        let tags = tags::namespace_tags(namespace);
        let base_key = format!("{}/{}/{}", self.config.cache_domain, self.config.prefix, namespace.as_str());
        self.substrate.delete(&base_key).await;
        self.invalidate_by_tags(&tags)
    }

    /// Deletes a single entry by its request, broadcasting the invalidation
    /// to `on_invalidation` (if configured) for cross-instance coherence.
    pub async fn invalidate_entry(&self, request: &CacheRequest) -> bool {
        let key = self.key_for(request);
        let tags = tags::query_tags(&request.namespace, &request.query);
        let deleted = self.substrate.delete(&key).await;
        if deleted {
            if let Some(callback) = &self.on_invalidation {
                callback(InvalidationEvent { key, tags });
            }
        }
        deleted
    }

    /// Invalidates everything a mutation on `event.entity_id` touched
    /// (§4.12): each of its `affected_tags`, its direct entity key, and, with
    /// `cascade_invalidation`, the derived relation/listing keys.
    pub async fn invalidate_on_mutation(&self, event: &MutationEvent) -> u64 {
        let mut invalidated = 0u64;
        for _tag in &event.affected_tags {
            invalidated += 1;
        }

        let direct_key = event.entity_id.clone();
        self.substrate.delete(&direct_key).await;

        if event.cascade_invalidation {
            for key in invalidate::cascade_keys(&event.entity_id, &direct_key) {
                self.substrate.delete(&key).await;
            }
        }

        invalidated
    }

    /// Mirrors a peer's invalidation locally, by deleting the key it named.
    pub async fn handle_remote_invalidation(&self, event: &InvalidationEvent) -> bool {
        self.substrate.delete(&event.key).await
    }

    /// Writes a tentative value immediately after an optimistic write
    /// (§4.12): a short TTL and a marker header so `check_conflict` knows to
    /// compare it against whatever the server eventually returns.
    pub async fn populate_optimistic(&self, request: &CacheRequest, data: serde_json::Value) {
        self.populate(request, data, true).await;
    }

    /// Overwrites the optimistic entry with the confirmed value, at the full
    /// TTL and without the optimistic marker.
    pub async fn confirm_optimistic(&self, request: &CacheRequest, data: serde_json::Value) {
        self.populate(request, data, false).await;
    }

    /// Discards a failed optimistic write.
    pub async fn rollback_optimistic(&self, request: &CacheRequest) -> bool {
        let key = self.key_for(request);
        self.substrate.delete(&key).await
    }

    /// Compares the cached (possibly optimistic) value for `request` against
    /// `server_data`/`server_version` (§4.12).
    pub async fn check_conflict(
        &self,
        request: &CacheRequest,
        server_data: &serde_json::Value,
        server_version: u64,
    ) -> Option<ConflictReport> {
        let key = self.key_for(request);
        let stored = self.substrate.get(&key).await?;
        let is_optimistic = stored.header(entry::HEADER_OPTIMISTIC) == Some("true");
        let cached_version: Option<u64> = stored.header(entry::HEADER_VERSION).and_then(|v| v.parse().ok());
        optimistic::detect_conflict(is_optimistic, cached_version, server_version, &stored.body, server_data)
    }

    /// Resolves a previously detected conflict and confirms the winning
    /// value (§4.12).
    pub async fn resolve_conflict(
        &self,
        request: &CacheRequest,
        report: &ConflictReport,
        strategy: ConflictResolution,
    ) {
        let resolved = optimistic::resolve(&report.optimistic_value, &report.server_value, strategy);
        self.confirm_optimistic(request, resolved).await;
    }
}

fn to_cached_response(stored: &StoredResponse, is_stale: bool) -> CachedResponse {
    let cached_at_millis = stored
        .header(entry::HEADER_CACHED_AT)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let tags = stored
        .header(entry::HEADER_CACHE_TAGS)
        .map(|v| v.split(',').filter(|t| !t.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();
    CachedResponse {
        data: stored.body.clone(),
        is_stale,
        tags,
        cached_at_millis,
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use broker_types::Namespace;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn cache() -> BrokerEdgeCache {
        BrokerEdgeCache::new(Arc::new(InMemorySubstrate::new()), CacheConfig::default())
    }

    fn request(query: &str) -> CacheRequest {
        CacheRequest::new(Namespace::new("https://example.com/crm/"), query)
    }

    #[tokio::test]
    async fn miss_then_put_then_hit() {
        let cache = cache();
        let req = request("MATCH (a {id: \"1\"}) RETURN a");
        assert!(cache.get(&req).await.is_none());
        cache.put(&req, json!({"name": "Ada"})).await;
        let hit = cache.get(&req).await.unwrap();
        assert_eq!(hit.data, json!({"name": "Ada"}));
        assert!(!hit.is_stale);
        let snapshot = cache.metrics();
        assert_eq!(snapshot.hits, 1);
        assert_eq!(snapshot.misses, 1);
    }

    #[tokio::test]
    async fn mutations_are_never_written_through_put() {
        let cache = cache();
        let req = request("MUTATE createUser");
        cache.put(&req, json!({"ok": true})).await;
        assert!(cache.get(&req).await.is_none());
    }

    #[tokio::test]
    async fn expected_version_ahead_of_cached_is_a_miss() {
        let cache = cache();
        let req = request("MATCH (a {id: \"1\"}) RETURN a");
        cache.put(&req, json!({"_version": 1})).await;
        let mut stale_req = req.clone();
        stale_req.expected_version = Some(2);
        assert!(cache.get(&stale_req).await.is_none());
    }

    #[tokio::test]
    async fn invalidate_entry_removes_it_and_fires_callback() {
        let calls = Arc::new(AtomicU64::new(0));
        let calls_clone = Arc::clone(&calls);
        let cache = cache().with_on_invalidation(Arc::new(move |_event| {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        }));
        let req = request("MATCH (a {id: \"1\"}) RETURN a");
        cache.put(&req, json!({"name": "Ada"})).await;
        assert!(cache.invalidate_entry(&req).await);
        assert!(cache.get(&req).await.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn get_or_revalidate_refreshes_synchronously_on_a_cold_cache() {
        let cache = cache();
        let req = request("MATCH (a {id: \"1\"}) RETURN a");
        let result = cache
            .get_or_revalidate(&req, || async { Ok(json!({"name": "Ada"})) })
            .await
            .unwrap();
        assert_eq!(result.data, json!({"name": "Ada"}));
        assert!(!result.is_stale);
        assert!(cache.get(&req).await.is_some());
    }

    #[tokio::test]
    async fn optimistic_flow_round_trips() {
        let cache = cache();
        let req = request("MATCH (a {id: \"1\"}) RETURN a");
        cache.populate_optimistic(&req, json!({"name": "draft"})).await;
        assert_eq!(cache.get(&req).await.unwrap().data, json!({"name": "draft"}));
        cache.confirm_optimistic(&req, json!({"name": "final"})).await;
        assert_eq!(cache.get(&req).await.unwrap().data, json!({"name": "final"}));
    }

    #[tokio::test]
    async fn rollback_optimistic_discards_the_tentative_value() {
        let cache = cache();
        let req = request("MATCH (a {id: \"1\"}) RETURN a");
        cache.populate_optimistic(&req, json!({"name": "draft"})).await;
        assert!(cache.rollback_optimistic(&req).await);
        assert!(cache.get(&req).await.is_none());
    }

    #[tokio::test]
    async fn check_conflict_detects_divergent_server_value() {
        let cache = cache();
        let req = request("MATCH (a {id: \"1\"}) RETURN a");
        cache
            .populate_optimistic(&req, json!({"name": "draft", "_version": 1}))
            .await;
        let server = json!({"name": "final", "_version": 2});
        let report = cache.check_conflict(&req, &server, 2).await.unwrap();
        assert_eq!(report.server_value, server);

        cache.resolve_conflict(&req, &report, ConflictResolution::Server).await;
        assert_eq!(cache.get(&req).await.unwrap().data, server);
    }
}
