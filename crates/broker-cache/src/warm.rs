//! Cache warming (§4.12): pre-populate the cache for a batch of queries,
//! bounded by concurrency the same way the orchestrator bounds shard fan-out.

use crate::request::CacheRequest;
use futures::stream::{self, StreamExt};
use std::future::Future;

/// One entry in an access log consulted by `warm_by_access_pattern`: a query
/// and how many times it's been requested recently.
#[derive(Debug, Clone)]
pub struct AccessLogEntry {
    pub request: CacheRequest,
    pub access_count: u64,
}

/// Keeps only the log entries whose access count meets `min_count`, in
/// descending order of popularity so the hottest queries warm first.
pub fn filter_by_min_count(log: Vec<AccessLogEntry>, min_count: u64) -> Vec<CacheRequest> {
    let mut hot: Vec<AccessLogEntry> = log.into_iter().filter(|e| e.access_count >= min_count).collect();
    hot.sort_by(|a, b| b.access_count.cmp(&a.access_count));
    hot.into_iter().map(|e| e.request).collect()
}

/// Runs `f` over every item in `items`, at most `max_concurrency` in flight
/// at once, collecting all outputs (order not preserved).
pub async fn run_batched<T, F, Fut, O>(items: Vec<T>, max_concurrency: usize, f: F) -> Vec<O>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = O>,
{
    stream::iter(items)
        .map(f)
        .buffer_unordered(max_concurrency.max(1))
        .collect()
        .await
}

#[cfg(test)]
mod test {
    use super::*;
    use broker_types::Namespace;
    use pretty_assertions::assert_eq;

    fn entry(query: &str, count: u64) -> AccessLogEntry {
        AccessLogEntry {
            request: CacheRequest::new(Namespace::new("https://example.com/crm/"), query),
            access_count: count,
        }
    }

    #[test]
    fn filters_and_sorts_by_popularity_descending() {
        let log = vec![entry("a", 1), entry("b", 10), entry("c", 5)];
        let hot = filter_by_min_count(log, 5);
        let queries: Vec<_> = hot.iter().map(|r| r.query.as_str()).collect();
        assert_eq!(queries, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn run_batched_collects_every_output() {
        let out = run_batched(vec![1, 2, 3, 4], 2, |n| async move { n * 2 }).await;
        let mut out = out;
        out.sort();
        assert_eq!(out, vec![2, 4, 6, 8]);
    }
}
