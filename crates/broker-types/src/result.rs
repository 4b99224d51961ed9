use crate::{Entity, ShardId};
use std::collections::HashMap;
use std::time::Duration;

/// One captured shard failure, recorded when `allow_partial_results` is set
/// and the orchestrator proceeds past a shard error instead of aborting.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ShardErrorRecord {
    pub shard_id: ShardId,
    pub error_code: String,
    pub message: String,
}

/// Per-query execution statistics, surfaced alongside the result entities.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct QueryStats {
    pub shard_queries: u64,
    pub entities_scanned: u64,
    #[serde(with = "duration_millis")]
    pub duration: Duration,
    pub aggregated_value: Option<f64>,
    pub shard_latencies: HashMap<ShardId, Duration>,
    pub partial_failure: bool,
    pub failed_shards: Vec<ShardId>,
    pub errors: Vec<ShardErrorRecord>,
}

impl QueryStats {
    pub fn record_shard_latency(&mut self, shard: ShardId, latency: Duration) {
        self.shard_latencies.insert(shard, latency);
    }

    pub fn record_failure(&mut self, shard: ShardId, error_code: String, message: String) {
        self.partial_failure = true;
        if !self.failed_shards.contains(&shard) {
            self.failed_shards.push(shard.clone());
        }
        self.errors.push(ShardErrorRecord {
            shard_id: shard,
            error_code,
            message,
        });
    }
}

/// The result of executing a [`crate::QueryPlan`]: a page of entities, an
/// opaque continuation cursor, and the stats that produced them.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct QueryResult {
    pub entities: Vec<Entity>,
    pub cursor: Option<String>,
    pub has_more: bool,
    pub stats: QueryStats,
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u128(d.as_millis())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let millis = u64::deserialize(d)?;
        Ok(Duration::from_millis(millis))
    }
}
