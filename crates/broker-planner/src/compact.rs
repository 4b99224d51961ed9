//! Batch-lookup compaction (§4.6): collapses multiple `lookup` steps
//! targeting the same shard into one, leaving other step kinds untouched.

use broker_types::{ShardId, Step};

/// Partitions `steps` into lookups (grouped by shard, IDs unioned with
/// at-least-once inclusion) and everything else (left in original order,
/// appended after the compacted lookups).
pub fn batch_lookups(steps: Vec<Step>) -> Vec<Step> {
    let mut shard_order: Vec<ShardId> = Vec::new();
    let mut ids_by_shard: std::collections::HashMap<ShardId, Vec<String>> =
        std::collections::HashMap::new();
    let mut rest = Vec::new();

    for step in steps {
        match step {
            Step::Lookup { shard, entity_ids } => {
                let bucket = ids_by_shard.entry(shard.clone()).or_insert_with(|| {
                    shard_order.push(shard.clone());
                    Vec::new()
                });
                for id in entity_ids {
                    if !bucket.contains(&id) {
                        bucket.push(id);
                    }
                }
            }
            other => rest.push(other),
        }
    }

    let mut out: Vec<Step> = shard_order
        .into_iter()
        .map(|shard| {
            let entity_ids = ids_by_shard.remove(&shard).unwrap_or_default();
            Step::Lookup { shard, entity_ids }
        })
        .collect();
    out.extend(rest);
    out
}
