//! Quorum consistency (§4.8): best-of-N agreement on read value across
//! shard replies, not a consensus protocol (§1 non-goals).

use broker_types::{entity_id, BrokerError, Entity};
use indexmap::IndexMap;
use serde_json::Value;

/// Groups `task_results` (one entry per parallel task) by `$id`, and for
/// each id buckets its occurrences by content fingerprint (its non-`$`
/// fields, sorted and serialized). An id whose largest bucket reaches
/// `quorum_size` contributes that bucket's entity to the result; if any id
/// falls short, the whole query fails — quorum here is all-or-nothing.
pub fn apply_quorum(task_results: &[Vec<Entity>], quorum_size: usize) -> Result<Vec<Entity>, BrokerError> {
    let mut occurrences: IndexMap<String, Vec<(String, Entity)>> = IndexMap::new();

    for task in task_results {
        for entity in task {
            let Some(id) = entity_id(entity) else {
                continue;
            };
            let fingerprint = content_fingerprint(entity);
            occurrences
                .entry(id.to_string())
                .or_default()
                .push((fingerprint, entity.clone()));
        }
    }

    let mut result = Vec::with_capacity(occurrences.len());
    for (_id, entries) in occurrences {
        let mut buckets: IndexMap<String, (usize, Entity)> = IndexMap::new();
        for (fingerprint, entity) in entries {
            let bucket = buckets
                .entry(fingerprint)
                .or_insert_with(|| (0, entity.clone()));
            bucket.0 += 1;
        }

        let winner = buckets.into_values().max_by_key(|(count, _)| *count);
        match winner {
            Some((count, entity)) if count >= quorum_size => result.push(entity),
            _ => return Err(BrokerError::quorum_not_reached()),
        }
    }

    Ok(result)
}

/// A stable fingerprint of an entity's non-`$`-prefixed fields: alphabetize
/// the keys, then serialize to JSON. Two entities differing only in `$type`
/// or `$context` fingerprint identically (§9 open question — the reference
/// hashes only non-`$` fields, so those differences are invisible to
/// quorum; we keep that behavior rather than guess at an intended fix).
fn content_fingerprint(entity: &Entity) -> String {
    let mut fields: Vec<(&String, &Value)> = entity
        .iter()
        .filter(|(key, _)| !key.starts_with('$'))
        .collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));
    let map: serde_json::Map<String, Value> = fields
        .into_iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    serde_json::to_string(&map).unwrap_or_default()
}
