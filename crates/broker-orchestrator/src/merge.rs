//! Merge strategies applied to the parallel cross-shard path's per-step task
//! outputs, after aggregation (computed on the flat union, §4.11) and
//! before pagination (§4.7).

use crate::options::{Consistency, MergeStrategy, OrchestratorOptions, OrderDirection};
use crate::{dedupe, quorum};
use broker_types::{entity_id, BrokerError, Entity};
use indexmap::{IndexMap, IndexSet};
use serde_json::Value;
use std::cmp::Ordering;

/// Combines one-result-per-step `task_results` into a single entity list,
/// per the merge strategy selected by `opts`. Quorum takes priority over
/// `merge_strategy` (it's driven by `consistency`, a separate option); the
/// quorum failure here is fatal even under `allow_partial_results` (§7).
pub fn merge(task_results: Vec<Vec<Entity>>, opts: &OrchestratorOptions) -> Result<Vec<Entity>, BrokerError> {
    if matches!(opts.consistency, Consistency::Quorum) {
        return quorum::apply_quorum(&task_results, opts.quorum_size);
    }

    match opts.merge_strategy {
        Some(MergeStrategy::Intersection) => Ok(intersection(&task_results)),
        Some(MergeStrategy::Ordered) => {
            let field = opts.order_by.as_deref().unwrap_or("");
            Ok(ordered(flatten(task_results), field, opts.order_direction))
        }
        _ if opts.deduplicate => Ok(dedupe::deduplicate(
            flatten(task_results),
            opts.deduplicate_by.as_deref(),
            opts.prefer_newer,
        )),
        _ => {
            let flat = flatten(task_results);
            if opts.preserve_order {
                Ok(flat)
            } else {
                Ok(dedupe::deduplicate(flat, None, false))
            }
        }
    }
}

fn flatten(task_results: Vec<Vec<Entity>>) -> Vec<Entity> {
    task_results.into_iter().flatten().collect()
}

/// Keeps entities whose `$id` appears in every task's result set.
fn intersection(task_results: &[Vec<Entity>]) -> Vec<Entity> {
    if task_results.is_empty() {
        return Vec::new();
    }
    let id_sets: Vec<IndexSet<&str>> = task_results
        .iter()
        .map(|task| task.iter().filter_map(|e| entity_id(e)).collect())
        .collect();

    let mut kept: IndexMap<String, Entity> = IndexMap::new();
    for task in task_results {
        for entity in task {
            if let Some(id) = entity_id(entity) {
                if !kept.contains_key(id) && id_sets.iter().all(|set| set.contains(id)) {
                    kept.insert(id.to_string(), entity.clone());
                }
            }
        }
    }
    kept.into_values().collect()
}

/// Flattens, dedupes by `$id` (first seen), and sorts by `field`: numeric
/// comparison when both sides parse as numbers, lexicographic otherwise.
fn ordered(flat: Vec<Entity>, field: &str, direction: OrderDirection) -> Vec<Entity> {
    let mut deduped = dedupe::deduplicate(flat, None, false);
    deduped.sort_by(|a, b| compare_field(a, b, field));
    if direction == OrderDirection::Desc {
        deduped.reverse();
    }
    deduped
}

fn compare_field(a: &Entity, b: &Entity, field: &str) -> Ordering {
    let av = a.get(field);
    let bv = b.get(field);
    match (av.and_then(Value::as_f64), bv.and_then(Value::as_f64)) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => {
            let a_str = av.and_then(Value::as_str).unwrap_or("");
            let b_str = bv.and_then(Value::as_str).unwrap_or("");
            a_str.cmp(b_str)
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn entity(id: &str, rating: f64) -> Entity {
        json!({"$id": id, "$type": "T", "$context": {}, "rating": rating})
            .as_object()
            .unwrap()
            .clone()
    }

    #[test]
    fn intersection_keeps_only_ids_present_everywhere() {
        let tasks = vec![
            vec![entity("a", 1.0), entity("b", 2.0)],
            vec![entity("a", 1.0)],
        ];
        let out = intersection(&tasks);
        assert_eq!(out.len(), 1);
        assert_eq!(entity_id(&out[0]), Some("a"));
    }

    #[test]
    fn ordered_sorts_numeric_ascending_by_default() {
        let flat = vec![entity("a", 3.0), entity("b", 1.0), entity("c", 2.0)];
        let out = ordered(flat, "rating", OrderDirection::Asc);
        let ratings: Vec<f64> = out.iter().map(|e| e["rating"].as_f64().unwrap()).collect();
        assert_eq!(ratings, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn ordered_descending_reverses() {
        let flat = vec![entity("a", 1.0), entity("b", 3.0)];
        let out = ordered(flat, "rating", OrderDirection::Desc);
        let ratings: Vec<f64> = out.iter().map(|e| e["rating"].as_f64().unwrap()).collect();
        assert_eq!(ratings, vec![3.0, 1.0]);
    }
}
