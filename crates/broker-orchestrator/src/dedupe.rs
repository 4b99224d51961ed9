//! Deduplication (§4.9): group entities by `$id`, resolving collisions
//! either by first-seen or by comparing a numeric field.

use broker_types::{entity_id, Entity};
use indexmap::IndexMap;
use serde_json::Value;

/// Deduplicates `entities` by `$id`.
///
/// With `by_field = None`, the first occurrence of each id wins. With a
/// field name and both sides carrying a numeric value for it, the greater
/// value wins when `prefer_newer`, the lesser otherwise. If either side is
/// missing the field or it isn't numeric, the existing (already-kept)
/// entity is retained. Entities without an `$id` can't be deduplicated by
/// id and are passed through unchanged, in their original relative order
/// after the deduplicated entities.
pub fn deduplicate(entities: Vec<Entity>, by_field: Option<&str>, prefer_newer: bool) -> Vec<Entity> {
    let mut by_id: IndexMap<String, Entity> = IndexMap::new();
    let mut anonymous = Vec::new();

    for entity in entities {
        match entity_id(&entity).map(str::to_string) {
            None => anonymous.push(entity),
            Some(id) => match by_id.get(&id) {
                None => {
                    by_id.insert(id, entity);
                }
                Some(existing) => {
                    if should_replace(existing, &entity, by_field, prefer_newer) {
                        by_id.insert(id, entity);
                    }
                }
            },
        }
    }

    let mut out: Vec<Entity> = by_id.into_values().collect();
    out.extend(anonymous);
    out
}

fn should_replace(existing: &Entity, candidate: &Entity, by_field: Option<&str>, prefer_newer: bool) -> bool {
    let Some(field) = by_field else {
        return false;
    };
    match (numeric_field(existing, field), numeric_field(candidate, field)) {
        (Some(old), Some(new)) => {
            if prefer_newer {
                new > old
            } else {
                new < old
            }
        }
        // Non-numeric or absent on either side: keep the existing entity.
        _ => false,
    }
}

fn numeric_field(entity: &Entity, field: &str) -> Option<f64> {
    entity.get(field).and_then(Value::as_f64)
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn entity(id: &str, extra: Value) -> Entity {
        let mut e = json!({"$id": id, "$type": "T", "$context": {}});
        let obj = e.as_object_mut().unwrap();
        if let Value::Object(extra) = extra {
            obj.extend(extra);
        }
        obj.clone()
    }

    #[test]
    fn no_field_keeps_first_seen() {
        let entities = vec![
            entity("a", json!({"v": 1})),
            entity("a", json!({"v": 2})),
        ];
        let out = deduplicate(entities, None, true);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["v"], 1);
    }

    #[test]
    fn prefer_newer_keeps_greater_numeric_value() {
        let entities = vec![
            entity("a", json!({"updated_at": 1})),
            entity("a", json!({"updated_at": 5})),
            entity("a", json!({"updated_at": 3})),
        ];
        let out = deduplicate(entities, Some("updated_at"), true);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0]["updated_at"], 5);
    }

    #[test]
    fn prefer_older_keeps_lesser_numeric_value() {
        let entities = vec![
            entity("a", json!({"updated_at": 5})),
            entity("a", json!({"updated_at": 1})),
        ];
        let out = deduplicate(entities, Some("updated_at"), false);
        assert_eq!(out[0]["updated_at"], 1);
    }

    #[test]
    fn non_numeric_field_keeps_existing() {
        let entities = vec![
            entity("a", json!({"updated_at": "x"})),
            entity("a", json!({"updated_at": 99})),
        ];
        let out = deduplicate(entities, Some("updated_at"), true);
        assert_eq!(out[0]["updated_at"], "x");
    }

    #[test]
    fn distinct_ids_are_all_kept() {
        let entities = vec![entity("a", json!({})), entity("b", json!({}))];
        assert_eq!(deduplicate(entities, None, true).len(), 2);
    }
}
