use serde_json::Value;

/// An entity is an opaque JSON object carrying at minimum `$id`, `$type`,
/// `$context`. Extra fields are reached into by string key for aggregation,
/// dedupe, and order-by, so we keep the representation as a plain JSON map
/// rather than a typed struct.
pub type Entity = serde_json::Map<String, Value>;

pub const ID_FIELD: &str = "$id";
pub const TYPE_FIELD: &str = "$type";
pub const CONTEXT_FIELD: &str = "$context";

/// The placeholder identity the step executor assigns to shard payloads that
/// don't already carry `$id`/`$type`/`$context`.
pub const UNKNOWN_ID: &str = "https://unknown";
pub const UNKNOWN_TYPE: &str = "Unknown";

/// Returns the entity's `$id`, if present and a string.
pub fn entity_id(entity: &Entity) -> Option<&str> {
    entity.get(ID_FIELD).and_then(Value::as_str)
}

/// An entity is well-formed per §6 if it already carries the three mandatory
/// `$`-prefixed fields; such entities are forwarded opaquely.
pub fn is_well_formed(value: &Value) -> bool {
    let Some(obj) = value.as_object() else {
        return false;
    };
    obj.contains_key(ID_FIELD) && obj.contains_key(TYPE_FIELD) && obj.contains_key(CONTEXT_FIELD)
}

/// Wraps a bare JSON value that lacks the mandatory fields with a generated
/// `$id`/`$type` pair, per the step executor's entity-parsing rule (§4.4).
pub fn wrap_unknown(value: Value) -> Entity {
    let mut out = serde_json::Map::new();
    out.insert(ID_FIELD.to_string(), Value::String(UNKNOWN_ID.to_string()));
    out.insert(
        TYPE_FIELD.to_string(),
        Value::String(UNKNOWN_TYPE.to_string()),
    );
    out.insert("value".to_string(), value);
    out
}

/// Parses one shard-returned JSON value into an [`Entity`], applying the
/// forward-as-is / wrap-unknown rule from §4.4.
pub fn parse_entity(value: Value) -> Entity {
    if is_well_formed(&value) {
        // `is_well_formed` only succeeds for objects.
        value.as_object().cloned().unwrap()
    } else {
        wrap_unknown(value)
    }
}
