//! Field removal and redaction (§4.2), applied to a validated response body
//! before it's handed back to a caller that shouldn't see certain fields.

use serde_json::Value;

pub const REDACTED: &str = "[REDACTED]";

/// Removes `remove` fields entirely and overwrites `redact` fields with the
/// literal string `"[REDACTED]"`. Field names are dotted paths
/// (`profile.ssn`); array indices are not addressable here since sanitize
/// targets shaped records, not arbitrary collections.
pub fn sanitize(value: &Value, remove: &[&str], redact: &[&str]) -> Value {
    let mut out = value.clone();
    for path in remove {
        remove_path(&mut out, path);
    }
    for path in redact {
        set_path(&mut out, path, Value::String(REDACTED.to_string()));
    }
    out
}

fn remove_path(value: &mut Value, path: &str) {
    let mut segments = path.split('.').peekable();
    let mut current = value;
    while let Some(segment) = segments.next() {
        let Some(obj) = current.as_object_mut() else {
            return;
        };
        if segments.peek().is_none() {
            obj.remove(segment);
            return;
        }
        match obj.get_mut(segment) {
            Some(next) => current = next,
            None => return,
        }
    }
}

fn set_path(value: &mut Value, path: &str, new_value: Value) {
    let mut segments = path.split('.').peekable();
    let mut current = value;
    while let Some(segment) = segments.next() {
        let Some(obj) = current.as_object_mut() else {
            return;
        };
        if segments.peek().is_none() {
            obj.insert(segment.to_string(), new_value);
            return;
        }
        match obj.get_mut(segment) {
            Some(next) => current = next,
            None => return,
        }
    }
}
