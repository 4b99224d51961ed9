//! Optimistic write flow (§4.12): populate a tentative value immediately
//! after a write, confirm it once the write lands, roll it back if the write
//! fails, and detect/resolve a conflict if the server's eventual value
//! disagrees with what was shown optimistically.

use serde_json::Value;

pub const OPTIMISTIC_TTL_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictResolution {
    Server,
    Client,
    Merge,
}

/// Returned by `check_conflict` when the server's value disagrees with what
/// was optimistically cached.
#[derive(Debug, Clone, PartialEq)]
pub struct ConflictReport {
    pub has_conflict: bool,
    pub optimistic_value: Value,
    pub server_value: Value,
}

/// Detects a conflict per §4.12: only possible when the cached entry is
/// still marked optimistic and the server's version has since moved past
/// the cached one; even then, it's only a conflict if the compared scalar
/// (`name`) actually differs — an identical eventual value isn't a conflict.
pub fn detect_conflict(
    is_optimistic: bool,
    cached_version: Option<u64>,
    server_version: u64,
    cached_data: &Value,
    server_data: &Value,
) -> Option<ConflictReport> {
    if !is_optimistic {
        return None;
    }
    let cached_version = cached_version?;
    if server_version <= cached_version {
        return None;
    }
    if cached_data.get("name") == server_data.get("name") {
        return None;
    }
    Some(ConflictReport {
        has_conflict: true,
        optimistic_value: cached_data.clone(),
        server_value: server_data.clone(),
    })
}

/// Resolves a conflict per `strategy`. `Merge` is a shallow
/// `{ ...client, ...server }` spread: server fields win on overlapping keys.
pub fn resolve(optimistic_value: &Value, server_value: &Value, strategy: ConflictResolution) -> Value {
    match strategy {
        ConflictResolution::Server => server_value.clone(),
        ConflictResolution::Client => optimistic_value.clone(),
        ConflictResolution::Merge => shallow_merge(optimistic_value, server_value),
    }
}

fn shallow_merge(client: &Value, server: &Value) -> Value {
    let mut merged = client.as_object().cloned().unwrap_or_default();
    if let Some(server_obj) = server.as_object() {
        for (k, v) in server_obj {
            merged.insert(k.clone(), v.clone());
        }
    }
    Value::Object(merged)
}
