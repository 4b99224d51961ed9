/// Errors surfaced by the edge cache facade (§4.12, §7). Cache reads/writes
/// are best-effort by design: most failure paths here are logged and
/// swallowed rather than propagated, so this type is small.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CacheError {
    #[error("cache substrate error: {0}")]
    Substrate(String),

    #[error("conflicting optimistic write: {0}")]
    Conflict(String),
}
