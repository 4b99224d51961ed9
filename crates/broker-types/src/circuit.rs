use std::time::Instant;

/// Lifecycle state of a per-shard circuit breaker (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

/// A snapshot of one shard's breaker record. The authoritative, mutable copy
/// lives behind a mutex in `broker-circuit-breaker`; this type is what gets
/// copied out to callers that only need to observe it.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerSnapshot {
    pub failures: u32,
    pub state: CircuitState,
    pub last_failure_time: Option<Instant>,
}

impl Default for CircuitBreakerSnapshot {
    fn default() -> Self {
        Self {
            failures: 0,
            state: CircuitState::Closed,
            last_failure_time: None,
        }
    }
}
