//! Per-shard circuit breaker (§4.3): a process-wide failure counter with
//! closed / open / half-open states.
//!
//! The map itself is guarded by a plain [`std::sync::Mutex`], the same way
//! `gazette::Router`'s channel-state map is guarded — the lock is never held
//! across an `.await`, only while copying a small `Entry` in or out.

use broker_types::{CircuitBreakerSnapshot, CircuitState};
use broker_types::ShardId;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Consecutive failures before a closed breaker trips open.
pub const OPEN_AFTER: u32 = 5;
/// How long an open breaker stays open before allowing a half-open probe.
pub const COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, Copy)]
struct Entry {
    failures: u32,
    state: CircuitState,
    last_failure_time: Option<Instant>,
}

impl Default for Entry {
    fn default() -> Self {
        Self {
            failures: 0,
            state: CircuitState::Closed,
            last_failure_time: None,
        }
    }
}

/// An isolated circuit-breaker registry. Production code normally uses the
/// process-wide [`default_registry`]; tests that need isolation (or that
/// run concurrently and would otherwise clobber each other's shard IDs)
/// construct their own.
#[derive(Default)]
pub struct CircuitBreakerRegistry {
    states: Mutex<HashMap<ShardId, Entry>>,
}

impl CircuitBreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The admission check: true if a call to `shard` should be rejected
    /// without attempting the network. As a side effect, transitions an
    /// open breaker whose cooldown has elapsed into half-open and admits
    /// that probe.
    pub fn is_open(&self, shard: &ShardId) -> bool {
        let mut states = self.states.lock().unwrap();
        let entry = states.entry(shard.clone()).or_default();

        match entry.state {
            CircuitState::Closed => false,
            CircuitState::HalfOpen => false,
            CircuitState::Open => {
                let elapsed = entry
                    .last_failure_time
                    .map(|t| t.elapsed())
                    .unwrap_or(Duration::MAX);
                if elapsed >= COOLDOWN {
                    tracing::debug!(shard = %shard, "circuit breaker cooldown elapsed, admitting half-open probe");
                    entry.state = CircuitState::HalfOpen;
                    false
                } else {
                    true
                }
            }
        }
    }

    pub fn record_success(&self, shard: &ShardId) {
        let mut states = self.states.lock().unwrap();
        let entry = states.entry(shard.clone()).or_default();
        if !matches!(entry.state, CircuitState::Closed) {
            tracing::info!(shard = %shard, from = ?entry.state, "circuit breaker closing after success");
        }
        entry.failures = 0;
        entry.state = CircuitState::Closed;
    }

    pub fn record_failure(&self, shard: &ShardId) {
        let mut states = self.states.lock().unwrap();
        let entry = states.entry(shard.clone()).or_default();

        match entry.state {
            CircuitState::HalfOpen => {
                entry.state = CircuitState::Open;
                entry.last_failure_time = Some(Instant::now());
                tracing::warn!(shard = %shard, "half-open probe failed, re-opening circuit breaker");
            }
            CircuitState::Closed | CircuitState::Open => {
                entry.failures += 1;
                if entry.failures >= OPEN_AFTER {
                    let was_closed = matches!(entry.state, CircuitState::Closed);
                    entry.state = CircuitState::Open;
                    entry.last_failure_time = Some(Instant::now());
                    if was_closed {
                        tracing::warn!(shard = %shard, failures = entry.failures, "circuit breaker opened");
                    }
                }
            }
        }
    }

    pub fn snapshot(&self, shard: &ShardId) -> CircuitBreakerSnapshot {
        let states = self.states.lock().unwrap();
        match states.get(shard) {
            Some(entry) => CircuitBreakerSnapshot {
                failures: entry.failures,
                state: entry.state,
                last_failure_time: entry.last_failure_time,
            },
            None => CircuitBreakerSnapshot::default(),
        }
    }

    /// Clears all breaker state. Intended for test teardown.
    pub fn reset(&self) {
        self.states.lock().unwrap().clear();
    }
}

static DEFAULT_REGISTRY: Lazy<CircuitBreakerRegistry> = Lazy::new(CircuitBreakerRegistry::new);

/// The process-wide registry every production caller shares.
pub fn default_registry() -> &'static CircuitBreakerRegistry {
    &DEFAULT_REGISTRY
}

pub fn is_open(shard: &ShardId) -> bool {
    default_registry().is_open(shard)
}

pub fn record_success(shard: &ShardId) {
    default_registry().record_success(shard)
}

pub fn record_failure(shard: &ShardId) {
    default_registry().record_failure(shard)
}

/// Clears the process-wide registry. Exposed on the client interface (§6)
/// for test isolation.
pub fn reset_circuit_breakers() {
    default_registry().reset()
}
