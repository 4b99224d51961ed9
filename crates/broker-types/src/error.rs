use crate::ShardId;

/// The error taxonomy from §7: every failure the core produces is one of
/// these kinds, which determines retryability and how it's surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    TransientShard,
    NonTransientShard,
    CircuitOpen,
    Timeout,
    QuorumFailure,
    MalformedResponse,
}

impl ErrorKind {
    /// Only [`ErrorKind::TransientShard`] errors are retried by the step
    /// executor (§4.4, §7).
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::TransientShard)
    }
}

/// A classified broker error, shared by the step executor, orchestrator, and
/// planner so they can propagate a uniform shape up to `graph-broker`.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct BrokerError {
    pub kind: ErrorKind,
    pub message: String,
    pub shard_id: Option<ShardId>,
    pub error_code: Option<String>,
    pub step_kind: Option<&'static str>,
    pub status_code: Option<u16>,
}

impl BrokerError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            shard_id: None,
            error_code: None,
            step_kind: None,
            status_code: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn circuit_open(shard_id: ShardId) -> Self {
        Self::new(
            ErrorKind::CircuitOpen,
            format!("Circuit breaker open for {shard_id}"),
        )
        .with_shard(shard_id)
    }

    pub fn quorum_not_reached() -> Self {
        Self::new(ErrorKind::QuorumFailure, "Quorum not reached")
    }

    pub fn malformed_response(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedResponse, message).with_error_code("MALFORMED_RESPONSE")
    }

    pub fn with_shard(mut self, shard_id: ShardId) -> Self {
        self.shard_id = Some(shard_id);
        self
    }

    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    pub fn with_step_kind(mut self, kind: &'static str) -> Self {
        self.step_kind = Some(kind);
        self
    }

    pub fn with_status_code(mut self, status: u16) -> Self {
        self.status_code = Some(status);
        self
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
