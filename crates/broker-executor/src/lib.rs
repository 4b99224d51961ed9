//! Per-step executor (§4.4): dispatches one [`Step`] to its shard, retrying
//! transient failures with backoff and recording outcomes against the
//! circuit breaker. Mirrors the shape of `gazette::shard::Client`, a routed
//! sub-client that a caller drives one RPC at a time.

mod request;
mod retry;
mod stub;

pub use request::build_request_path;
pub use retry::{backoff_duration, status_is_transient, transport_error_is_transient};
pub use stub::{HttpShardStub, RawShardResponse, ShardRequest, ShardStub, TransportError};

use broker_types::{parse_entity, BrokerError, ErrorKind, Step};
use std::sync::Arc;
use std::time::Duration;

/// Tunables for a single step's dispatch. Defaults match §4.4/§7.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub step_timeout: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_backoff: Duration::from_millis(50),
            max_backoff: Duration::from_secs(2),
            step_timeout: Duration::from_secs(5),
        }
    }
}

/// Executes `step` against `stub`, applying the retry/backoff/timeout
/// policy from §4.4 and recording the outcome on the process-wide circuit
/// breaker. Admission (whether the breaker is even open) is the
/// orchestrator's responsibility, checked before this is called.
///
/// `from` is the source entity id for `traverse`/`expand` steps.
pub async fn execute_step(
    step: &Step,
    from: Option<&str>,
    stub: &dyn ShardStub,
    config: ExecutorConfig,
) -> Result<Vec<broker_types::Entity>, BrokerError> {
    let path = build_request_path(step, from);
    let request = ShardRequest {
        path_and_query: path,
    };
    let shard = step.shard().clone();

    let mut attempt = 0u32;
    loop {
        let outcome = tokio::time::timeout(config.step_timeout, stub.dispatch(&request)).await;

        let dispatch_result = match outcome {
            Ok(result) => result,
            Err(_) => {
                broker_circuit_breaker::record_failure(&shard);
                return Err(BrokerError::timeout("step execution timed out")
                    .with_shard(shard)
                    .with_step_kind(step.kind_name()));
            }
        };

        match classify(dispatch_result, step) {
            Ok(entities) => {
                broker_circuit_breaker::record_success(&shard);
                return Ok(entities);
            }
            Err(err) if err.is_retryable() && attempt < config.max_retries => {
                tracing::warn!(
                    shard = %shard,
                    attempt,
                    error = %err,
                    "transient step failure, retrying"
                );
                let delay = backoff_duration(attempt, config.base_backoff, config.max_backoff);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => {
                broker_circuit_breaker::record_failure(&shard);
                return Err(err);
            }
        }
    }
}

/// Classifies a completed dispatch (transport failure, or a raw HTTP
/// status/body) into either parsed entities or a [`BrokerError`] carrying
/// its transience, per the §7 taxonomy.
fn classify(
    dispatch_result: Result<RawShardResponse, TransportError>,
    step: &Step,
) -> Result<Vec<broker_types::Entity>, BrokerError> {
    let response = match dispatch_result {
        Ok(response) => response,
        Err(transport_err) => {
            let kind = if transport_error_is_transient(&transport_err.0) {
                ErrorKind::TransientShard
            } else {
                ErrorKind::NonTransientShard
            };
            return Err(BrokerError::new(kind, transport_err.0)
                .with_shard(step.shard().clone())
                .with_step_kind(step.kind_name()));
        }
    };

    if !(200..300).contains(&response.status) {
        let kind = if status_is_transient(response.status) {
            ErrorKind::TransientShard
        } else {
            ErrorKind::NonTransientShard
        };
        let message = extract_error_message(&response.body)
            .unwrap_or_else(|| format!("shard responded with status {}", response.status));
        return Err(BrokerError::new(kind, message)
            .with_shard(step.shard().clone())
            .with_step_kind(step.kind_name())
            .with_status_code(response.status));
    }

    match broker_validator::validate_response(&response.body) {
        broker_validator::ValidatedResponse::Success { data } => Ok(entities_from_data(data)),
        broker_validator::ValidatedResponse::Error(err) => Err(BrokerError::new(
            ErrorKind::NonTransientShard,
            err.message,
        )
        .with_shard(step.shard().clone())
        .with_step_kind(step.kind_name())
        .with_error_code(err.code)
        .with_status_code(response.status)),
    }
}

fn extract_error_message(body: &serde_json::Value) -> Option<String> {
    body.get("error")
        .and_then(|e| e.get("message"))
        .and_then(serde_json::Value::as_str)
        .map(str::to_string)
}

fn entities_from_data(data: serde_json::Value) -> Vec<broker_types::Entity> {
    match data {
        serde_json::Value::Array(items) => items.into_iter().map(parse_entity).collect(),
        other => {
            let _ = other;
            Vec::new()
        }
    }
}

/// Convenience wrapper pairing a [`ShardStub`] with its [`ExecutorConfig`],
/// the unit the orchestrator holds one of per shard.
#[derive(Clone)]
pub struct StepExecutor {
    stub: Arc<dyn ShardStub>,
    config: ExecutorConfig,
}

impl StepExecutor {
    pub fn new(stub: Arc<dyn ShardStub>, config: ExecutorConfig) -> Self {
        Self { stub, config }
    }

    pub async fn execute(
        &self,
        step: &Step,
        from: Option<&str>,
    ) -> Result<Vec<broker_types::Entity>, BrokerError> {
        execute_step(step, from, self.stub.as_ref(), self.config).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use async_trait::async_trait;
    use broker_types::ShardId;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct ScriptedStub {
        responses: std::sync::Mutex<Vec<Result<RawShardResponse, TransportError>>>,
        calls: AtomicU32,
    }

    #[async_trait]
    impl ShardStub for ScriptedStub {
        async fn dispatch(
            &self,
            _request: &ShardRequest,
        ) -> Result<RawShardResponse, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses.lock().unwrap().remove(0)
        }
    }

    fn lookup_step() -> Step {
        Step::Lookup {
            shard: ShardId::new("shard-0-aa"),
            entity_ids: vec!["https://x/1".into()],
        }
    }

    fn fast_config() -> ExecutorConfig {
        ExecutorConfig {
            max_retries: 3,
            base_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(10),
            step_timeout: Duration::from_millis(500),
        }
    }

    #[tokio::test]
    async fn succeeds_on_first_try_and_parses_entities() {
        broker_circuit_breaker::reset_circuit_breakers();
        let stub = ScriptedStub {
            responses: std::sync::Mutex::new(vec![Ok(RawShardResponse {
                status: 200,
                body: json!({"success": true, "data": [{"$id": "https://x/1", "$type": "Person", "$context": {}}]}),
            })]),
            calls: AtomicU32::new(0),
        };
        let step = lookup_step();
        let result = execute_step(&step, None, &stub, fast_config()).await.unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_transport_failure_then_succeeds() {
        broker_circuit_breaker::reset_circuit_breakers();
        let stub = ScriptedStub {
            responses: std::sync::Mutex::new(vec![
                Err(TransportError("connection refused".into())),
                Ok(RawShardResponse {
                    status: 200,
                    body: json!({"success": true, "data": []}),
                }),
            ]),
            calls: AtomicU32::new(0),
        };
        let step = lookup_step();
        let result = execute_step(&step, None, &stub, fast_config()).await.unwrap();
        assert_eq!(result.len(), 0);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_transient_status_is_not_retried() {
        broker_circuit_breaker::reset_circuit_breakers();
        let stub = ScriptedStub {
            responses: std::sync::Mutex::new(vec![Ok(RawShardResponse {
                status: 404,
                body: json!({"error": {"message": "not found"}}),
            })]),
            calls: AtomicU32::new(0),
        };
        let step = lookup_step();
        let err = execute_step(&step, None, &stub, fast_config())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NonTransientShard);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausting_retries_surfaces_the_last_error() {
        broker_circuit_breaker::reset_circuit_breakers();
        let stub = ScriptedStub {
            responses: std::sync::Mutex::new(vec![
                Err(TransportError("connection reset".into())),
                Err(TransportError("connection reset".into())),
                Err(TransportError("connection reset".into())),
                Err(TransportError("connection reset".into())),
            ]),
            calls: AtomicU32::new(0),
        };
        let step = lookup_step();
        let err = execute_step(&step, None, &stub, fast_config())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::TransientShard);
        assert_eq!(stub.calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn validator_error_is_not_retried_even_on_2xx() {
        broker_circuit_breaker::reset_circuit_breakers();
        let stub = ScriptedStub {
            responses: std::sync::Mutex::new(vec![Ok(RawShardResponse {
                status: 200,
                body: json!({"success": false, "error": {"code": "BAD_QUERY", "message": "nope"}}),
            })]),
            calls: AtomicU32::new(0),
        };
        let step = lookup_step();
        let err = execute_step(&step, None, &stub, fast_config())
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::NonTransientShard);
        assert_eq!(err.error_code.as_deref(), Some("BAD_QUERY"));
        assert_eq!(stub.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn wraps_bare_values_returned_from_a_traverse_step() {
        broker_circuit_breaker::reset_circuit_breakers();
        let stub = ScriptedStub {
            responses: std::sync::Mutex::new(vec![Ok(RawShardResponse {
                status: 200,
                body: json!([{"name": "Ada"}]),
            })]),
            calls: AtomicU32::new(0),
        };
        let step = Step::Traverse {
            shard: ShardId::new("shard-0-aa"),
            predicate: "knows".into(),
        };
        let result = execute_step(&step, Some("https://x/1"), &stub, fast_config())
            .await
            .unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(
            result[0].get("$id").unwrap().as_str(),
            Some("https://unknown")
        );
    }

    #[tokio::test]
    async fn non_array_data_on_a_success_response_yields_no_entities() {
        broker_circuit_breaker::reset_circuit_breakers();
        let stub = ScriptedStub {
            responses: std::sync::Mutex::new(vec![Ok(RawShardResponse {
                status: 200,
                body: json!({"success": true, "data": {"name": "Ada"}}),
            })]),
            calls: AtomicU32::new(0),
        };
        let step = lookup_step();
        let result = execute_step(&step, None, &stub, fast_config()).await.unwrap();
        assert_eq!(result, Vec::new());
    }
}
