//! Shard dispatch with circuit-breaker admission and replica failover
//! (§4.3, §4.10). Every step execution in this crate funnels through here.

use crate::OrchestratorOptions;
use broker_executor::{ExecutorConfig, StepExecutor};
use broker_types::{BrokerError, Entity, ShardId, Step};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The shard handle a caller supplies to [`crate::orchestrate_query`]:
/// resolves a [`ShardId`] to the stub that talks to it. Implemented for any
/// `Fn(&ShardId) -> Arc<dyn ShardStub>` closure, the same way `gazette`
/// callers hand in a routed dial function rather than a struct.
pub trait ShardStubProvider: Send + Sync {
    fn stub_for(&self, shard: &ShardId) -> Arc<dyn broker_executor::ShardStub>;
}

impl<F> ShardStubProvider for F
where
    F: Fn(&ShardId) -> Arc<dyn broker_executor::ShardStub> + Send + Sync,
{
    fn stub_for(&self, shard: &ShardId) -> Arc<dyn broker_executor::ShardStub> {
        self(shard)
    }
}

/// Checks circuit-breaker admission, then dispatches `step` (with optional
/// traverse/expand source `from`) via the executor.
async fn dispatch_checked(
    step: &Step,
    from: Option<&str>,
    shards: &dyn ShardStubProvider,
    config: ExecutorConfig,
) -> Result<Vec<Entity>, BrokerError> {
    let shard = step.shard();
    if broker_circuit_breaker::is_open(shard) {
        return Err(BrokerError::circuit_open(shard.clone()).with_step_kind(step.kind_name()));
    }
    let stub = shards.stub_for(shard);
    let executor = StepExecutor::new(stub, config);
    executor.execute(step, from).await
}

/// Dispatches `step`, transparently retrying against its configured replica
/// shard on failure when `use_replica_on_failure` is set (§4.10). Returns
/// the outcome, the total end-to-end elapsed time, and whether the replica
/// was used.
pub async fn dispatch_with_failover(
    step: &Step,
    from: Option<&str>,
    shards: &dyn ShardStubProvider,
    opts: &OrchestratorOptions,
) -> (Result<Vec<Entity>, BrokerError>, Duration, bool) {
    let start = Instant::now();
    let config = if opts.allow_partial_results {
        ExecutorConfig {
            max_retries: 0,
            ..opts.executor
        }
    } else {
        opts.executor
    };
    let primary_result = dispatch_checked(step, from, shards, config).await;

    if primary_result.is_ok() || !opts.use_replica_on_failure {
        return (primary_result, start.elapsed(), false);
    }

    let Some(replica) = opts.replica_shards.get(step.shard()) else {
        return (primary_result, start.elapsed(), false);
    };

    tracing::info!(
        primary = %step.shard(),
        replica = %replica,
        "step failed, retrying against replica shard"
    );
    let replica_step = step.with_shard(replica.clone());
    let replica_result = dispatch_checked(&replica_step, from, shards, config).await;
    (replica_result, start.elapsed(), true)
}
