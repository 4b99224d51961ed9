//! The parallel cross-shard path (§4.7): every step is a `lookup`, so each
//! dispatches independently — concurrently, bounded by `max_concurrency`,
//! unless `early_termination` asks for one-at-a-time short-circuiting.

use crate::dedupe;
use crate::dispatch::{dispatch_with_failover, ShardStubProvider};
use crate::{Deadline, OrchestratorOptions};
use broker_types::{BrokerError, Entity, QueryPlan, QueryStats};
use futures::stream::{self, StreamExt};

/// One per-step task output, retaining its original plan index so
/// `preserve_order` can restore plan order before merging.
pub struct TaskResult {
    pub index: usize,
    pub entities: Vec<Entity>,
}

/// Dispatches every lookup step concurrently (bounded by `max_concurrency`),
/// records stats, and returns one entry per *successful* step in dispatch
/// order (or, with `preserve_order`, re-sorted by original plan index).
/// A failing step under `allow_partial_results` is recorded and simply
/// omitted from the returned task list; without it, the first error aborts.
pub async fn run(
    plan: &QueryPlan,
    shards: &dyn ShardStubProvider,
    opts: &OrchestratorOptions,
    stats: &mut QueryStats,
    deadline: &Deadline,
) -> Result<Vec<TaskResult>, BrokerError> {
    deadline.check()?;
    let remaining = deadline.remaining()?;
    let width = opts.max_concurrency.max(1);

    let dispatched = stream::iter(plan.steps.iter().enumerate())
        .map(|(index, step)| async move {
            let (result, latency, _used_replica) = dispatch_with_failover(step, None, shards, opts).await;
            (index, step.shard().clone(), result, latency)
        })
        .buffer_unordered(width)
        .collect::<Vec<_>>();

    let gathered = tokio::time::timeout(remaining, dispatched)
        .await
        .map_err(|_| BrokerError::timeout("Query execution timed out"))?;

    let mut tasks = Vec::with_capacity(gathered.len());
    for (index, shard, result, latency) in gathered {
        stats.shard_queries += 1;
        if opts.track_shard_health {
            stats.record_shard_latency(shard.clone(), latency);
        }
        match result {
            Ok(entities) => {
                stats.entities_scanned += entities.len() as u64;
                tasks.push(TaskResult { index, entities });
            }
            Err(err) => {
                if opts.allow_partial_results {
                    stats.record_failure(
                        shard,
                        err.error_code.clone().unwrap_or_else(|| format!("{:?}", err.kind)),
                        err.message.clone(),
                    );
                } else {
                    return Err(err);
                }
            }
        }
    }

    if opts.preserve_order {
        tasks.sort_by_key(|t| t.index);
    }

    Ok(tasks)
}

/// The `early_termination` variant: steps dispatch one at a time, in plan
/// order, and execution stops as soon as the running entity count reaches
/// `limit`. The gathered entities are unioned (first-seen by `$id`) at the
/// end rather than run through the general merge-strategy switch.
pub async fn run_early_termination(
    plan: &QueryPlan,
    shards: &dyn ShardStubProvider,
    opts: &OrchestratorOptions,
    stats: &mut QueryStats,
    deadline: &Deadline,
) -> Result<Vec<Entity>, BrokerError> {
    let mut collected = Vec::new();

    for step in &plan.steps {
        deadline.check()?;
        let (result, latency, _used_replica) = dispatch_with_failover(step, None, shards, opts).await;
        stats.shard_queries += 1;
        if opts.track_shard_health {
            stats.record_shard_latency(step.shard().clone(), latency);
        }
        match result {
            Ok(entities) => {
                stats.entities_scanned += entities.len() as u64;
                collected.extend(entities);
            }
            Err(err) => {
                if opts.allow_partial_results {
                    stats.record_failure(
                        step.shard().clone(),
                        err.error_code.clone().unwrap_or_else(|| format!("{:?}", err.kind)),
                        err.message.clone(),
                    );
                } else {
                    return Err(err);
                }
            }
        }

        if collected.len() >= opts.limit {
            break;
        }
    }

    Ok(dedupe::deduplicate(collected, None, false))
}
