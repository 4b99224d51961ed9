//! The sequential execution path (§4.7): steps run one at a time in plan
//! order, traverse/expand fanning out serially over the current frontier.

use crate::dispatch::{dispatch_with_failover, ShardStubProvider};
use crate::{dedupe, Deadline, OrchestratorOptions};
use broker_types::{entity_id, BrokerError, Entity, QueryPlan, QueryStats, Step};

pub async fn run(
    plan: &QueryPlan,
    shards: &dyn ShardStubProvider,
    opts: &OrchestratorOptions,
    stats: &mut QueryStats,
    deadline: &Deadline,
) -> Result<Vec<Entity>, BrokerError> {
    let mut frontier: Vec<Entity> = Vec::new();

    for step in &plan.steps {
        deadline.check()?;

        if broker_circuit_breaker::is_open(step.shard()) {
            let err = BrokerError::circuit_open(step.shard().clone()).with_step_kind(step.kind_name());
            if opts.allow_partial_results {
                stats.record_failure(step.shard().clone(), "CIRCUIT_OPEN".to_string(), err.message.clone());
                continue;
            }
            return Err(err);
        }

        match step {
            Step::Traverse { .. } | Step::Expand { .. } => {
                if frontier.is_empty() {
                    // No source entities to traverse from: skip, no shard call (§3).
                    continue;
                }
                frontier = run_frontier_fanout(step, &frontier, shards, opts, stats, deadline).await?;
            }
            _ => {
                deadline.check()?;
                let (result, latency, _used_replica) =
                    dispatch_with_failover(step, None, shards, opts).await;
                stats.shard_queries += 1;
                if opts.track_shard_health {
                    stats.record_shard_latency(step.shard().clone(), latency);
                }
                match result {
                    Ok(entities) => {
                        stats.entities_scanned += entities.len() as u64;
                        frontier.extend(entities);
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
            }
        }
    }

    let frontier = if opts.deduplicate {
        dedupe::deduplicate(frontier, opts.deduplicate_by.as_deref(), opts.prefer_newer)
    } else {
        frontier
    };

    Ok(frontier)
}

/// Iterates the current frontier one source at a time (serial, not
/// parallelized within a step, §5), dispatching a derived per-source call.
/// For `expand`, this runs over `depth` BFS levels, each level's output
/// becoming the next level's frontier; `depth = 0` is a no-op pass-through.
async fn run_frontier_fanout(
    step: &Step,
    frontier: &[Entity],
    shards: &dyn ShardStubProvider,
    opts: &OrchestratorOptions,
    stats: &mut QueryStats,
    deadline: &Deadline,
) -> Result<Vec<Entity>, BrokerError> {
    let levels = match step {
        Step::Expand { depth, .. } => *depth,
        _ => 1,
    };

    let mut current: Vec<Entity> = frontier.to_vec();
    let mut next = current.clone();

    for _ in 0..levels {
        next = Vec::new();
        for source in &current {
            deadline.check()?;
            let Some(source_id) = entity_id(source) else {
                continue;
            };
            let (result, latency, _used_replica) =
                dispatch_with_failover(step, Some(source_id), shards, opts).await;
            stats.shard_queries += 1;
            if opts.track_shard_health {
                stats.record_shard_latency(step.shard().clone(), latency);
            }
            match result {
                Ok(entities) => {
                    stats.entities_scanned += entities.len() as u64;
                    next.extend(entities);
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
        }
        current = next.clone();
    }

    Ok(next)
}
