//! Cross-shard orchestrator (§4.7–§4.11): the heart of the broker core.
//! Dispatches a [`broker_types::QueryPlan`] either sequentially or in
//! parallel across shards, applies merge/dedup/quorum/aggregation, and
//! paginates the result.
//!
//! Mirrors the shape of `gazette::journal::Client::read` composed with a
//! routed, retrying RPC layer: the orchestrator itself holds no network
//! state, delegating every shard call to [`dispatch::ShardStubProvider`] and
//! [`broker_executor`], and every admission decision to
//! [`broker_circuit_breaker`].

mod aggregate;
mod dedupe;
mod deadline;
mod dispatch;
mod merge;
mod options;
mod paginate;
mod parallel;
mod quorum;
mod sequential;

pub use deadline::Deadline;
pub use dispatch::ShardStubProvider;
pub use options::{
    AggregationConfig, AggregationKind, Consistency, MergeStrategy, OrchestratorOptions,
    OrderDirection, READ_YOUR_WRITES_DELAY,
};

use broker_types::{BrokerError, QueryPlan, QueryResult, QueryStats};
use options::wants_parallel_path;
use std::time::Instant;

/// Executes `plan` against the shards resolved by `shards`, per `options`
/// (§6). This is the orchestrator's single public entry point; everything
/// else in this crate is plumbing for it.
#[tracing::instrument(skip_all, fields(steps = plan.steps.len()))]
pub async fn orchestrate_query(
    plan: QueryPlan,
    shards: &dyn ShardStubProvider,
    options: OrchestratorOptions,
) -> Result<QueryResult, BrokerError> {
    let started = Instant::now();
    let mut stats = QueryStats::default();
    let deadline = Deadline::new(options.total_timeout_ms.map(std::time::Duration::from_millis));

    if matches!(options.consistency, Consistency::ReadYourWrites) && options.await_pending_write {
        tokio::time::sleep(READ_YOUR_WRITES_DELAY).await;
    }

    let entities = if plan.steps.is_empty() {
        Vec::new()
    } else if wants_parallel_path(&plan, &options) {
        if options.early_termination {
            parallel::run_early_termination(&plan, shards, &options, &mut stats, &deadline).await?
        } else {
            let tasks = parallel::run(&plan, shards, &options, &mut stats, &deadline).await?;
            let task_results: Vec<Vec<_>> = tasks.into_iter().map(|t| t.entities).collect();

            // Aggregation runs on the flat union of every task's contribution,
            // before merging/deduplication — duplicate entities across shards
            // each count (§4.7, §9: deliberate, not an oversight).
            if let Some(agg) = &options.aggregation {
                let flat: Vec<_> = task_results.iter().flatten().cloned().collect();
                stats.aggregated_value = Some(aggregate::aggregate(&flat, agg));
            }

            merge::merge(task_results, &options)?
        }
    } else {
        let frontier = sequential::run(&plan, shards, &options, &mut stats, &deadline).await?;
        if let Some(agg) = &options.aggregation {
            stats.aggregated_value = Some(aggregate::aggregate(&frontier, agg));
        }
        frontier
    };

    stats.duration = started.elapsed();
    let (page, cursor, has_more) = paginate::paginate(entities, options.cursor.as_deref(), options.limit);

    Ok(QueryResult {
        entities: page,
        cursor,
        has_more,
        stats,
    })
}
