//! Configuration options recognized by [`crate::orchestrate_query`] (§6).

use broker_executor::ExecutorConfig;
use broker_types::ShardId;
use std::collections::HashMap;

/// How task outputs from the parallel cross-shard path are combined (§4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    Union,
    Intersection,
    Ordered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

/// Read consistency requested for this call (§6). `Quorum` forces the
/// parallel cross-shard path regardless of the `parallel` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    Eventual,
    ReadYourWrites,
    Quorum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationKind {
    Sum,
    Avg,
    Min,
    Max,
    Count,
}

#[derive(Debug, Clone)]
pub struct AggregationConfig {
    pub kind: AggregationKind,
    pub field: String,
}

/// `read-your-writes` waits a fixed, short delay before dispatching the
/// plan — a minimal at-least-once ordering hint, not a true wait on a
/// specific write (§4.7, §9 open question: this looks like a placeholder).
pub const READ_YOUR_WRITES_DELAY: std::time::Duration = std::time::Duration::from_millis(60);

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub cursor: Option<String>,
    pub limit: usize,
    pub parallel: bool,
    pub max_concurrency: usize,
    pub preserve_order: bool,
    pub merge_strategy: Option<MergeStrategy>,
    pub order_by: Option<String>,
    pub order_direction: OrderDirection,
    pub deduplicate: bool,
    pub deduplicate_by: Option<String>,
    pub prefer_newer: bool,
    pub consistency: Consistency,
    pub await_pending_write: bool,
    pub quorum_size: usize,
    pub broadcast: bool,
    pub aggregation: Option<AggregationConfig>,
    pub early_termination: bool,
    pub track_shard_health: bool,
    pub use_replica_on_failure: bool,
    pub replica_shards: HashMap<ShardId, ShardId>,
    pub allow_partial_results: bool,
    pub total_timeout_ms: Option<u64>,
    pub executor: ExecutorConfig,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            cursor: None,
            limit: 100,
            parallel: false,
            max_concurrency: 10,
            preserve_order: false,
            merge_strategy: None,
            order_by: None,
            order_direction: OrderDirection::Asc,
            deduplicate: false,
            deduplicate_by: None,
            prefer_newer: true,
            consistency: Consistency::Eventual,
            await_pending_write: false,
            quorum_size: 2,
            broadcast: false,
            aggregation: None,
            early_termination: false,
            track_shard_health: false,
            use_replica_on_failure: false,
            replica_shards: HashMap::new(),
            allow_partial_results: false,
            total_timeout_ms: None,
            executor: ExecutorConfig::default(),
        }
    }
}

/// Mode selection (§4.7): the parallel cross-shard path requires a plan
/// that's entirely `lookup` steps, with at least one parallel-shaped option
/// set; everything else takes the sequential path.
pub(crate) fn wants_parallel_path(
    plan: &broker_types::QueryPlan,
    opts: &OrchestratorOptions,
) -> bool {
    plan.is_all_lookup()
        && (opts.parallel
            || opts.broadcast
            || opts.merge_strategy.is_some()
            || matches!(opts.consistency, Consistency::Quorum)
            || opts.aggregation.is_some()
            || opts.early_termination
            || opts.deduplicate)
}
