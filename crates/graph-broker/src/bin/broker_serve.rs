//! `broker-serve`: a thin harness that wires the broker library crates
//! together for manual and integration-test exercise (§6.1). It is not the
//! hibernation transport (out of scope) and isn't meant to run in
//! production — just enough process to plan and run one query against a
//! configured set of shard endpoints.

use anyhow::Context;
use broker_cache::{BrokerEdgeCache, CacheConfig, CacheError, CacheRequest, InMemorySubstrate};
use broker_types::{Namespace, ShardId};
use clap::Parser;
use flow_cli_common::LogArgs;
use graph_broker::{OrchestratorOptions, ShardEndpoints};
use std::collections::HashMap;
use std::sync::Arc;

/// Plans and runs a single graph query against a set of shard endpoints.
#[derive(Debug, Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    #[clap(flatten)]
    log: LogArgs,

    /// A shard endpoint, `<shard-id>=<origin>`. May be given multiple times.
    #[clap(long = "shard")]
    shards: Vec<String>,

    /// Origin used for any shard not named by a `--shard` flag.
    #[clap(long = "default-shard-origin", env = "DEFAULT_SHARD_ORIGIN")]
    default_shard_origin: Option<String>,

    /// Default page size, used when the query options don't set one.
    #[clap(long = "page-size", default_value_t = 100)]
    page_size: usize,

    /// Upper bound on total query time, in milliseconds.
    #[clap(long = "total-timeout-ms")]
    total_timeout_ms: Option<u64>,

    /// Ceiling applied to every cache entry's TTL, in seconds.
    #[clap(long = "cache-ttl-ceiling-secs", default_value_t = 3600)]
    cache_ttl_ceiling_secs: u64,

    /// Run the query in parallel across shards when the plan allows it.
    #[clap(long = "parallel")]
    parallel: bool,

    /// The query string to plan and run.
    query: String,
}

fn parse_shard_endpoints(raw: &[String]) -> anyhow::Result<HashMap<ShardId, String>> {
    let mut endpoints = HashMap::new();
    for entry in raw {
        let (shard, origin) = entry
            .split_once('=')
            .with_context(|| format!("--shard value '{entry}' must be of the form <shard-id>=<origin>"))?;
        endpoints.insert(ShardId::new(shard), origin.to_string());
    }
    Ok(endpoints)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    flow_cli_common::init_logging(&args.log);
    tracing::info!(?args.shards, page_size = args.page_size, "starting broker-serve");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(args))
}

async fn run(args: Args) -> anyhow::Result<()> {
    let endpoints = parse_shard_endpoints(&args.shards)?;
    let mut shards = ShardEndpoints::new(endpoints);
    if let Some(origin) = args.default_shard_origin.clone() {
        shards = shards.with_default_origin(origin);
    }
    let shards = Arc::new(shards);

    let cache = BrokerEdgeCache::new(
        Arc::new(InMemorySubstrate::new()),
        CacheConfig {
            max_ttl_secs: args.cache_ttl_ceiling_secs,
            ..Default::default()
        },
    );

    // `broker-serve` has no multi-tenant routing of its own, so every query
    // it runs shares one cache namespace; a real deployment would derive
    // this per-request the way `broker_router::namespace_of` does.
    let request = CacheRequest::new(Namespace::new("broker-serve"), args.query.clone());

    let options = OrchestratorOptions {
        limit: args.page_size,
        parallel: args.parallel,
        total_timeout_ms: args.total_timeout_ms,
        ..Default::default()
    };

    let cached = cache
        .get_or_revalidate(&request, move || run_query(args.query, shards, options))
        .await
        .map_err(|err| anyhow::anyhow!("{err}"))?;

    println!("{}", serde_json::to_string_pretty(&cached.data)?);
    Ok(())
}

async fn run_query(
    query: String,
    shards: Arc<ShardEndpoints>,
    options: OrchestratorOptions,
) -> Result<serde_json::Value, CacheError> {
    let plan = graph_broker::plan_query(&query)
        .map_err(|err| CacheError::Substrate(format!("planning query: {err}")))?;
    let steps = graph_broker::batch_lookups(plan.steps);

    let result = graph_broker::orchestrate_query(
        broker_types::QueryPlan {
            steps,
            estimated_cost: plan.estimated_cost,
            can_batch: plan.can_batch,
        },
        shards.as_ref(),
        options,
    )
    .await
    .map_err(|err| CacheError::Substrate(err.to_string()))?;

    serde_json::to_value(result).map_err(|err| CacheError::Substrate(err.to_string()))
}
