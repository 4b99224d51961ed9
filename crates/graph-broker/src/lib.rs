//! Client facade over the broker core (§6): composes [`broker_planner`],
//! [`broker_orchestrator`], [`broker_circuit_breaker`] and [`broker_cache`]
//! behind the handful of entry points a caller needs — planning a query,
//! running it, batching lookups, and the edge cache. Mirrors the role
//! `flow_client::Client` plays over `gazette`'s lower-level crates: the
//! facade owns no protocol logic of its own, only wiring.

mod shards;

pub use broker_cache::{BrokerEdgeCache, CacheConfig, CacheError};
pub use broker_orchestrator::{OrchestratorOptions, ShardStubProvider};
pub use broker_types::{BrokerError, QueryPlan, QueryResult};
pub use shards::ShardEndpoints;

use broker_types::Step;

/// Parses `query` into a [`QueryPlan`] (§4.5). Pure, no I/O.
pub fn plan_query(query: &str) -> Result<QueryPlan, BrokerError> {
    broker_planner::plan_query(query)
}

/// Collapses same-shard `lookup` steps in `steps` into one each (§4.6).
/// Pure, no I/O.
pub fn batch_lookups(steps: Vec<Step>) -> Vec<Step> {
    broker_planner::batch_lookups(steps)
}

/// Executes `plan` against `shards`, per `options` (§4.7–§4.11, §6).
pub async fn orchestrate_query(
    plan: QueryPlan,
    shards: &dyn ShardStubProvider,
    options: OrchestratorOptions,
) -> Result<QueryResult, BrokerError> {
    broker_orchestrator::orchestrate_query(plan, shards, options).await
}

/// Clears all process-global circuit-breaker state. Intended for tests that
/// need a clean slate between scenarios (§6).
pub fn reset_circuit_breakers() {
    broker_circuit_breaker::reset_circuit_breakers();
}

#[cfg(test)]
mod test {
    use super::*;
    use async_trait::async_trait;
    use broker_executor::{RawShardResponse, ShardRequest, ShardStub, TransportError};
    use broker_types::ShardId;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct FixedStub(HashMap<String, serde_json::Value>);

    #[async_trait]
    impl ShardStub for FixedStub {
        async fn dispatch(&self, request: &ShardRequest) -> Result<RawShardResponse, TransportError> {
            let body = self
                .0
                .get(&request.path_and_query)
                .cloned()
                .unwrap_or_else(|| json!({"success": true, "data": []}));
            Ok(RawShardResponse { status: 200, body })
        }
    }

    fn provider(stubs: HashMap<ShardId, Arc<FixedStub>>) -> impl Fn(&ShardId) -> Arc<dyn ShardStub> {
        move |shard: &ShardId| -> Arc<dyn ShardStub> {
            stubs
                .get(shard)
                .cloned()
                .map(|s| s as Arc<dyn ShardStub>)
                .unwrap_or_else(|| Arc::new(FixedStub(HashMap::new())))
        }
    }

    #[tokio::test]
    async fn plan_batch_and_orchestrate_round_trip() {
        reset_circuit_breakers();
        let plan = plan_query(
            r#"MATCH (a) WHERE a.$id = "https://crm.example.com/people/1" RETURN a"#,
        )
        .unwrap();
        let steps = batch_lookups(plan.steps.clone());
        assert_eq!(steps.len(), 1);

        let shard = steps[0].shard().clone();
        let mut responses = HashMap::new();
        responses.insert(
            "/lookup?ids=https%3A%2F%2Fcrm.example.com%2Fpeople%2F1".to_string(),
            json!({"success": true, "data": [{"$id": "https://crm.example.com/people/1", "$type": "Person", "$context": {}}]}),
        );
        let mut stubs = HashMap::new();
        stubs.insert(shard, Arc::new(FixedStub(responses)));

        let result = orchestrate_query(
            QueryPlan {
                steps,
                estimated_cost: plan.estimated_cost,
                can_batch: plan.can_batch,
            },
            &provider(stubs),
            OrchestratorOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(result.entities.len(), 1);
    }
}
