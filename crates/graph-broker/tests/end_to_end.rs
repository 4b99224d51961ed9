//! End-to-end scenarios (§8) against an in-process fake shard, exercising
//! the facade the way a real caller would: plan, batch, orchestrate, and
//! the edge cache, without ever touching the network.

use async_trait::async_trait;
use broker_cache::{BrokerEdgeCache, CacheConfig, CacheRequest, InMemorySubstrate};
use broker_executor::{RawShardResponse, ShardRequest, ShardStub, TransportError};
use broker_types::{entity_id, Namespace, ShardId};
use graph_broker::{batch_lookups, orchestrate_query, plan_query, reset_circuit_breakers, OrchestratorOptions};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

struct FixedStub {
    responses: HashMap<String, serde_json::Value>,
    delay: Duration,
}

#[async_trait]
impl ShardStub for FixedStub {
    async fn dispatch(&self, request: &ShardRequest) -> Result<RawShardResponse, TransportError> {
        tokio::time::sleep(self.delay).await;
        let body = self
            .responses
            .get(&request.path_and_query)
            .cloned()
            .unwrap_or_else(|| serde_json::json!({"success": true, "data": []}));
        Ok(RawShardResponse { status: 200, body })
    }
}

fn provider(stubs: HashMap<ShardId, Arc<dyn ShardStub>>) -> impl Fn(&ShardId) -> Arc<dyn ShardStub> {
    move |shard: &ShardId| -> Arc<dyn ShardStub> {
        stubs.get(shard).cloned().unwrap_or_else(|| {
            Arc::new(FixedStub {
                responses: HashMap::new(),
                delay: Duration::ZERO,
            })
        })
    }
}

#[test]
fn namespace_and_shard_routing_are_deterministic_and_grouped() {
    use broker_router::{namespace_of, shard_of};

    let a = "https://crm.example.com/people/1";
    let b = "https://crm.example.com/people/2";
    let c = "https://billing.example.com/invoices/9";

    let ns_a = namespace_of(a).unwrap();
    let ns_b = namespace_of(b).unwrap();
    let ns_c = namespace_of(c).unwrap();

    assert_eq!(ns_a, ns_b, "same host+first path segment must share a namespace");
    assert_ne!(ns_a, ns_c);
    assert_eq!(shard_of(&ns_a), shard_of(&namespace_of(b).unwrap()));
}

#[test]
fn batch_lookups_is_idempotent_up_to_ordering() {
    let plan = plan_query(
        r#"MATCH (a) WHERE a.$id IN ["https://crm.example.com/people/1", "https://crm.example.com/people/1"] RETURN a"#,
    )
    .unwrap();
    let once = batch_lookups(plan.steps.clone());
    let twice = batch_lookups(batch_lookups(plan.steps));
    assert_eq!(once, twice);
}

#[tokio::test]
async fn parallel_fan_out_across_three_shards_preserves_step_order() {
    reset_circuit_breakers();
    let mut stubs: HashMap<ShardId, Arc<dyn ShardStub>> = HashMap::new();
    let mut steps = Vec::new();
    for (shard, id, delay_ms) in [("s0", "https://a.example.com/x/1", 40), ("s1", "https://b.example.com/x/2", 5), ("s2", "https://c.example.com/x/3", 20)] {
        let step = broker_types::Step::Lookup {
            shard: ShardId::new(shard),
            entity_ids: vec![id.to_string()],
        };
        let mut responses = HashMap::new();
        responses.insert(
            broker_executor::build_request_path(&step, None),
            serde_json::json!({"success": true, "data": [{"$id": id, "$type": "T", "$context": {}}]}),
        );
        stubs.insert(
            ShardId::new(shard),
            Arc::new(FixedStub {
                responses,
                delay: Duration::from_millis(delay_ms),
            }),
        );
        steps.push(step);
    }

    let plan = broker_types::QueryPlan {
        steps,
        estimated_cost: 3.0,
        can_batch: false,
    };
    let options = OrchestratorOptions {
        parallel: true,
        preserve_order: true,
        max_concurrency: 5,
        ..Default::default()
    };

    let result = orchestrate_query(plan, &provider(stubs), options).await.unwrap();
    let ids: Vec<_> = result.entities.iter().map(|e| entity_id(e).unwrap()).collect();
    assert_eq!(
        ids,
        vec!["https://a.example.com/x/1", "https://b.example.com/x/2", "https://c.example.com/x/3"]
    );
}

#[tokio::test]
async fn quorum_consistency_keeps_the_majority_value() {
    reset_circuit_breakers();
    let mut stubs: HashMap<ShardId, Arc<dyn ShardStub>> = HashMap::new();
    for (shard, value) in [("s0", "A"), ("s1", "A"), ("s2", "B")] {
        let mut responses = HashMap::new();
        responses.insert(
            "/lookup?ids=e".to_string(),
            serde_json::json!({"success": true, "data": [{"$id": "e", "$type": "T", "$context": {}, "value": value}]}),
        );
        stubs.insert(
            ShardId::new(shard),
            Arc::new(FixedStub {
                responses,
                delay: Duration::ZERO,
            }),
        );
    }

    let plan = broker_types::QueryPlan {
        steps: vec![
            broker_types::Step::Lookup { shard: ShardId::new("s0"), entity_ids: vec!["e".into()] },
            broker_types::Step::Lookup { shard: ShardId::new("s1"), entity_ids: vec!["e".into()] },
            broker_types::Step::Lookup { shard: ShardId::new("s2"), entity_ids: vec!["e".into()] },
        ],
        estimated_cost: 3.0,
        can_batch: false,
    };
    let options = OrchestratorOptions {
        consistency: broker_orchestrator::Consistency::Quorum,
        quorum_size: 2,
        ..Default::default()
    };

    let result = orchestrate_query(plan, &provider(stubs), options).await.unwrap();
    assert_eq!(result.entities.len(), 1);
    assert_eq!(result.entities[0]["value"], "A");
}

struct FlakyThenHealthyStub {
    calls: AtomicU32,
    fail_until: u32,
}

#[async_trait]
impl ShardStub for FlakyThenHealthyStub {
    async fn dispatch(&self, _request: &ShardRequest) -> Result<RawShardResponse, TransportError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n <= self.fail_until {
            return Err(TransportError("connection reset".to_string()));
        }
        Ok(RawShardResponse {
            status: 200,
            body: serde_json::json!({"success": true, "data": []}),
        })
    }
}

#[tokio::test]
async fn circuit_breaker_opens_after_five_consecutive_failures() {
    reset_circuit_breakers();
    let shard = ShardId::new("flaky");
    let stub: Arc<dyn ShardStub> = Arc::new(FlakyThenHealthyStub {
        calls: AtomicU32::new(0),
        fail_until: 100,
    });
    let mut stubs: HashMap<ShardId, Arc<dyn ShardStub>> = HashMap::new();
    stubs.insert(shard.clone(), stub);
    let shards = provider(stubs);

    let executor = broker_executor::ExecutorConfig {
        max_retries: 0,
        ..Default::default()
    };
    let step = broker_types::Step::Lookup {
        shard: shard.clone(),
        entity_ids: vec!["https://x.example.com/missing".to_string()],
    };

    for _ in 0..5 {
        let plan = broker_types::QueryPlan {
            steps: vec![step.clone()],
            estimated_cost: 1.0,
            can_batch: false,
        };
        let options = OrchestratorOptions { executor, ..Default::default() };
        let _ = orchestrate_query(plan, &shards, options).await;
    }

    assert!(broker_circuit_breaker::is_open(&shard));

    let plan = broker_types::QueryPlan {
        steps: vec![step],
        estimated_cost: 1.0,
        can_batch: false,
    };
    let err = orchestrate_query(plan, &shards, OrchestratorOptions::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind, broker_types::ErrorKind::CircuitOpen);
}

#[tokio::test]
async fn stale_while_revalidate_serves_stale_then_refreshes_in_background() {
    let cache = BrokerEdgeCache::new(
        Arc::new(InMemorySubstrate::new()),
        CacheConfig {
            default_ttl_secs: 0,
            stale_window_secs: 5,
            ..Default::default()
        },
    );
    // A traversal query classifies as `Dynamic` (§4.12), so `default_ttl_secs`
    // (here 0) governs its TTL rather than the longer static-query default.
    let request = CacheRequest::new(
        Namespace::new("https://crm.example.com/people/"),
        "MATCH (a)-[:KNOWS]->(b) RETURN b".to_string(),
    );

    let fetch_count = Arc::new(AtomicU32::new(0));
    let first_count = fetch_count.clone();
    cache
        .get_or_revalidate(&request, move || {
            first_count.fetch_add(1, Ordering::SeqCst);
            async move { Ok(serde_json::json!({"v": 1})) }
        })
        .await
        .unwrap();

    // TTL is 0, so once a full second has elapsed the entry is stale; a
    // second read must serve the stale value synchronously and fire a
    // background refresh.
    tokio::time::sleep(Duration::from_millis(1100)).await;
    let refreshed_body: Arc<Mutex<Option<serde_json::Value>>> = Arc::new(Mutex::new(None));
    let second_count = fetch_count.clone();
    let refreshed_body_clone = refreshed_body.clone();
    let stale = cache
        .get_or_revalidate(&request, move || {
            second_count.fetch_add(1, Ordering::SeqCst);
            let refreshed_body = refreshed_body_clone.clone();
            async move {
                let body = serde_json::json!({"v": 2});
                *refreshed_body.lock().unwrap() = Some(body.clone());
                Ok(body)
            }
        })
        .await
        .unwrap();

    assert!(stale.is_stale);
    assert_eq!(stale.data, serde_json::json!({"v": 1}));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fetch_count.load(Ordering::SeqCst), 2);
    assert_eq!(*refreshed_body.lock().unwrap(), Some(serde_json::json!({"v": 2})));
}
