//! A [`ShardStubProvider`] backed by a static map of shard origins, for the
//! `broker-serve` binary (§6.1). Production routing (which shard a
//! namespace hashes to) lives in `broker_router`; this only resolves an
//! already-known shard ID to the HTTP stub that talks to it.

use broker_executor::{HttpShardStub, ShardStub};
use broker_orchestrator::ShardStubProvider;
use broker_types::ShardId;
use std::collections::HashMap;
use std::sync::Arc;

/// Resolves each configured shard ID to a long-lived [`HttpShardStub`].
/// Shards not present in the map fall back to a stub built from
/// `default_origin`, if one was configured, so a single-shard deployment
/// doesn't need to enumerate every bucket up front.
pub struct ShardEndpoints {
    stubs: HashMap<ShardId, Arc<dyn ShardStub>>,
    default_origin: Option<String>,
}

impl ShardEndpoints {
    pub fn new(origins: HashMap<ShardId, String>) -> Self {
        Self {
            stubs: origins
                .into_iter()
                .map(|(shard, origin)| (shard, Arc::new(HttpShardStub::new(origin)) as Arc<dyn ShardStub>))
                .collect(),
            default_origin: None,
        }
    }

    pub fn with_default_origin(mut self, origin: impl Into<String>) -> Self {
        self.default_origin = Some(origin.into());
        self
    }
}

impl ShardStubProvider for ShardEndpoints {
    fn stub_for(&self, shard: &ShardId) -> Arc<dyn ShardStub> {
        if let Some(stub) = self.stubs.get(shard) {
            return stub.clone();
        }
        let origin = self
            .default_origin
            .as_deref()
            .unwrap_or_else(|| panic!("no shard endpoint configured for {shard} and no default origin set"));
        Arc::new(HttpShardStub::new(origin))
    }
}
