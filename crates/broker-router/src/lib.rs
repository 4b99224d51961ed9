//! Hasher and router (§4.1): maps an entity ID to its namespace, and a
//! namespace to the shard that owns it.
//!
//! The bucket count and hash function here are load-bearing across process
//! boundaries — every broker instance and every reimplementation that wants
//! to stay route-compatible must use the same two constants.

use broker_types::{BrokerError, Namespace, ShardId};
use url::Url;

/// Number of hash buckets shards are distributed over. Fixed, not
/// configurable: changing it would silently re-shard every namespace.
pub const N_BUCKETS: u32 = 16;

/// The namespace and shard an entity ID routes to.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub namespace: Namespace,
    pub shard_id: ShardId,
}

/// Extracts the namespace of an entity ID: the URL's host plus its first
/// path segment (trailing slash retained), with query and fragment dropped.
/// A bare host with no path yields `scheme://host/`.
pub fn namespace_of(entity_id: &str) -> Result<Namespace, BrokerError> {
    let url = Url::parse(entity_id)
        .map_err(|e| BrokerError::validation(format!("invalid entity id '{entity_id}': {e}")))?;

    let host = url
        .host_str()
        .ok_or_else(|| BrokerError::validation(format!("entity id '{entity_id}' has no host")))?;

    let mut first_segment = None;
    if let Some(mut segments) = url.path_segments() {
        first_segment = segments.next().filter(|s| !s.is_empty());
    }

    let authority = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let namespace = match first_segment {
        Some(seg) => format!("{}://{authority}/{seg}/", url.scheme()),
        None => format!("{}://{authority}/", url.scheme()),
    };

    Ok(Namespace::new(namespace))
}

/// 32-bit FNV-1a over the namespace's bytes, modulo [`N_BUCKETS`].
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    const FNV_OFFSET_BASIS: u32 = 0x811c9dc5;
    const FNV_PRIME: u32 = 0x01000193;

    let mut hash = FNV_OFFSET_BASIS;
    for &byte in bytes {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Maps a namespace to its stable shard identifier.
pub fn shard_of(namespace: &Namespace) -> ShardId {
    let hash = fnv1a_32(namespace.as_str().as_bytes());
    let bucket = hash % N_BUCKETS;
    ShardId::new(format!("shard-{bucket}-{hash:06x}"))
}

/// Convenience: extracts the namespace and shard for an entity ID in one
/// call.
pub fn route_entity(entity_id: &str) -> Result<Route, BrokerError> {
    let namespace = namespace_of(entity_id)?;
    let shard_id = shard_of(&namespace);
    Ok(Route {
        namespace,
        shard_id,
    })
}
