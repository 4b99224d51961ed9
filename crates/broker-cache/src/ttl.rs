//! TTL computation (§4.12): `min(max_ttl, ttl_override ?? shape-based default)`.

use crate::admission::QueryShape;

pub const STATIC_TTL_SECS: u64 = 3600;
pub const DYNAMIC_TTL_SECS: u64 = 300;

/// Computes the effective TTL in seconds for a request, capped at `max_ttl`.
/// An explicit `ttl_override` wins outright (still capped); absent that, a
/// `Static` shape gets the long default, `Dynamic` gets `default_ttl`.
pub fn effective_ttl(ttl_override: Option<u64>, shape: QueryShape, default_ttl: u64, max_ttl: u64) -> u64 {
    let base = ttl_override.unwrap_or(match shape {
        QueryShape::Static => STATIC_TTL_SECS,
        QueryShape::Dynamic => default_ttl,
    });
    base.min(max_ttl)
}
