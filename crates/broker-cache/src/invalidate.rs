//! Cache invalidation plumbing (§4.12): the event types broadcast to
//! `on_invalidation` and received from peers, plus the pure key-derivation
//! rules the facade's invalidation methods use.

/// Broadcast to `on_invalidation` whenever a local invalidation occurs, so a
/// multi-instance deployment can mirror it via [`crate::BrokerEdgeCache::handle_remote_invalidation`].
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidationEvent {
    pub key: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOperation {
    Create,
    Update,
    Delete,
}

/// Describes a write that just happened, so `invalidate_on_mutation` can
/// purge whatever it touched.
#[derive(Debug, Clone)]
pub struct MutationEvent {
    pub entity_id: String,
    pub operation: MutationOperation,
    pub affected_tags: Vec<String>,
    pub cascade_invalidation: bool,
}

impl MutationEvent {
    pub fn new(entity_id: impl Into<String>, operation: MutationOperation) -> Self {
        Self {
            entity_id: entity_id.into(),
            operation,
            affected_tags: Vec::new(),
            cascade_invalidation: false,
        }
    }
}

/// The derived keys `invalidate_on_mutation` additionally deletes when
/// `cascade_invalidation` is set (§4.12): the entity's direct relation
/// listings and a paged collection key built off its direct entity key.
pub fn cascade_keys(entity_id: &str, direct_key: &str) -> Vec<String> {
    vec![
        format!("{entity_id}.friends"),
        format!("{entity_id}.posts"),
        format!("{direct_key}s?limit=10"),
    ]
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cascade_keys_match_the_documented_shape() {
        let keys = cascade_keys("https://example.com/crm/1", "edge/query/abc/def");
        assert_eq!(
            keys,
            vec![
                "https://example.com/crm/1.friends".to_string(),
                "https://example.com/crm/1.posts".to_string(),
                "edge/query/abc/defs?limit=10".to_string(),
            ]
        );
    }
}
