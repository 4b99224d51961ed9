//! The plan builder (§4.5): parses a restricted Cypher-like query string
//! into an ordered [`Step`] list with a monotonic cost estimate.

use broker_router::{namespace_of, shard_of};
use broker_types::{BrokerError, FilterValue, QueryPlan, ShardId, Step};
use once_cell::sync::Lazy;
use regex::Regex;

static SINGLE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"\$id\s*[:=]\s*"([^"]+)""#).unwrap());

static BATCH_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)\$id\s+IN\s*\[\s*((?:"[^"]*"\s*,?\s*)+)\]"#).unwrap());

static BATCH_ID_PRESENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bIN\s*\[").unwrap());

static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#""([^"]*)""#).unwrap());

static PLAIN_HOP: Lazy<Regex> = Lazy::new(|| Regex::new(r"-\[:(\w+)\]->").unwrap());

static BOUNDED_HOP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-\[:(\w+)\*(\d+)\.\.(\d+)\]->").unwrap());

static WHERE_CLAUSE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)WHERE\s+\w+\.(\w+)\s*(>=|<=|!=|>|<|=)\s*("[^"]*"|[^\s)]+)"#).unwrap()
});

static HAS_MATCH: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bMATCH\b").unwrap());
static HAS_RETURN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\bRETURN\b").unwrap());

/// Parses `query` into a [`QueryPlan`], per the extraction rules in §4.5.
pub fn plan_query(query: &str) -> Result<QueryPlan, BrokerError> {
    if query.trim().is_empty() {
        return Err(BrokerError::validation("query is empty"));
    }

    let mut missing = Vec::new();
    if !HAS_MATCH.is_match(query) {
        missing.push("MATCH");
    }
    if !HAS_RETURN.is_match(query) {
        missing.push("RETURN");
    }
    if !missing.is_empty() {
        return Err(BrokerError::validation(format!(
            "query is missing required clause(s): {}",
            missing.join(", ")
        )));
    }

    let mut steps: Vec<Step> = Vec::new();
    let mut cost = 0.0;
    let mut can_batch = BATCH_ID_PRESENCE.is_match(query);

    // Rule 1: single-ID match.
    if let Some(caps) = SINGLE_ID.captures(query) {
        let id = caps.get(1).unwrap().as_str();
        let shard = shard_of(&namespace_of(id)?);
        steps.push(Step::Lookup {
            shard,
            entity_ids: vec![id.to_string()],
        });
        cost += 1.0;
    }

    // Rule 2: batch match.
    if let Some(caps) = BATCH_ID.captures(query) {
        let list = caps.get(1).unwrap().as_str();
        let ids: Vec<String> = QUOTED
            .captures_iter(list)
            .map(|c| c.get(1).unwrap().as_str().to_string())
            .collect();
        can_batch = true;
        if !ids.is_empty() {
            let mut shard_order: Vec<ShardId> = Vec::new();
            let mut by_shard: std::collections::HashMap<ShardId, Vec<String>> =
                std::collections::HashMap::new();
            for id in &ids {
                let shard = shard_of(&namespace_of(id)?);
                by_shard
                    .entry(shard.clone())
                    .or_insert_with(|| {
                        shard_order.push(shard.clone());
                        Vec::new()
                    })
                    .push(id.clone());
            }
            for shard in shard_order {
                let entity_ids = by_shard.remove(&shard).unwrap_or_default();
                steps.push(Step::Lookup { shard, entity_ids });
            }
            cost += 0.5 * ids.len() as f64;
        }
    }

    // Rule 3 / Rule 5: single and second hop.
    let hops: Vec<_> = PLAIN_HOP.captures_iter(query).collect();
    if let Some(first) = hops.first() {
        let predicate = first.get(1).unwrap().as_str().to_string();
        let shard = previous_shard(&steps);
        steps.push(Step::Traverse { shard, predicate });
        cost += 2.0;
    }
    if hops.len() >= 2 {
        let predicate = hops[1].get(1).unwrap().as_str().to_string();
        let shard = previous_shard(&steps);
        steps.push(Step::Expand {
            shard,
            predicate,
            depth: 1,
        });
        cost += 3.0;
    }

    // Rule 4: bounded expansion, replacing a same-predicate traverse if one
    // was emitted by rule 3.
    if let Some(caps) = BOUNDED_HOP.captures(query) {
        let predicate = caps.get(1).unwrap().as_str().to_string();
        let max: u32 = caps.get(3).unwrap().as_str().parse().unwrap_or(1);

        let replace_at = steps.iter().position(
            |s| matches!(s, Step::Traverse { predicate: p, .. } if p == &predicate),
        );

        let shard = match replace_at {
            Some(idx) => steps[idx].shard().clone(),
            None => previous_shard(&steps),
        };
        let expand = Step::Expand {
            shard,
            predicate,
            depth: max,
        };
        match replace_at {
            Some(idx) => steps[idx] = expand,
            None => steps.push(expand),
        }
        cost += 3.0 * max as f64;
    }

    // Rule 6: filter.
    if let Some(caps) = WHERE_CLAUSE.captures(query) {
        let field = caps.get(1).unwrap().as_str().to_string();
        let op_token = caps.get(2).unwrap().as_str();
        let op = broker_types::FilterOp::parse(op_token)
            .ok_or_else(|| BrokerError::validation(format!("unrecognized filter operator '{op_token}'")))?;
        let value = FilterValue::parse_literal(caps.get(3).unwrap().as_str());
        let shard = previous_shard(&steps);
        steps.push(Step::Filter {
            shard,
            field,
            op,
            value,
        });
        cost += 1.0;
    }

    // Rule 7: fallback.
    if steps.is_empty() {
        steps.push(Step::Lookup {
            shard: ShardId::default_shard(),
            entity_ids: Vec::new(),
        });
        cost = 1.0;
    }

    Ok(QueryPlan {
        steps,
        estimated_cost: cost,
        can_batch,
    })
}

fn previous_shard(steps: &[Step]) -> ShardId {
    steps
        .last()
        .map(|s| s.shard().clone())
        .unwrap_or_else(ShardId::default_shard)
}
