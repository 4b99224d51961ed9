//! Aggregation (§4.11): a single scalar computed over a numeric field
//! across the result entities.

use crate::options::{AggregationConfig, AggregationKind};
use broker_types::Entity;
use serde_json::Value;

/// Computes `config`'s scalar over the numeric values of `config.field`
/// across `entities`. Non-numeric or missing values are skipped; an empty
/// collection (after skipping) aggregates to `0.0`.
pub fn aggregate(entities: &[Entity], config: &AggregationConfig) -> f64 {
    let values: Vec<f64> = entities
        .iter()
        .filter_map(|e| e.get(&config.field).and_then(Value::as_f64))
        .collect();

    if values.is_empty() {
        return 0.0;
    }

    match config.kind {
        AggregationKind::Sum => values.iter().sum(),
        AggregationKind::Avg => values.iter().sum::<f64>() / values.len() as f64,
        AggregationKind::Min => values.iter().cloned().fold(f64::INFINITY, f64::min),
        AggregationKind::Max => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
        AggregationKind::Count => values.len() as f64,
    }
}
