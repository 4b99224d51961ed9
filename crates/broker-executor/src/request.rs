//! Builds the path-and-query for a single step's dispatch (§4.4). `traverse`
//! and `expand` steps don't carry a source entity id in [`Step`] itself —
//! the orchestrator supplies it per-call via `from`.

use broker_types::{FilterValue, Step};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

const FRAGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'{')
    .add(b'}')
    .add(b'&')
    .add(b'=')
    .add(b'%')
    .add(b'+')
    .add(b',');

fn enc(s: &str) -> String {
    utf8_percent_encode(s, FRAGMENT).to_string()
}

/// Builds the path-and-query string the executor hands its [`crate::ShardStub`].
///
/// `from` is the source entity id for `traverse`/`expand` steps, supplied by
/// the orchestrator as it walks a frontier; it's ignored for `lookup` and
/// `filter`.
pub fn build_request_path(step: &Step, from: Option<&str>) -> String {
    match step {
        Step::Lookup { entity_ids, .. } => {
            let ids = entity_ids
                .iter()
                .map(|id| enc(id))
                .collect::<Vec<_>>()
                .join(",");
            format!("/lookup?ids={ids}")
        }
        Step::Traverse { predicate, .. } => {
            let from = from.unwrap_or_default();
            format!("/traverse?from={}&predicate={}", enc(from), enc(predicate))
        }
        Step::Expand {
            predicate, depth, ..
        } => {
            let from = from.unwrap_or_default();
            format!(
                "/traverse?from={}&predicate={}&depth={}",
                enc(from),
                enc(predicate),
                depth
            )
        }
        Step::Filter {
            field, op, value, ..
        } => {
            let value_str = match value {
                FilterValue::Number(n) => n.to_string(),
                FilterValue::String(s) => enc(s),
            };
            format!("/filter?field={}&op={}&value={}", enc(field), op.as_str(), value_str)
        }
    }
}
