//! Response validator (§4.2): validates the discriminated-union shape of a
//! shard reply, with an optional schema/sanitize/coerce layer on top for
//! callers that want field-level guarantees.

mod cross_field;
mod envelope;
mod sanitize;
mod schema;

pub use cross_field::{validate_cross_field, CrossFieldRule};
pub use envelope::{validate_response, ResponseError, ValidatedResponse};
pub use sanitize::{sanitize, REDACTED};
pub use schema::{
    validate_schema, FieldError, PredicateOutcome, Predicate, SchemaRule, SchemaType,
    SchemaValidationResult, ValidationOptions,
};
