//! Optional schema validator layer (§4.2): type checks, bounds, nested
//! properties/items, custom predicates, coercion, and partial mode.

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

impl SchemaType {
    fn matches(&self, value: &Value) -> bool {
        match self {
            SchemaType::String => value.is_string(),
            SchemaType::Number => value.is_number(),
            SchemaType::Boolean => value.is_boolean(),
            SchemaType::Array => value.is_array(),
            SchemaType::Object => value.is_object(),
        }
    }
}

/// Outcome of a custom per-field predicate: either a bare bool, or a
/// detailed `{valid, message}` pair.
#[derive(Debug, Clone)]
pub enum PredicateOutcome {
    Valid(bool),
    Detailed { valid: bool, message: String },
}

impl PredicateOutcome {
    fn is_valid(&self) -> bool {
        match self {
            PredicateOutcome::Valid(v) => *v,
            PredicateOutcome::Detailed { valid, .. } => *valid,
        }
    }

    fn message(&self, field: &str) -> String {
        match self {
            PredicateOutcome::Valid(_) => format!("field '{field}' failed custom validation"),
            PredicateOutcome::Detailed { message, .. } => message.clone(),
        }
    }
}

pub type Predicate = Arc<dyn Fn(&Value) -> PredicateOutcome + Send + Sync>;

#[derive(Clone, Default)]
pub struct SchemaRule {
    pub ty: Option<SchemaType>,
    pub required: bool,
    pub nullable: bool,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub format: Option<&'static str>,
    pub properties: Option<HashMap<String, SchemaRule>>,
    pub items: Option<Box<SchemaRule>>,
    pub predicate: Option<Predicate>,
}

impl std::fmt::Debug for SchemaRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRule")
            .field("ty", &self.ty)
            .field("required", &self.required)
            .field("nullable", &self.nullable)
            .field("minimum", &self.minimum)
            .field("maximum", &self.maximum)
            .field("format", &self.format)
            .field("properties", &self.properties)
            .field("items", &self.items)
            .field("has_predicate", &self.predicate.is_some())
            .finish()
    }
}

impl SchemaRule {
    pub fn new(ty: SchemaType) -> Self {
        Self {
            ty: Some(ty),
            ..Default::default()
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn min(mut self, min: f64) -> Self {
        self.minimum = Some(min);
        self
    }

    pub fn max(mut self, max: f64) -> Self {
        self.maximum = Some(max);
        self
    }

    pub fn format(mut self, format: &'static str) -> Self {
        self.format = Some(format);
        self
    }

    pub fn properties(mut self, properties: HashMap<String, SchemaRule>) -> Self {
        self.properties = Some(properties);
        self
    }

    pub fn items(mut self, items: SchemaRule) -> Self {
        self.items = Some(Box::new(items));
        self
    }

    pub fn predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    /// Collect every violation instead of stopping at the first.
    pub collect_all: bool,
    /// Coerce `"42"` -> `42` and `"true"`/`"false"` -> bool before the type
    /// check runs.
    pub coerce: bool,
    /// Allow required fields to be absent; report them via `missing_fields`
    /// instead of failing.
    pub partial: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct SchemaValidationResult {
    pub valid: bool,
    pub errors: Vec<FieldError>,
    pub missing_fields: Vec<String>,
    pub is_partial: bool,
}

/// Validates `value` against `schema`, returning every violation (or just
/// the first, depending on `options.collect_all`).
pub fn validate_schema(
    value: &Value,
    schema: &SchemaRule,
    options: &ValidationOptions,
) -> SchemaValidationResult {
    let mut result = SchemaValidationResult::default();
    walk(value, schema, options, "", &mut result);
    result.is_partial = options.partial && !result.missing_fields.is_empty();
    result.valid = result.errors.is_empty();
    result
}

fn push_error(result: &mut SchemaValidationResult, options: &ValidationOptions, error: FieldError) -> bool {
    result.errors.push(error);
    options.collect_all
}

fn walk(
    value: &Value,
    schema: &SchemaRule,
    options: &ValidationOptions,
    path: &str,
    result: &mut SchemaValidationResult,
) {
    if value.is_null() {
        if schema.nullable {
            return;
        }
        if schema.required {
            if options.partial {
                result.missing_fields.push(path.to_string());
                if !options.collect_all {
                    return;
                }
            } else if !push_error(
                result,
                options,
                FieldError {
                    path: path.to_string(),
                    message: format!("field '{path}' is required but null"),
                },
            ) {
                return;
            }
        }
        return;
    }

    let coerced = if options.coerce {
        coerce(value, schema.ty)
    } else {
        value.clone()
    };

    if let Some(ty) = schema.ty {
        if !ty.matches(&coerced) {
            if !push_error(
                result,
                options,
                FieldError {
                    path: path.to_string(),
                    message: format!("field '{path}' expected {ty:?}, got {}", type_name(&coerced)),
                },
            ) {
                return;
            }
        }
    }

    if let Some(n) = coerced.as_f64() {
        if let Some(min) = schema.minimum {
            if n < min {
                if !push_error(
                    result,
                    options,
                    FieldError {
                        path: path.to_string(),
                        message: format!("field '{path}' value {n} is below minimum {min}"),
                    },
                ) {
                    return;
                }
            }
        }
        if let Some(max) = schema.maximum {
            if n > max {
                if !push_error(
                    result,
                    options,
                    FieldError {
                        path: path.to_string(),
                        message: format!("field '{path}' value {n} is above maximum {max}"),
                    },
                ) {
                    return;
                }
            }
        }
    }

    if schema.format == Some("email") {
        if let Some(s) = coerced.as_str() {
            if !looks_like_email(s) {
                if !push_error(
                    result,
                    options,
                    FieldError {
                        path: path.to_string(),
                        message: format!("field '{path}' is not a valid email"),
                    },
                ) {
                    return;
                }
            }
        }
    }

    if let Some(predicate) = &schema.predicate {
        let outcome = predicate(&coerced);
        if !outcome.is_valid() {
            if !push_error(
                result,
                options,
                FieldError {
                    path: path.to_string(),
                    message: outcome.message(path),
                },
            ) {
                return;
            }
        }
    }

    if let Some(properties) = &schema.properties {
        if let Some(obj) = coerced.as_object() {
            for (name, prop_schema) in properties {
                let child_path = if path.is_empty() {
                    name.clone()
                } else {
                    format!("{path}.{name}")
                };
                match obj.get(name) {
                    Some(child) => walk(child, prop_schema, options, &child_path, result),
                    None if prop_schema.required => {
                        if options.partial {
                            result.missing_fields.push(child_path);
                        } else {
                            push_error(
                                result,
                                options,
                                FieldError {
                                    path: child_path.clone(),
                                    message: format!("field '{child_path}' is required"),
                                },
                            );
                        }
                    }
                    None => {}
                }
            }
        }
    }

    if let Some(items_schema) = &schema.items {
        if let Some(arr) = coerced.as_array() {
            for (i, item) in arr.iter().enumerate() {
                let child_path = format!("{path}[{i}]");
                walk(item, items_schema, options, &child_path, result);
            }
        }
    }
}

fn coerce(value: &Value, ty: Option<SchemaType>) -> Value {
    let Some(ty) = ty else {
        return value.clone();
    };
    let Some(s) = value.as_str() else {
        return value.clone();
    };
    match ty {
        SchemaType::Number => s
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| value.clone()),
        SchemaType::Boolean => match s {
            "true" => Value::Bool(true),
            "false" => Value::Bool(false),
            _ => value.clone(),
        },
        _ => value.clone(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn looks_like_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty() && domain.contains('.') && !domain.starts_with('.') && !domain.ends_with('.')
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn type_mismatch_is_reported_with_dotted_path() {
        let mut props = HashMap::new();
        props.insert(
            "age".to_string(),
            SchemaRule::new(SchemaType::Number).required(),
        );
        let mut nested = HashMap::new();
        nested.insert(
            "personal".to_string(),
            SchemaRule::new(SchemaType::Object).properties(props),
        );
        let schema = SchemaRule::new(SchemaType::Object).properties(nested.clone());
        let schema = SchemaRule {
            properties: Some({
                let mut top = HashMap::new();
                top.insert(
                    "profile".to_string(),
                    SchemaRule::new(SchemaType::Object).properties(nested),
                );
                top
            }),
            ..schema
        };

        let value = json!({"profile": {"personal": {"age": "not a number"}}});
        let result = validate_schema(&value, &schema, &ValidationOptions::default());
        assert!(!result.valid);
        assert_eq!(result.errors[0].path, "profile.personal.age");
    }

    #[test]
    fn array_items_use_bracket_paths() {
        let schema = SchemaRule::new(SchemaType::Array).items(SchemaRule::new(SchemaType::Number));
        let result = validate_schema(&json!([1, "two", 3]), &schema, &ValidationOptions {
            collect_all: true,
            ..Default::default()
        });
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].path, "[1]");
    }

    #[test]
    fn coercion_turns_strings_into_numbers_and_bools() {
        let schema = SchemaRule::new(SchemaType::Number).min(0.0).max(100.0);
        let options = ValidationOptions {
            coerce: true,
            ..Default::default()
        };
        let result = validate_schema(&json!("42"), &schema, &options);
        assert!(result.valid);

        let schema = SchemaRule::new(SchemaType::Boolean);
        let result = validate_schema(&json!("true"), &schema, &options);
        assert!(result.valid);
    }

    #[test]
    fn partial_mode_reports_missing_required_fields_without_failing() {
        let mut props = HashMap::new();
        props.insert("name".to_string(), SchemaRule::new(SchemaType::String).required());
        props.insert("age".to_string(), SchemaRule::new(SchemaType::Number).required());
        let schema = SchemaRule::new(SchemaType::Object).properties(props);

        let options = ValidationOptions {
            partial: true,
            ..Default::default()
        };
        let result = validate_schema(&json!({"name": "Ada"}), &schema, &options);
        assert!(result.valid);
        assert!(result.is_partial);
        assert_eq!(result.missing_fields, vec!["age".to_string()]);
    }

    #[test]
    fn email_format_check() {
        let schema = SchemaRule::new(SchemaType::String).format("email");
        assert!(validate_schema(&json!("a@b.com"), &schema, &ValidationOptions::default()).valid);
        assert!(!validate_schema(&json!("not-an-email"), &schema, &ValidationOptions::default()).valid);
    }

    #[test]
    fn custom_predicate_can_return_detailed_message() {
        let schema = SchemaRule::new(SchemaType::String).predicate(Arc::new(|v| {
            if v.as_str() == Some("ok") {
                PredicateOutcome::Valid(true)
            } else {
                PredicateOutcome::Detailed {
                    valid: false,
                    message: "must be 'ok'".to_string(),
                }
            }
        }));
        let result = validate_schema(&json!("nope"), &schema, &ValidationOptions::default());
        assert_eq!(result.errors[0].message, "must be 'ok'");
    }

    #[test]
    fn short_circuits_by_default() {
        let mut props = HashMap::new();
        props.insert("a".to_string(), SchemaRule::new(SchemaType::Number));
        props.insert("b".to_string(), SchemaRule::new(SchemaType::Number));
        let schema = SchemaRule::new(SchemaType::Object).properties(props);
        let result = validate_schema(&json!({"a": "x", "b": "y"}), &schema, &ValidationOptions::default());
        assert_eq!(result.errors.len(), 1);
    }
}
