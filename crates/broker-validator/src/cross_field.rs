//! Cross-field validation (§4.2): checks that span more than one field,
//! run before the per-field schema pass.

use crate::schema::FieldError;
use serde_json::Value;
use std::sync::Arc;

pub type CrossFieldRule = Arc<dyn Fn(&Value) -> Option<FieldError> + Send + Sync>;

/// Runs every cross-field rule against `value`, returning all violations.
/// Intended to run before [`crate::schema::validate_schema`] so a rule like
/// "password and confirm_password must match" is checked first.
pub fn validate_cross_field(value: &Value, rules: &[CrossFieldRule]) -> Vec<FieldError> {
    rules.iter().filter_map(|rule| rule(value)).collect()
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn reports_violations_from_matching_fields() {
        let rule: CrossFieldRule = Arc::new(|v| {
            let a = v.get("password")?.as_str()?;
            let b = v.get("confirm_password")?.as_str()?;
            (a != b).then(|| FieldError {
                path: "confirm_password".to_string(),
                message: "passwords do not match".to_string(),
            })
        });

        let errors = validate_cross_field(&json!({"password": "a", "confirm_password": "b"}), &[rule.clone()]);
        assert_eq!(errors.len(), 1);

        let errors = validate_cross_field(&json!({"password": "a", "confirm_password": "a"}), &[rule]);
        assert!(errors.is_empty());
    }
}
