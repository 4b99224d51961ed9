//! Discriminated-union validation of a shard's decoded JSON reply (§4.2).

use serde_json::Value;

/// A shard reply, classified as either a successful payload or a structured
/// error.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidatedResponse {
    Success { data: Value },
    Error(ResponseError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResponseError {
    pub code: String,
    pub message: String,
    pub shard_id: Option<String>,
    pub path: Option<String>,
    pub errors: Option<Vec<String>>,
}

impl ResponseError {
    fn malformed(message: impl Into<String>) -> Self {
        Self {
            code: "MALFORMED_RESPONSE".to_string(),
            message: message.into(),
            shard_id: None,
            path: None,
            errors: None,
        }
    }
}

/// Validates a shard's decoded JSON body against the two recognized wire
/// shapes (new envelope, legacy bare array) and the malformed-response
/// failure cases enumerated in §4.2.
pub fn validate_response(value: &Value) -> ValidatedResponse {
    match value {
        Value::Null => malformed("response body is null"),
        Value::Array(items) => ValidatedResponse::Success {
            data: Value::Array(items.clone()),
        },
        Value::Object(obj) => {
            let Some(success) = obj.get("success") else {
                return malformed("response is missing 'success'");
            };
            let Some(success) = success.as_bool() else {
                return malformed("'success' is not a boolean");
            };

            if success {
                match obj.get("data") {
                    Some(data) => ValidatedResponse::Success { data: data.clone() },
                    None => malformed("'success' is true but 'data' is missing"),
                }
            } else {
                let Some(error) = obj.get("error").and_then(Value::as_object) else {
                    return malformed("'success' is false but 'error' is missing or not an object");
                };
                let Some(code) = error.get("code").and_then(Value::as_str) else {
                    return malformed("error is missing a string 'code'");
                };
                let Some(message) = error.get("message").and_then(Value::as_str) else {
                    return malformed("error is missing a string 'message'");
                };
                ValidatedResponse::Error(ResponseError {
                    code: code.to_string(),
                    message: message.to_string(),
                    shard_id: error
                        .get("shard_id")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    path: None,
                    errors: None,
                })
            }
        }
        _ => malformed("response body is neither an object nor an array"),
    }
}

fn malformed(message: impl Into<String>) -> ValidatedResponse {
    ValidatedResponse::Error(ResponseError::malformed(message))
}
