use crate::calc::ValidationError;
use crate::ipc::error::err;
use crate::store::{Record, StoreError};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Handler-local failure carrying the wire error code. Store and validation
/// errors convert into this so handler bodies can use `?` throughout.
pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<Value>,
}

impl HandlerErr {
    pub fn bad_params(message: impl Into<String>) -> Self {
        HandlerErr {
            code: "bad_params",
            message: message.into(),
            details: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        HandlerErr {
            code: "validation_failed",
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<StoreError> for HandlerErr {
    fn from(error: StoreError) -> Self {
        let code = match &error {
            StoreError::NotFound(_) => "not_found",
            StoreError::Validation(_) => "validation_failed",
            StoreError::Failure(_) => "store_failed",
        };
        HandlerErr {
            code,
            message: error.to_string(),
            details: None,
        }
    }
}

impl From<ValidationError> for HandlerErr {
    fn from(error: ValidationError) -> Self {
        HandlerErr::validation(error.message)
    }
}

pub fn require_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn require_i64(params: &Value, key: &str) -> Result<i64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn require_f64(params: &Value, key: &str) -> Result<f64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn optional_str(params: &Value, key: &str) -> Result<Option<String>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(HandlerErr::bad_params(format!(
            "{} must be a string or null",
            key
        ))),
    }
}

pub fn optional_usize(params: &Value, key: &str) -> Result<Option<usize>, HandlerErr> {
    match params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_u64()
            .map(|n| Some(n as usize))
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a non-negative integer", key))),
    }
}

/// Parses an enum-valued parameter (status, grade type) through serde so the
/// accepted spellings stay in one place: the model.
pub fn parse_variant<T: DeserializeOwned>(value: &Value, what: &str) -> Result<T, HandlerErr> {
    serde_json::from_value(value.clone())
        .map_err(|_| HandlerErr::bad_params(format!("invalid {}: {}", what, value)))
}

pub fn as_record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}
