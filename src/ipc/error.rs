use crate::store::StoreError;
use serde_json::json;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Maps the store taxonomy onto wire error codes. NotFound and Failure
/// arrive here unchanged from the adapter; Validation should normally have
/// been caught before the store was called.
pub fn store_err(id: &str, error: &StoreError) -> serde_json::Value {
    let code = match error {
        StoreError::NotFound(_) => "not_found",
        StoreError::Validation(_) => "validation_failed",
        StoreError::Failure(_) => "store_failed",
    };
    err(id, code, error.to_string(), None)
}
