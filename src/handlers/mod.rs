//! HTTP handlers. Each takes the decoded [`Request`](crate::router::Request)
//! plus the shared [`AppState`](crate::state::AppState) and returns a
//! `Result<Response>`; errors render as `{"success": false, "message": ..}`.
pub mod admins;
pub mod auth;
pub mod catalog;
pub mod certificate;
pub mod community;
pub mod leads;
pub mod students;
pub mod uploads;
pub mod verify;

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Value, json};

use crate::error::{AppError, Result};
use crate::router::Response;

/// `{"success": true, "message": ..}`
pub fn ok(message: &str) -> Response {
    Response::json(
        json!({ "success": true, "message": message }),
        200,
        HashMap::new(),
    )
}

/// `{"success": true, "data": ..}`
pub fn data<T: Serialize>(data: T) -> Response {
    Response::json(json!({ "success": true, "data": data }), 200, HashMap::new())
}

/// `{"success": true, "message": .., "data": ..}`
pub fn ok_with<T: Serialize>(message: &str, data: T) -> Response {
    Response::json(
        json!({ "success": true, "message": message, "data": data }),
        200,
        HashMap::new(),
    )
}

/// Accepts strings, numbers and booleans alike; form posts send everything
/// as text while JSON clients send numbers.
pub fn loose_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Trimmed value, `None` when blank.
pub fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Fail with one message naming every missing field.
pub fn require(fields: &[(&str, &Option<String>)]) -> Result<()> {
    let missing: Vec<&str> = fields
        .iter()
        .filter(|(_, value)| present(value).is_none())
        .map(|(name, _)| *name)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "All required fields must be provided: {}",
            missing.join(", ")
        )))
    }
}

/// Required, trimmed field value.
pub fn field(name: &str, value: &Option<String>) -> Result<String> {
    present(value)
        .map(str::to_string)
        .ok_or_else(|| AppError::validation(format!("`{}` is required", name)))
}

/// Parse `"true"`/`"false"` (and `1`/`0`) from a loosely typed field.
pub fn parse_flag(name: &str, value: &Option<String>) -> Result<Option<bool>> {
    match present(value) {
        None => Ok(None),
        Some("true") | Some("1") => Ok(Some(true)),
        Some("false") | Some("0") => Ok(Some(false)),
        Some(other) => Err(AppError::validation(format!(
            "`{}` must be true or false, got `{}`",
            name, other
        ))),
    }
}
