//! HTTP handlers for all API routes.

pub mod anomaly;
pub mod providers;
pub mod system;

use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

use crate::error::ApiError;

/// `{ "status": "success", "data": … }`
pub(crate) fn success<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({ "status": "success", "data": data }))
}

/// Success body for train endpoints, which also flag the engine as trained.
pub(crate) fn trained<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({ "status": "success", "trained": true, "data": data }))
}

/// A number given either as a JSON number or a numeric string.
pub(crate) fn number(value: &Value, field: &str) -> Result<f64, ApiError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ApiError::BadRequest(format!("{field} must be numeric, got {value}")))
}
