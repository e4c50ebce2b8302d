//! Shared helpers for extracting typed parameters from `serde_json::Value`.
//!
//! These reduce boilerplate in `ChatTool::execute` implementations that
//! pull fields out of model-supplied argument objects.

use serde_json::Value;

use crate::Error;

/// Extract a trimmed, non-empty `&str` from a JSON object field.
///
/// Returns `None` when the key is absent, null, not a string, empty,
/// or whitespace-only.
pub fn str_param<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Like [`str_param`] but returns a `crate::Error` when missing.
pub fn require_str<'a>(params: &'a Value, key: &str) -> crate::Result<&'a str> {
    str_param(params, key)
        .ok_or_else(|| Error::message(format!("missing required parameter: {key}")))
}

/// Extract an `f64`, accepting integer JSON numbers too.
pub fn f64_param(params: &Value, key: &str) -> Option<f64> {
    params.get(key).and_then(Value::as_f64)
}

/// Like [`f64_param`] but returns a `crate::Error` when missing.
pub fn require_f64(params: &Value, key: &str) -> crate::Result<f64> {
    f64_param(params, key)
        .ok_or_else(|| Error::message(format!("missing required parameter: {key}")))
}
