//! Typed extraction helpers on top of [`path_query`](crate::path_query).
//!
//! Each helper runs one query, requires exactly one result, and checks its
//! JSON type. Any mismatch is a [`QueryError`], which the source adapters
//! surface as a decode error.

use serde_json::Value;

use crate::path_query::{QueryError, query_one};

/// Query a string value.
pub fn query_str(doc: &Value, expr: &str) -> Result<String, QueryError> {
    let v = query_one(doc, expr)?;
    v.as_str().map(str::to_owned).ok_or_else(|| type_mismatch(expr, "string", &v))
}

/// Query a numeric value as `f64`.
pub fn query_f64(doc: &Value, expr: &str) -> Result<f64, QueryError> {
    let v = query_one(doc, expr)?;
    v.as_f64().ok_or_else(|| type_mismatch(expr, "number", &v))
}

/// Query a non-negative integer (typically the output of `| length`).
pub fn query_count(doc: &Value, expr: &str) -> Result<usize, QueryError> {
    let v = query_one(doc, expr)?;
    v.as_u64().map(|n| n as usize).ok_or_else(|| type_mismatch(expr, "count", &v))
}

fn type_mismatch(expr: &str, expected: &str, got: &Value) -> QueryError {
    QueryError::Type { query: expr.to_string(), reason: format!("expected {expected}, got {got}") }
}
