use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use spin_sdk::http::{Request, Response};
use uuid::Uuid;

use crate::core::errors::{ApiError, ApiResult};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

pub fn validate_uuid(id: &str) -> bool {
    Uuid::parse_str(id).is_ok()
}

pub fn json_response<T: Serialize>(status: u16, value: &T) -> ApiResult<Response> {
    Ok(Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(value)?)
        .build())
}

/// Decodes a typed request body, rejecting malformed JSON and missing fields with 400.
pub fn parse_body<T: DeserializeOwned>(req: &Request) -> ApiResult<T> {
    serde_json::from_slice(req.body())
        .map_err(|e| ApiError::BadRequest(format!("Invalid request body: {}", e)))
}

/// Splits a request path into its non-empty segments, ignoring any query string.
pub fn path_segments(path: &str) -> Vec<&str> {
    let path = path.split('?').next().unwrap_or_default();
    path.split('/').filter(|s| !s.is_empty()).collect()
}
