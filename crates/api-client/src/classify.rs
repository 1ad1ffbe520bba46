//! Response classification
//!
//! Converts an HTTP status and response body into one member of the closed
//! error taxonomy plus a best-effort message. The status→kind table is
//! fixed; a 401 is further disambiguated by the server's `error_code`
//! discriminator, whose absence means a generic unauthorized rather than an
//! expired token.

use serde_json::Value;

use crate::error::{ApiError, ErrorKind};

/// Discriminator the server sets on 401 bodies for an expired access token.
const TOKEN_EXPIRED_CODE: &str = "TOKEN_EXPIRED";

/// Body fields checked, in order, for a human-readable message.
const MESSAGE_FIELDS: &[&str] = &["detail", "message", "error"];

/// Classify a response into an `ApiError`.
///
/// The body is parsed best-effort as JSON; parse failure falls back to a
/// generic message and carries no payload. Statuses outside the fixed table
/// map to `Unknown`.
pub fn classify(status: u16, body: &str) -> ApiError {
    let payload: Option<Value> = serde_json::from_str(body).ok();
    let kind = kind_for(status, payload.as_ref());
    let message = extract_message(payload.as_ref())
        .unwrap_or_else(|| format!("request failed with status {status}"));
    ApiError {
        kind,
        message,
        status,
        payload,
    }
}

fn kind_for(status: u16, payload: Option<&Value>) -> ErrorKind {
    match status {
        401 => {
            let code = payload
                .and_then(|p| p.get("error_code"))
                .and_then(Value::as_str);
            if code == Some(TOKEN_EXPIRED_CODE) {
                ErrorKind::TokenExpired
            } else {
                ErrorKind::Unauthorized
            }
        }
        403 => ErrorKind::Forbidden,
        404 => ErrorKind::NotFound,
        400 | 422 => ErrorKind::ValidationError,
        500 | 502 | 503 => ErrorKind::ServerError,
        0 => ErrorKind::NetworkError,
        _ => ErrorKind::Unknown,
    }
}

fn extract_message(payload: Option<&Value>) -> Option<String> {
    let payload = payload?;
    for field in MESSAGE_FIELDS {
        if let Some(message) = payload.get(field).and_then(Value::as_str) {
            return Some(message.to_owned());
        }
    }
    None
}
