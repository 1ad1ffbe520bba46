//! Refresh exchange wire contract
//!
//! The refresh endpoint accepts the current refresh token and returns a new
//! access token. The server may rotate the refresh token in the same
//! exchange; when it does, the old refresh token is invalidated server-side
//! and the rotated one must be persisted before it is needed again.

use serde::{Deserialize, Serialize};

/// Request body for the refresh endpoint.
#[derive(Debug, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh: &'a str,
}

/// Success payload from the refresh endpoint.
///
/// `refresh` is present only when the server rotated the refresh token.
/// A payload missing `access` is not a successful refresh, whatever the
/// HTTP status said.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}
