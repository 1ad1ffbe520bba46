//! Classified request errors
//!
//! Every failed request surfaces as one `ApiError` whose kind is drawn from
//! a closed taxonomy. Callers branch on the kind; the message and raw
//! payload are best-effort context from the upstream response.

use serde_json::Value;

/// Closed taxonomy of request failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// No response was obtained at all (synthetic status 0).
    NetworkError,
    /// 401 with the server's expired-token discriminator.
    TokenExpired,
    /// Any other 401.
    Unauthorized,
    Forbidden,
    NotFound,
    /// 400 or 422.
    ValidationError,
    /// 500, 502, or 503.
    ServerError,
    /// Any status outside the fixed table.
    Unknown,
}

impl ErrorKind {
    /// Stable label for logging and string matching.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::NetworkError => "network_error",
            ErrorKind::TokenExpired => "token_expired",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::ValidationError => "validation_error",
            ErrorKind::ServerError => "server_error",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A classified request failure.
///
/// `status` is the HTTP status that produced the classification, or `0`
/// when no response was obtained. `payload` holds the parsed response body
/// when it was valid JSON.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{kind}: {message} (status {status})")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    pub status: u16,
    pub payload: Option<Value>,
}

impl ApiError {
    /// Transport-level failure: no response triple was obtained.
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::NetworkError,
            message: message.into(),
            status: 0,
            payload: None,
        }
    }

    pub(crate) fn unknown(message: impl Into<String>, status: u16) -> Self {
        Self {
            kind: ErrorKind::Unknown,
            message: message.into(),
            status,
            payload: None,
        }
    }

    /// Whether the caller can plausibly retry the operation later.
    /// Session-fatal kinds (post-refresh 401s) are not recoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind, ErrorKind::NetworkError | ErrorKind::ServerError)
    }
}

/// Result alias for request operations.
pub type Result<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_stable() {
        assert_eq!(ErrorKind::NetworkError.label(), "network_error");
        assert_eq!(ErrorKind::TokenExpired.label(), "token_expired");
        assert_eq!(ErrorKind::Unauthorized.label(), "unauthorized");
        assert_eq!(ErrorKind::Forbidden.label(), "forbidden");
        assert_eq!(ErrorKind::NotFound.label(), "not_found");
        assert_eq!(ErrorKind::ValidationError.label(), "validation_error");
        assert_eq!(ErrorKind::ServerError.label(), "server_error");
        assert_eq!(ErrorKind::Unknown.label(), "unknown");
    }

    #[test]
    fn display_includes_kind_message_and_status() {
        let error = ApiError {
            kind: ErrorKind::NotFound,
            message: "no such sentence".into(),
            status: 404,
            payload: None,
        };
        assert_eq!(error.to_string(), "not_found: no such sentence (status 404)");
    }

    #[test]
    fn network_constructor_uses_synthetic_status_zero() {
        let error = ApiError::network("connection refused");
        assert_eq!(error.kind, ErrorKind::NetworkError);
        assert_eq!(error.status, 0);
        assert!(error.payload.is_none());
    }

    #[test]
    fn recoverable_kinds() {
        assert!(ApiError::network("x").is_recoverable());
        let server = ApiError {
            kind: ErrorKind::ServerError,
            message: "boom".into(),
            status: 502,
            payload: None,
        };
        assert!(server.is_recoverable());

        let dead_session = ApiError {
            kind: ErrorKind::Unauthorized,
            message: "session expired".into(),
            status: 401,
            payload: None,
        };
        assert!(!dead_session.is_recoverable());
    }
}
