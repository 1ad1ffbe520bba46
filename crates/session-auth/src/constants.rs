//! Session endpoint constants
//!
//! The refresh path is relative to the client's configured base URL; the
//! backend versions its API under a prefix that belongs to the base URL,
//! not to this path.

/// Token refresh endpoint, relative to the configured base URL.
pub const REFRESH_PATH: &str = "/auth/token/refresh/";

/// Authorization scheme attached to authenticated requests.
pub const BEARER_SCHEME: &str = "Bearer";
