//! Session credential library
//!
//! Credential types, the refresh exchange wire contract, and token
//! persistence for the authenticated API client. This crate is a standalone
//! library with no dependency on the client crate — it can be tested and
//! used independently.
//!
//! Credential flow:
//! 1. Caller authenticates out-of-band and hands the token pair to the client
//! 2. Client persists the pair via `TokenStore::set`
//! 3. On access-token expiry the client posts a `RefreshRequest` to the
//!    refresh endpoint
//! 4. The refreshed (possibly rotated) pair is stored again via
//!    `TokenStore::set`
//! 5. Logout clears both memory and store via `TokenStore::clear`

pub mod constants;
pub mod credentials;
pub mod error;
pub mod token;

pub use constants::*;
pub use credentials::{Credentials, FileTokenStore, MemoryTokenStore, TokenStore};
pub use error::{Error, Result};
pub use token::{RefreshRequest, RefreshResponse};
