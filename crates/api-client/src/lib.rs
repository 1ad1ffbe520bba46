//! Authenticated API client with transparent token refresh
//!
//! Core request path: build → send → classify → (maybe refresh → retry
//! once) → return. Session state lives in one `ApiClient` instance;
//! concurrent requests that hit a 401 collapse into a single refresh
//! exchange and all observe its outcome.
//!
//! Module map:
//! - `client` — request executor, verb helpers, session lifecycle
//! - `refresh` — single-flight refresh coordination
//! - `classify` — closed error taxonomy over upstream responses
//! - `transport` — HTTP seam (reqwest in production, scripted in tests)
//! - `config` — TOML configuration with env overlay

pub mod classify;
pub mod client;
pub mod config;
pub mod error;
pub mod refresh;
pub mod transport;

pub use classify::classify;
pub use client::{ApiClient, RequestOptions, UnauthorizedCallback};
pub use config::{ApiConfig, AuthConfig, Config, ConfigError};
pub use error::{ApiError, ErrorKind, Result};
pub use refresh::SingleFlight;
pub use transport::{
    FilePart, HttpTransport, RawRequest, RawResponse, RequestBody, Transport, TransportError,
};

pub use reqwest::Method;
