//! Authenticated API client
//!
//! Owns the session state for one logical user: the credential pair, the
//! single-flight refresh slot, the logout guard, and the unauthorized
//! callback. Each request runs the full lifecycle: build headers → send →
//! classify → (maybe refresh → retry once) → return. The refresh-and-retry
//! dance is invisible to callers when it succeeds.
//!
//! Request lifecycle on a 401:
//! 1. First 401 with retry allowed delegates to the refresh flight
//! 2. Refresh success → the request is re-sent exactly once, with the
//!    token read at re-send time
//! 3. Refresh failure → the unauthorized callback fires at most once per
//!    unauthenticated transition and the classified error propagates

use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{self, HeaderMap, HeaderValue};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use session_auth::{BEARER_SCHEME, Credentials, FileTokenStore, MemoryTokenStore, TokenStore};

use crate::classify::classify;
use crate::config::{Config, ConfigError};
use crate::error::{ApiError, Result};
use crate::refresh::SingleFlight;
use crate::transport::{FilePart, HttpTransport, RawRequest, RequestBody, Transport};

/// Callback invoked when the session becomes unauthenticated.
pub type UnauthorizedCallback = Arc<dyn Fn() + Send + Sync>;

/// Per-request knobs. `retry_on_unauthorized` defaults to true; the
/// executor forces it off for the one permitted retry.
#[derive(Debug)]
pub struct RequestOptions {
    pub headers: HeaderMap,
    pub retry_on_unauthorized: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            headers: HeaderMap::new(),
            retry_on_unauthorized: true,
        }
    }
}

/// Idempotent flag marking the session's unauthenticated transition.
///
/// Tripped by the first failed-refresh callback and by explicit logout;
/// reset only by an explicit login, never by a bare successful refresh.
/// The trip is a single compare-and-swap so concurrent failures agree on
/// exactly one winner.
pub(crate) struct LogoutGuard {
    tripped: AtomicBool,
}

impl LogoutGuard {
    fn new() -> Self {
        Self {
            tripped: AtomicBool::new(false),
        }
    }

    /// Returns true for exactly one caller per unauthenticated transition.
    fn trip(&self) -> bool {
        self.tripped
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    pub(crate) fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    fn reset(&self) {
        self.tripped.store(false, Ordering::SeqCst);
    }
}

/// Authenticated API client owning one session.
///
/// Construct independent instances for isolated sessions; all state is
/// per-instance, nothing is process-global.
pub struct ApiClient {
    pub(crate) base_url: String,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) store: Arc<dyn TokenStore>,
    pub(crate) credentials: RwLock<Credentials>,
    pub(crate) refresh_flight: SingleFlight,
    pub(crate) logout_guard: LogoutGuard,
    on_unauthorized: StdMutex<Option<UnauthorizedCallback>>,
}

impl ApiClient {
    /// Create a client over an arbitrary transport and token store.
    pub fn new(base_url: &str, transport: Arc<dyn Transport>, store: Arc<dyn TokenStore>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_owned(),
            transport,
            store,
            credentials: RwLock::new(Credentials::default()),
            refresh_flight: SingleFlight::new(),
            logout_guard: LogoutGuard::new(),
            on_unauthorized: StdMutex::new(None),
        }
    }

    /// Build a production client from configuration: reqwest transport,
    /// plus the file-backed store when `token_file` is configured.
    /// Persisted tokens seed the session so a restart resumes where it
    /// left off.
    pub async fn from_config(config: &Config) -> std::result::Result<Self, ConfigError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ConfigError::Config(format!("building http client: {e}")))?;
        let transport = Arc::new(HttpTransport::new(
            http,
            Duration::from_secs(config.api.timeout_secs),
        ));

        let (store, seeded): (Arc<dyn TokenStore>, Credentials) = match &config.auth.token_file {
            Some(path) => {
                let store = FileTokenStore::load(path.clone()).await?;
                let tokens = store.tokens().await;
                (Arc::new(store), tokens)
            }
            None => (Arc::new(MemoryTokenStore::new()), Credentials::default()),
        };

        let client = Self::new(&config.api.base_url, transport, store);
        *client.credentials.write().await = seeded;
        Ok(client)
    }

    /// Whether the session currently holds an access token.
    pub async fn is_authenticated(&self) -> bool {
        self.credentials.read().await.access.is_some()
    }

    /// Install the session handed back by a login flow. Persists the pair
    /// and re-arms the unauthorized callback for the new session.
    pub async fn set_tokens(&self, access: &str, refresh: Option<&str>) -> session_auth::Result<()> {
        {
            let mut credentials = self.credentials.write().await;
            credentials.access = Some(access.to_owned());
            if let Some(refresh) = refresh {
                credentials.refresh = Some(refresh.to_owned());
            }
        }
        self.logout_guard.reset();
        info!("session tokens installed");
        self.store.set(access, refresh).await
    }

    /// Tear down the session. The logout guard trips first so a refresh
    /// racing this logout discards its result instead of reviving a dead
    /// session; then memory and the store are cleared.
    pub async fn clear_tokens(&self) -> session_auth::Result<()> {
        self.logout_guard.trip();
        *self.credentials.write().await = Credentials::default();
        info!("session tokens cleared");
        self.store.clear().await
    }

    /// Register the handler fired when the session becomes
    /// unauthenticated. A single handler; registering again replaces the
    /// previous one.
    pub fn set_on_unauthorized<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *lock_callback(&self.on_unauthorized) = Some(Arc::new(callback));
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        self.request(Method::GET, path, None, RequestOptions::default())
            .await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        self.request(Method::POST, path, Some(encode(body)?), RequestOptions::default())
            .await
    }

    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        self.request(Method::PUT, path, Some(encode(body)?), RequestOptions::default())
            .await
    }

    pub async fn patch<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        self.request(Method::PATCH, path, Some(encode(body)?), RequestOptions::default())
            .await
    }

    pub async fn delete(&self, path: &str) -> Result<Value> {
        self.request(Method::DELETE, path, None, RequestOptions::default())
            .await
    }

    /// Multipart upload. The JSON content-type default is omitted so the
    /// transport can set its own boundary header.
    pub async fn upload(&self, path: &str, part: FilePart) -> Result<Value> {
        self.execute(
            Method::POST,
            path,
            RequestBody::Multipart(vec![part]),
            RequestOptions::default(),
        )
        .await
    }

    /// Run one logical request through the full lifecycle. `body` of
    /// `None` sends no payload; multipart bodies go through `upload`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        options: RequestOptions,
    ) -> Result<Value> {
        let body = match body {
            Some(value) => RequestBody::Json(value),
            None => RequestBody::Empty,
        };
        self.execute(method, path, body, options).await
    }

    async fn execute(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        options: RequestOptions,
    ) -> Result<Value> {
        let request_id = Uuid::new_v4();
        let url = self.endpoint_url(path);
        let mut retry_allowed = options.retry_on_unauthorized;

        loop {
            let request = RawRequest {
                method: method.clone(),
                url: url.clone(),
                headers: self.build_headers(&options.headers, &body).await,
                body: body.clone(),
            };

            debug!(request_id = %request_id, method = %method, path, "sending request");
            let response = match self.transport.send(request).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(request_id = %request_id, error = %e, "transport failure");
                    return Err(ApiError::network(e.to_string()));
                }
            };

            if response.status == 401 && retry_allowed && !self.logout_guard.is_tripped() {
                retry_allowed = false;
                if self.refresh().await {
                    debug!(request_id = %request_id, "token refreshed, retrying once");
                    continue;
                }
                self.notify_unauthorized();
                return Err(classify(response.status, &response.body));
            }

            if response.status == 204 {
                return Ok(Value::Null);
            }

            if (200..300).contains(&response.status) {
                if response.body.is_empty() {
                    return Ok(Value::Null);
                }
                return serde_json::from_str(&response.body).map_err(|e| {
                    ApiError::unknown(format!("invalid response body: {e}"), response.status)
                });
            }

            warn!(request_id = %request_id, status = response.status, "request failed");
            return Err(classify(response.status, &response.body));
        }
    }

    /// Assemble headers for one send: caller headers, then the JSON
    /// content-type default (multipart leaves it to the transport's
    /// boundary header), then the bearer token read at send time.
    async fn build_headers(&self, base: &HeaderMap, body: &RequestBody) -> HeaderMap {
        let mut headers = base.clone();

        let is_multipart = matches!(body, RequestBody::Multipart(_));
        if !is_multipart && !headers.contains_key(header::CONTENT_TYPE) {
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            );
        }

        if let Some(access) = self.credentials.read().await.access.as_deref() {
            match HeaderValue::from_str(&format!("{BEARER_SCHEME} {access}")) {
                Ok(value) => {
                    headers.insert(header::AUTHORIZATION, value);
                }
                Err(e) => warn!(error = %e, "access token is not a valid header value"),
            }
        }

        headers
    }

    /// Fire the unauthorized callback at most once per transition. The
    /// lock is released before the invocation so the callback may call
    /// back into the client.
    fn notify_unauthorized(&self) {
        let Some(callback) = lock_callback(&self.on_unauthorized).clone() else {
            return;
        };
        if self.logout_guard.trip() {
            info!("session unauthenticated, notifying");
            callback();
        }
    }

    pub(crate) fn endpoint_url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

fn encode<B: Serialize + ?Sized>(body: &B) -> Result<Value> {
    serde_json::to_value(body)
        .map_err(|e| ApiError::unknown(format!("failed to encode request body: {e}"), 0))
}

fn lock_callback(
    cell: &StdMutex<Option<UnauthorizedCallback>>,
) -> std::sync::MutexGuard<'_, Option<UnauthorizedCallback>> {
    cell.lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}
