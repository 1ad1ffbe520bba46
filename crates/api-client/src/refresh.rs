//! Single-flight refresh coordination
//!
//! Many requests can discover an expired access token at the same time;
//! exactly one refresh exchange may be on the wire per client instance.
//! `SingleFlight` collapses concurrent triggers into one execution whose
//! boolean outcome every caller observes, and the client's `refresh` wires
//! the exchange itself: guard checks, the wire call, the credential commit,
//! and persistence.

use std::future::Future;

use reqwest::Method;
use reqwest::header::{self, HeaderMap, HeaderValue};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use session_auth::{REFRESH_PATH, RefreshRequest, RefreshResponse};

use crate::client::ApiClient;
use crate::transport::{RawRequest, RequestBody};

/// Collapses concurrent triggers of one asynchronous operation into a
/// single execution.
///
/// The first caller becomes the leader and runs the operation; callers
/// arriving while it is in flight share its outcome through a watch
/// channel. The slot is cleared before waiters are woken, so a trigger
/// arriving after settlement starts a fresh execution instead of joining a
/// dead one.
pub struct SingleFlight {
    slot: Mutex<Option<watch::Receiver<Option<bool>>>>,
}

enum Role {
    Leader(watch::Sender<Option<bool>>),
    Waiter(watch::Receiver<Option<bool>>),
}

impl SingleFlight {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Run `operation`, or join the execution already in flight.
    pub async fn run<F, Fut>(&self, operation: F) -> bool
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = bool>,
    {
        let role = {
            let mut slot = self.slot.lock().await;
            match slot.as_ref() {
                Some(receiver) => Role::Waiter(receiver.clone()),
                None => {
                    let (sender, receiver) = watch::channel(None);
                    *slot = Some(receiver);
                    Role::Leader(sender)
                }
            }
        };

        match role {
            Role::Leader(sender) => {
                let outcome = operation().await;
                *self.slot.lock().await = None;
                let _ = sender.send(Some(outcome));
                outcome
            }
            Role::Waiter(mut receiver) => match receiver.wait_for(Option::is_some).await.map(|outcome| *outcome) {
                Ok(outcome) => outcome.unwrap_or(false),
                Err(_) => {
                    // Leader dropped without settling. Clear the stale slot,
                    // unless a new flight already replaced it.
                    let mut slot = self.slot.lock().await;
                    if slot
                        .as_ref()
                        .is_some_and(|stored| stored.same_channel(&receiver))
                    {
                        *slot = None;
                    }
                    false
                }
            },
        }
    }
}

impl Default for SingleFlight {
    fn default() -> Self {
        Self::new()
    }
}

impl ApiClient {
    /// Exchange the refresh token for a new access token.
    ///
    /// Concurrent triggers collapse into one network call; every caller
    /// observes the same boolean outcome. `false` means the session could
    /// not be refreshed: no refresh token, a logout in progress, or the
    /// exchange itself failed. Credentials are never left half-updated —
    /// the old pair stays in place until a new one is confirmed.
    pub async fn refresh(&self) -> bool {
        if self.logout_guard.is_tripped() {
            debug!("refresh skipped, logout in progress");
            return false;
        }
        if self.credentials.read().await.refresh.is_none() {
            debug!("refresh skipped, no refresh token");
            return false;
        }
        self.refresh_flight.run(|| self.run_refresh()).await
    }

    /// Leader path: the actual exchange. The guards are re-checked here
    /// because the session may have changed while this trigger queued for
    /// the slot.
    async fn run_refresh(&self) -> bool {
        let refresh_token = match self.credentials.read().await.refresh.clone() {
            Some(token) => token,
            None => return false,
        };

        let body = match serde_json::to_value(RefreshRequest {
            refresh: &refresh_token,
        }) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "failed to encode refresh request");
                return false;
            }
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        let request = RawRequest {
            method: Method::POST,
            url: self.endpoint_url(REFRESH_PATH),
            headers,
            body: RequestBody::Json(body),
        };

        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "token refresh transport failure");
                return false;
            }
        };

        if !(200..300).contains(&response.status) {
            warn!(status = response.status, "token refresh rejected");
            return false;
        }

        let refreshed: RefreshResponse = match serde_json::from_str(&response.body) {
            Ok(refreshed) => refreshed,
            Err(e) => {
                warn!(error = %e, "invalid refresh payload");
                return false;
            }
        };

        // A logout that raced the flight wins: discard the result rather
        // than revive a dead session.
        if self.logout_guard.is_tripped() {
            debug!("refresh settled during logout, discarding");
            return false;
        }

        {
            let mut credentials = self.credentials.write().await;
            credentials.access = Some(refreshed.access.clone());
            if let Some(rotated) = refreshed.refresh.clone() {
                credentials.refresh = Some(rotated);
            }
        }

        if let Err(e) = self
            .store
            .set(&refreshed.access, refreshed.refresh.as_deref())
            .await
        {
            warn!(error = %e, "failed to persist refreshed tokens");
        }

        info!(rotated = refreshed.refresh.is_some(), "token refresh succeeded");
        true
    }
}
