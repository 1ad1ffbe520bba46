//! Credential types and token persistence
//!
//! `Credentials` is the in-memory token pair owned by one client instance.
//! `TokenStore` is the persistence boundary the client calls after every
//! successful login and refresh; the storage medium behind it is the
//! implementor's concern. `FileTokenStore` writes a single JSON document
//! with atomic temp-file + rename to prevent corruption on crash, and a
//! tokio Mutex serializes concurrent writes from request-time refresh and
//! login. `MemoryTokenStore` backs ephemeral sessions and tests.
//!
//! Token material never appears in logs: `Debug` redacts present tokens and
//! drop zeroizes them.

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};
use zeroize::Zeroize;

use crate::error::{Error, Result};

/// A session's token pair.
///
/// `access` is attached as a bearer header to outgoing requests; `refresh`
/// is exchanged for a new access token when the old one expires. Either may
/// be absent (anonymous session, or a login flow that issues no refresh
/// token).
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

impl Credentials {
    pub fn new(access: &str, refresh: Option<&str>) -> Self {
        Self {
            access: Some(access.to_owned()),
            refresh: refresh.map(str::to_owned),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(token: &Option<String>) -> &'static str {
            match token {
                Some(_) => "[REDACTED]",
                None => "None",
            }
        }
        f.debug_struct("Credentials")
            .field("access", &redact(&self.access))
            .field("refresh", &redact(&self.refresh))
            .finish()
    }
}

impl Drop for Credentials {
    fn drop(&mut self) {
        if let Some(token) = self.access.as_mut() {
            token.zeroize();
        }
        if let Some(token) = self.refresh.as_mut() {
            token.zeroize();
        }
    }
}

/// Persistence boundary for the token pair.
///
/// The client calls `set` after every successful login and refresh, and
/// `clear` on logout. A `refresh` of `None` leaves any previously stored
/// refresh token in place (a refresh exchange that did not rotate).
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn TokenStore>`).
pub trait TokenStore: Send + Sync {
    fn set<'a>(
        &'a self,
        access: &'a str,
        refresh: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

    fn clear(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// File-backed token store.
///
/// The file is the durable copy of the session; the in-memory state under
/// the Mutex mirrors it so reads never touch the disk.
pub struct FileTokenStore {
    path: PathBuf,
    state: Mutex<Credentials>,
}

impl FileTokenStore {
    /// Load persisted tokens from the given file path.
    ///
    /// If the file doesn't exist, creates it as an empty document (cold
    /// start, anonymous session until the first login).
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading token file: {e}")))?;
            let credentials: Credentials = serde_json::from_str(&contents)
                .map_err(|e| Error::CredentialParse(format!("parsing token file: {e}")))?;
            info!(path = %path.display(), "loaded persisted tokens");
            credentials
        } else {
            info!(path = %path.display(), "token file not found, starting with empty session");
            let credentials = Credentials::default();
            write_atomic(&path, &credentials).await?;
            credentials
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Snapshot of the stored pair, used to seed a client at startup.
    pub async fn tokens(&self) -> Credentials {
        self.state.lock().await.clone()
    }
}

impl TokenStore for FileTokenStore {
    fn set<'a>(
        &'a self,
        access: &'a str,
        refresh: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.access = Some(access.to_owned());
            if let Some(refresh) = refresh {
                state.refresh = Some(refresh.to_owned());
            }
            write_atomic(&self.path, &state).await
        })
    }

    fn clear(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            *state = Credentials::default();
            debug!("cleared persisted tokens");
            write_atomic(&self.path, &state).await
        })
    }
}

/// In-memory token store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryTokenStore {
    state: Mutex<Credentials>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the stored pair.
    pub async fn tokens(&self) -> Credentials {
        self.state.lock().await.clone()
    }
}

impl TokenStore for MemoryTokenStore {
    fn set<'a>(
        &'a self,
        access: &'a str,
        refresh: Option<&'a str>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            let mut state = self.state.lock().await;
            state.access = Some(access.to_owned());
            if let Some(refresh) = refresh {
                state.refresh = Some(refresh.to_owned());
            }
            Ok(())
        })
    }

    fn clear(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            *self.state.lock().await = Credentials::default();
            Ok(())
        })
    }
}

/// Write the token document to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target. This prevents corruption if the process crashes mid-write.
/// Sets file permissions to 0600 (owner read/write only) since the file
/// contains session tokens.
async fn write_atomic(path: &Path, tokens: &Credentials) -> Result<()> {
    let json = serde_json::to_string_pretty(tokens)
        .map_err(|e| Error::CredentialParse(format!("serializing tokens: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("token file path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".tokens.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp token file: {e}")))?;

    // Set 0600 permissions (unix only)
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted tokens");
    Ok(())
}
