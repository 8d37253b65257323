//! Access/refresh credential storage
//!
//! The store is the only place credentials are persisted. It is populated by
//! login, updated by the refresh protocol and cleared on logout or when a
//! refresh fails for good.

use crate::{CoreError, CoreResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

/// Persisted credential pair.
///
/// Both halves are independent: a login response may carry an access
/// credential without a refresh credential.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    /// Short-lived credential attached to every request
    #[serde(rename = "token", default, skip_serializing_if = "Option::is_none")]
    pub access: Option<String>,
    /// Longer-lived credential used only to mint a new access credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh: Option<String>,
}

impl Credentials {
    /// Create a full access/refresh pair
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        Self {
            access: Some(access.into()),
            refresh: Some(refresh.into()),
        }
    }

    /// Create a pair holding only an access credential
    pub fn access_only(access: impl Into<String>) -> Self {
        Self {
            access: Some(access.into()),
            refresh: None,
        }
    }

    /// Whether nothing is stored
    pub fn is_empty(&self) -> bool {
        self.access.is_none() && self.refresh.is_none()
    }

    /// Replace the access credential, keeping the refresh credential
    #[must_use]
    pub fn with_access(mut self, access: impl Into<String>) -> Self {
        self.access = Some(access.into());
        self
    }
}

/// Storage for the credential pair
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Latest stored pair; empty when nothing is stored
    async fn get(&self) -> CoreResult<Credentials>;

    /// Replace the stored pair
    async fn set(&self, credentials: &Credentials) -> CoreResult<()>;

    /// Remove both credentials
    async fn clear(&self) -> CoreResult<()>;
}

/// Process-local credential store
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    inner: RwLock<Credentials>,
}

impl MemoryCredentialStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with `credentials`
    pub fn with_credentials(credentials: Credentials) -> Self {
        Self {
            inner: RwLock::new(credentials),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn get(&self) -> CoreResult<Credentials> {
        Ok(self.inner.read().await.clone())
    }

    async fn set(&self, credentials: &Credentials) -> CoreResult<()> {
        *self.inner.write().await = credentials.clone();
        Ok(())
    }

    async fn clear(&self) -> CoreResult<()> {
        *self.inner.write().await = Credentials::default();
        Ok(())
    }
}

/// Credential store backed by a JSON file keyed `token` / `refresh`
///
/// Clones share one write lock, so writes through any of them are applied
/// one at a time.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileCredentialStore {
    /// Create a store persisting to `path`. The file is created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    fn staging_path(&self) -> CoreResult<PathBuf> {
        let Some(name) = self.path.file_name() else {
            return Err(CoreError::invalid_config(format!(
                "credentials path has no file name: {}",
                self.path.display()
            )));
        };
        let mut name = name.to_os_string();
        name.push(".tmp");
        Ok(self.path.with_file_name(name))
    }
}

#[async_trait]
impl CredentialStore for FileCredentialStore {
    async fn get(&self) -> CoreResult<Credentials> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(Credentials::default()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Credentials::default()),
            Err(err) => Err(CoreError::io_error(format!(
                "failed to read {}: {err}",
                self.path.display()
            ))),
        }
    }

    async fn set(&self, credentials: &Credentials) -> CoreResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let staging = self.staging_path()?;
        let contents = serde_json::to_vec_pretty(credentials)?;

        // Staging file and rename must not interleave with another write
        let _guard = self.write_lock.lock().await;
        tokio::fs::write(&staging, contents).await?;
        tokio::fs::rename(&staging, &self.path).await?;

        debug!(path = %self.path.display(), "Persisted credentials");
        Ok(())
    }

    async fn clear(&self) -> CoreResult<()> {
        let _guard = self.write_lock.lock().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Removed persisted credentials");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}
