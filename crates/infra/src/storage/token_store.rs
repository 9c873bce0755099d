//! Token store implementations
//!
//! [`FileTokenStore`] persists the credential pair as a small JSON document
//! with the fixed keys `access_token` and `refresh_token`. Writes go to a
//! sibling temp file that is renamed over the target, so a crash never leaves
//! a half-written pair behind.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cvforge_core::TokenStore;
use cvforge_domain::{CredentialPair, CvForgeError, Result};
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::errors::InfraError;

/// Durable JSON-file token store
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<CredentialPair>> {
        let contents = match tokio::fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(InfraError::from(err).into()),
        };

        match serde_json::from_slice::<CredentialPair>(&contents) {
            Ok(pair) => Ok(Some(pair)),
            Err(err) => {
                // A corrupt file is treated as logged out rather than fatal.
                warn!(path = %self.path.display(), error = %err, "Discarding unreadable token store");
                Ok(None)
            }
        }
    }

    async fn save(&self, credentials: &CredentialPair) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(InfraError::from)?;
        }

        let contents = serde_json::to_vec_pretty(credentials).map_err(InfraError::from)?;
        let temp = self.temp_path();
        tokio::fs::write(&temp, contents).await.map_err(InfraError::from)?;
        tokio::fs::rename(&temp, &self.path).await.map_err(InfraError::from)?;

        debug!(path = %self.path.display(), "Credentials persisted");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                debug!(path = %self.path.display(), "Credentials cleared");
                Ok(())
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(CvForgeError::from(InfraError::from(err))),
        }
    }
}

/// Process-local token store, for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    credentials: RwLock<Option<CredentialPair>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_credentials(credentials: CredentialPair) -> Self {
        Self { credentials: RwLock::new(Some(credentials)) }
    }

    /// Current contents without going through the async port.
    pub fn snapshot(&self) -> Option<CredentialPair> {
        self.credentials.read().clone()
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self) -> Result<Option<CredentialPair>> {
        Ok(self.credentials.read().clone())
    }

    async fn save(&self, credentials: &CredentialPair) -> Result<()> {
        *self.credentials.write() = Some(credentials.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        *self.credentials.write() = None;
        Ok(())
    }
}
