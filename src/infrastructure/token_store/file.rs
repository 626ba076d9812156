use crate::core::errors::ChiaTienError;
use crate::infrastructure::token_store::{StoredCredentials, TokenStore};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

/// Keeps credentials as a JSON document on disk.
#[derive(Clone, Debug)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileTokenStore { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }
}

fn storage_error(action: &str, e: impl std::fmt::Display) -> ChiaTienError {
    ChiaTienError::StorageError(format!("Failed to {} credentials: {}", action, e))
}

#[async_trait]
impl TokenStore for FileTokenStore {
    async fn load(&self) -> Result<Option<StoredCredentials>, ChiaTienError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(storage_error("read", e)),
        };
        let credentials = serde_json::from_str(&content).map_err(|e| storage_error("decode", e))?;
        Ok(Some(credentials))
    }

    async fn save(&self, credentials: &StoredCredentials) -> Result<(), ChiaTienError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| storage_error("prepare", e))?;
        }
        let payload = serde_json::to_string_pretty(credentials).map_err(|e| storage_error("encode", e))?;
        tokio::fs::write(&self.path, payload)
            .await
            .map_err(|e| storage_error("write", e))?;
        debug!(path = %self.path.display(), "Credentials saved");
        Ok(())
    }

    async fn clear(&self) -> Result<(), ChiaTienError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("remove", e)),
        }
    }
}
