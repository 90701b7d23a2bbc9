use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::debug;

use crate::errors::Result;
use crate::models::MsTokenResponse;

/// On-disk cache holding the last successful Microsoft token response
///
/// A single JSON file, overwritten on every successful exchange or refresh.
/// No backup and no versioning; callers decide whether a read or parse
/// failure means "fall back to interactive login".
#[derive(Debug, Clone)]
pub struct TokenCache {
    path: PathBuf,
}

impl TokenCache {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether a cached token record exists on disk
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the cached token, or `None` if the file does not exist
    pub async fn load(&self) -> Result<Option<MsTokenResponse>> {
        if !self.path.exists() {
            debug!("No token cache at {}", self.path.display());
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).await?;
        let token: MsTokenResponse = serde_json::from_str(&content)?;

        debug!("Loaded cached Microsoft token from {}", self.path.display());
        Ok(Some(token))
    }

    /// Overwrite the cache file with `token`
    pub async fn store(&self, token: &MsTokenResponse) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(token)?;
        fs::write(&self.path, json).await?;

        debug!("Stored Microsoft token at {}", self.path.display());
        Ok(())
    }
}
