//! Durable credential storage backed by a JSON file.
//!
//! The mobile app kept the bearer token in device key-value storage; here it
//! lives in a small JSON file under the app's data directory. Writes go
//! through a temp file + rename so a crash mid-write never leaves a partial
//! token on disk.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

use super::traits::BaseCredentialStore;

#[derive(Serialize, Deserialize)]
struct StoredCredential {
    token: String,
}

/// File-backed credential store.
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn temp_path(&self) -> PathBuf {
        let mut path = self.path.clone();
        path.set_extension("tmp");
        path
    }
}

#[async_trait]
impl BaseCredentialStore for FileCredentialStore {
    async fn load(&self) -> Result<Option<String>> {
        let raw = match fs::read_to_string(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).context("reading credential file"),
        };
        let stored: StoredCredential =
            serde_json::from_str(&raw).context("parsing credential file")?;
        Ok(Some(stored.token))
    }

    async fn save(&self, token: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .context("creating credential directory")?;
        }
        let raw = serde_json::to_string(&StoredCredential {
            token: token.to_string(),
        })
        .context("serializing credential")?;

        let temp = self.temp_path();
        fs::write(&temp, raw)
            .await
            .context("writing credential temp file")?;
        fs::rename(&temp, &self.path)
            .await
            .context("committing credential file")?;
        debug!(path = %self.path.display(), "credential persisted");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).context("removing credential file"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_store() -> FileCredentialStore {
        let dir = std::env::temp_dir().join(format!("pasarin-test-{}", uuid::Uuid::new_v4()));
        FileCredentialStore::new(dir.join("credential.json"))
    }

    #[tokio::test]
    async fn test_save_load_roundtrip() {
        let store = temp_store();
        store.save("tok_abc").await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some("tok_abc".to_string()));
    }

    #[tokio::test]
    async fn test_load_missing_file_is_none() {
        let store = temp_store();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let store = temp_store();
        store.save("tok_abc").await.unwrap();
        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.load().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_overwrites_previous_token() {
        let store = temp_store();
        store.save("tok_old").await.unwrap();
        store.save("tok_new").await.unwrap();
        assert_eq!(store.load().await.unwrap(), Some("tok_new".to_string()));
    }
}
