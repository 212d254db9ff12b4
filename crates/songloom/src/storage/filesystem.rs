use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::AsyncWriteExt;

use super::{validate_key, StorageProvider, StoredObject};
use crate::error::StorageError;

pub const DEFAULT_PUBLIC_PREFIX: &str = "/audio";

/// Collision retries before giving up on a key.
const MAX_SUFFIX: u32 = 1000;

/// Stores objects as files under `root`, served back under `public_prefix`.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
    public_prefix: String,
}

impl FileStorage {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self::with_public_prefix(root, DEFAULT_PUBLIC_PREFIX)
    }

    pub fn with_public_prefix(root: impl AsRef<Path>, public_prefix: &str) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn public_prefix(&self) -> &str {
        &self.public_prefix
    }

    async fn ensure_directory(&self, path: &Path) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| StorageError::CreateDirectory {
                path: path.to_path_buf(),
                source: e,
            })
    }

    /// Creates the file exclusively, trying `name_2.ext`, `name_3.ext`, ...
    /// when the key is taken. Returns the key that was written.
    async fn write_exclusive(&self, key: &str, content: &[u8]) -> Result<String, StorageError> {
        let (stem, ext) = match key.rfind('.') {
            Some(dot) if dot > key.rfind('/').map_or(0, |s| s + 1) => key.split_at(dot),
            _ => (key, ""),
        };

        for counter in 1..=MAX_SUFFIX {
            let candidate = if counter == 1 {
                key.to_string()
            } else {
                format!("{}_{}{}", stem, counter, ext)
            };
            let path = self.root.join(&candidate);

            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    let written = async {
                        file.write_all(content).await?;
                        file.flush().await
                    }
                    .await;
                    if let Err(e) = written {
                        // Leave no truncated object behind.
                        let _ = tokio::fs::remove_file(&path).await;
                        return Err(StorageError::WriteFile { path, source: e });
                    }
                    return Ok(candidate);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(StorageError::WriteFile { path, source: e }),
            }
        }

        Err(StorageError::FileExists(self.root.join(key)))
    }
}

#[async_trait]
impl StorageProvider for FileStorage {
    async fn upload(
        &self,
        key: &str,
        bytes: Bytes,
        mime_type: &str,
    ) -> Result<StoredObject, StorageError> {
        validate_key(key)?;
        if let Some(parent) = self.root.join(key).parent() {
            self.ensure_directory(parent).await?;
        }

        let stored = self.write_exclusive(key, &bytes).await?;
        log::debug!(
            "Stored {} ({} bytes, {}) under {}",
            stored,
            bytes.len(),
            mime_type,
            self.root.display()
        );

        Ok(StoredObject {
            url: format!("{}/{}", self.public_prefix, stored),
            key: stored,
        })
    }
}
