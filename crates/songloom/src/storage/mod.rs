//! Blob storage for produced songs and uploaded reference audio.

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageError;

pub mod factory;
pub mod filesystem;
pub mod object;

pub use factory::from_config;
pub use filesystem::FileStorage;
pub use object::ObjectStorage;

/// Where an upload ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    /// Key actually used; may differ from the requested one on collision.
    pub key: String,
    /// Location clients can fetch the object from.
    pub url: String,
}

#[async_trait]
pub trait StorageProvider: Send + Sync {
    async fn upload(
        &self,
        key: &str,
        bytes: Bytes,
        mime_type: &str,
    ) -> Result<StoredObject, StorageError>;
}

/// Keys are relative, slash-separated, and free of `.`/`..` or empty segments.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let invalid = |reason: &str| StorageError::InvalidKey {
        key: key.to_string(),
        reason: reason.to_string(),
    };

    if key.is_empty() {
        return Err(invalid("empty key"));
    }
    if key.starts_with('/') || key.contains('\\') {
        return Err(invalid("keys must be relative and use '/' separators"));
    }
    for segment in key.split('/') {
        match segment {
            "" => return Err(invalid("empty path segment")),
            "." | ".." => return Err(invalid("relative path segment")),
            s if s.chars().any(char::is_control) => {
                return Err(invalid("control character in key"))
            }
            _ => {}
        }
    }
    Ok(())
}
