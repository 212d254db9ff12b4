use std::sync::Arc;

use super::{FileStorage, ObjectStorage, StorageProvider};
use crate::config::{StorageBackend, StorageConfig};
use crate::error::{ConfigError, SongloomError};

/// Builds the configured storage backend.
pub fn from_config(config: &StorageConfig) -> Result<Arc<dyn StorageProvider>, SongloomError> {
    match config.backend {
        StorageBackend::Local => {
            let root = crate::secrets::expand_home(&config.root);
            log::info!("Using local audio storage at {}", root.display());
            Ok(Arc::new(FileStorage::with_public_prefix(
                root,
                &config.public_prefix,
            )))
        }
        StorageBackend::Object => {
            let required = |field: &str, value: &Option<String>| {
                value.clone().ok_or_else(|| ConfigError::Validation {
                    message: format!("storage.{} is required for the object backend", field),
                })
            };
            let endpoint = required("endpoint", &config.endpoint)?;
            let bucket = required("bucket", &config.bucket)?;
            let public_base_url = required("publicBaseUrl", &config.public_base_url)?;
            let token = config
                .token_source()
                .resolve_optional()
                .map_err(|source| ConfigError::Secret {
                    field: "storage.token".to_string(),
                    source,
                })?;

            log::info!("Using object storage bucket '{}' at {}", bucket, endpoint);
            Ok(Arc::new(ObjectStorage::new(
                &endpoint,
                &bucket,
                &public_base_url,
                token,
            )?))
        }
    }
}
