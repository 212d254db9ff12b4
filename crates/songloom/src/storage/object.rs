//! S3-compatible object storage over plain HTTP `PUT`.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, Client};
use secrecy::{ExposeSecret, SecretString};

use super::{validate_key, StorageProvider, StoredObject};
use crate::error::StorageError;

const UPLOAD_TIMEOUT: Duration = Duration::from_secs(120);

pub struct ObjectStorage {
    http: Client,
    endpoint: String,
    bucket: String,
    public_base_url: String,
    token: Option<SecretString>,
}

impl ObjectStorage {
    pub fn new(
        endpoint: &str,
        bucket: &str,
        public_base_url: &str,
        token: Option<SecretString>,
    ) -> Result<Self, StorageError> {
        let http = Client::builder().timeout(UPLOAD_TIMEOUT).build()?;
        Ok(Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            bucket: bucket.trim_matches('/').to_string(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.endpoint, self.bucket, key)
    }
}

#[async_trait]
impl StorageProvider for ObjectStorage {
    async fn upload(
        &self,
        key: &str,
        bytes: Bytes,
        mime_type: &str,
    ) -> Result<StoredObject, StorageError> {
        validate_key(key)?;

        let mut request = self
            .http
            .put(self.object_url(key))
            .header(header::CONTENT_TYPE, mime_type)
            .body(bytes);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token.expose_secret());
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(StorageError::Rejected {
                key: key.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(StoredObject {
            key: key.to_string(),
            url: format!("{}/{}", self.public_base_url, key),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_bytes, header as header_is, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_put_object() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/songs/u1/s1.mp3"))
            .and(header_is("content-type", "audio/mpeg"))
            .and(header_is("authorization", "Bearer store-token"))
            .and(body_bytes(b"ID3".to_vec()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let storage = ObjectStorage::new(
            &format!("{}/", server.uri()),
            "songs",
            "https://cdn.example/songs/",
            Some(SecretString::from("store-token")),
        )
        .unwrap();

        let stored = storage
            .upload("u1/s1.mp3", Bytes::from_static(b"ID3"), "audio/mpeg")
            .await
            .unwrap();
        assert_eq!(stored.key, "u1/s1.mp3");
        assert_eq!(stored.url, "https://cdn.example/songs/u1/s1.mp3");
    }

    #[tokio::test]
    async fn test_rejected_put() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let storage = ObjectStorage::new(&server.uri(), "songs", "https://cdn.example", None).unwrap();
        let err = storage
            .upload("u1/s1.mp3", Bytes::from_static(b"x"), "audio/mpeg")
            .await
            .unwrap_err();

        assert!(matches!(err, StorageError::Rejected { status: 403, .. }));
    }
}
