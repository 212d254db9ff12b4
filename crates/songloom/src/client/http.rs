//! HTTP implementation of [`GenerationClient`].
//!
//! Task API:
//! - `POST   {base}/v1/tasks`          submit, answers `{ "taskId" }`
//! - `GET    {base}/v1/tasks/{taskId}` status
//! - `DELETE {base}/v1/tasks/{taskId}` release
//! - `GET    {base}/openapi.json`      endpoint discovery
//! - `GET    {base}/health`            liveness
//!
//! The last raw status body of each task is kept for debugging until the
//! task is released.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use moka::sync::Cache;
use reqwest::{header, Client, RequestBuilder, Response, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use super::{AssetStream, ClientError, GenerationClient, RemoteStatus, SubmitReceipt};
use crate::generation::lenient;
use crate::generation::{GenerationParams, GenerationResult, JobStatus};
use crate::sanitize::redact_url;

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;
/// Assets can be tens of megabytes on a slow link.
pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

const RAW_RESPONSE_CAPACITY: u64 = 512;
const RAW_RESPONSE_TTL_SECS: u64 = 6 * 60 * 60;

const HTTP_METHODS: &[&str] = &["get", "post", "put", "patch", "delete", "head", "options"];

#[derive(Debug)]
pub struct HttpClientOptions {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub download_timeout: Duration,
    pub api_token: Option<SecretString>,
}

impl Default for HttpClientOptions {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            download_timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
            api_token: None,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    #[serde(alias = "task_id", alias = "jobId")]
    task_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskStatusResponse {
    status: String,
    #[serde(
        default,
        alias = "queue_position",
        deserialize_with = "lenient::whole_number"
    )]
    queue_position: Option<u32>,
    #[serde(
        default,
        alias = "eta_seconds",
        deserialize_with = "lenient::real_number"
    )]
    eta_seconds: Option<f64>,
    #[serde(default)]
    result: Option<GenerationResult>,
    #[serde(default, deserialize_with = "lenient::text")]
    error: Option<String>,
}

pub struct HttpGenerationClient {
    http: Client,
    base: Url,
    request_timeout: Duration,
    download_timeout: Duration,
    api_token: Option<SecretString>,
    raw_responses: Cache<String, serde_json::Value>,
}

impl HttpGenerationClient {
    pub fn new(base_url: &str, options: HttpClientOptions) -> Result<Self, ClientError> {
        let mut base = Url::parse(base_url).map_err(|e| ClientError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;
        // Url::join drops the last segment unless the base ends with a slash.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        let http = Client::builder()
            .connect_timeout(options.connect_timeout)
            .user_agent(concat!("songloom/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base,
            request_timeout: options.request_timeout,
            download_timeout: options.download_timeout,
            api_token: options.api_token,
            raw_responses: Cache::builder()
                .max_capacity(RAW_RESPONSE_CAPACITY)
                .time_to_live(Duration::from_secs(RAW_RESPONSE_TTL_SECS))
                .build(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::InvalidUrl {
                url: path.to_string(),
                reason: e.to_string(),
            })
    }

    fn task_url(&self, task_id: &str) -> Result<Url, ClientError> {
        let mut url = self.endpoint("v1/tasks")?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl {
                url: self.base.to_string(),
                reason: "base URL cannot carry a path".to_string(),
            })?
            .push(task_id);
        Ok(url)
    }

    /// Absolute URLs pass through; anything else is resolved against the base.
    fn resolve(&self, location: &str) -> Result<Url, ClientError> {
        self.base.join(location).map_err(|e| ClientError::InvalidUrl {
            url: redact_url(location),
            reason: e.to_string(),
        })
    }

    fn is_own_origin(&self, url: &Url) -> bool {
        url.origin() == self.base.origin()
    }

    /// Attaches the API token, but only for requests to the service itself.
    fn authorize(&self, url: &Url, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) if self.is_own_origin(url) => request.bearer_auth(token.expose_secret()),
            _ => request,
        }
    }

    async fn send_api(&self, url: Url, request: RequestBuilder) -> Result<Response, ClientError> {
        let response = self
            .authorize(&url, request)
            .timeout(self.request_timeout)
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Rejected { status, body });
        }
        Ok(response)
    }

    fn absolutize_result(&self, mut result: GenerationResult) -> GenerationResult {
        result.audio_urls = result
            .audio_urls
            .into_iter()
            .map(|location| match self.resolve(&location) {
                Ok(url) => url.to_string(),
                Err(e) => {
                    log::warn!("Keeping unresolvable asset location '{}': {}", location, e);
                    location
                }
            })
            .collect();
        result
    }
}

#[async_trait]
impl GenerationClient for HttpGenerationClient {
    async fn submit(&self, params: &GenerationParams) -> Result<SubmitReceipt, ClientError> {
        let url = self.endpoint("v1/tasks")?;
        let response = self
            .send_api(url.clone(), self.http.post(url).json(params))
            .await?;
        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        log::debug!("Submitted generation task {}", body.task_id);
        Ok(SubmitReceipt {
            task_id: body.task_id,
        })
    }

    async fn query_status(&self, task_id: &str) -> Result<RemoteStatus, ClientError> {
        let url = self.task_url(task_id)?;
        let response = self.send_api(url.clone(), self.http.get(url)).await?;
        let raw: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;
        self.raw_responses.insert(task_id.to_string(), raw.clone());
        let body: TaskStatusResponse =
            serde_json::from_value(raw).map_err(|e| ClientError::Decode(e.to_string()))?;

        Ok(RemoteStatus {
            status: JobStatus::parse(&body.status),
            queue_position: body.queue_position,
            eta_seconds: body.eta_seconds,
            result: body.result.map(|r| self.absolutize_result(r)),
            error: body.error,
        })
    }

    async fn fetch_asset_bytes(&self, url: &str) -> Result<Bytes, ClientError> {
        let target = self.resolve(url)?;
        let download_error = |reason: String| ClientError::Download {
            url: redact_url(url),
            reason,
        };

        let response = self
            .authorize(&target, self.http.get(target.clone()))
            .timeout(self.download_timeout)
            .send()
            .await
            .map_err(|e| download_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(download_error(format!("HTTP {}", response.status())));
        }
        response
            .bytes()
            .await
            .map_err(|e| download_error(e.to_string()))
    }

    async fn open_asset_stream(&self, path: &str) -> Result<AssetStream, ClientError> {
        let target = self.resolve(path)?;
        // The proxy is unauthenticated; never let it reach other hosts.
        if !self.is_own_origin(&target) {
            return Err(ClientError::InvalidUrl {
                url: redact_url(path),
                reason: "asset is not hosted by the generation service".to_string(),
            });
        }

        let response = self
            .authorize(&target, self.http.get(target.clone()))
            .send()
            .await?;
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(AssetStream {
            status: response.status().as_u16(),
            content_type,
            content_length: response.content_length(),
            body: response
                .bytes_stream()
                .map(|chunk| chunk.map_err(ClientError::from))
                .boxed(),
        })
    }

    async fn release(&self, task_id: &str) -> Result<(), ClientError> {
        self.raw_responses.invalidate(task_id);
        let url = self.task_url(task_id)?;
        self.send_api(url.clone(), self.http.delete(url)).await?;
        Ok(())
    }

    fn raw_response(&self, task_id: &str) -> Option<serde_json::Value> {
        self.raw_responses.get(task_id)
    }

    async fn discover_endpoints(&self) -> Result<Vec<String>, ClientError> {
        let url = self.endpoint("openapi.json")?;
        let response = self.send_api(url.clone(), self.http.get(url)).await?;
        let document: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))?;

        let paths = document
            .get("paths")
            .and_then(|p| p.as_object())
            .ok_or_else(|| ClientError::Decode("OpenAPI document has no paths".to_string()))?;

        let mut endpoints: Vec<String> = paths
            .iter()
            .flat_map(|(path, item)| {
                item.as_object()
                    .into_iter()
                    .flat_map(|ops| ops.keys())
                    .filter(|method| HTTP_METHODS.contains(&method.as_str()))
                    .map(move |method| format!("{} {}", method.to_uppercase(), path))
            })
            .collect();
        endpoints.sort();
        Ok(endpoints)
    }

    async fn check_health(&self) -> Result<bool, ClientError> {
        let url = self.endpoint("health")?;
        let response = self
            .authorize(&url, self.http.get(url.clone()))
            .timeout(self.request_timeout)
            .send()
            .await?;
        Ok(response.status().is_success())
    }
}
