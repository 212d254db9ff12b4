//! Client side of the external generation service.
//!
//! The orchestrator only sees [`GenerationClient`]; the HTTP implementation
//! lives in [`http`].

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;

use crate::generation::{GenerationParams, GenerationResult, JobStatus};

mod error;
pub mod http;

pub use error::ClientError;
pub use http::{HttpClientOptions, HttpGenerationClient};

/// Acknowledgement of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub task_id: String,
}

/// Remote view of a task.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteStatus {
    pub status: JobStatus,
    pub queue_position: Option<u32>,
    pub eta_seconds: Option<f64>,
    pub result: Option<GenerationResult>,
    pub error: Option<String>,
}

impl RemoteStatus {
    /// A bare status with no queue information or payload.
    pub fn of(status: JobStatus) -> Self {
        Self {
            status,
            queue_position: None,
            eta_seconds: None,
            result: None,
            error: None,
        }
    }
}

/// A streamed asset response, forwarded as-is by the audio proxy.
pub struct AssetStream {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: BoxStream<'static, Result<Bytes, ClientError>>,
}

impl std::fmt::Debug for AssetStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetStream")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("content_length", &self.content_length)
            .finish_non_exhaustive()
    }
}

#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Hands a parameter set to the service.
    async fn submit(&self, params: &GenerationParams) -> Result<SubmitReceipt, ClientError>;

    async fn query_status(&self, task_id: &str) -> Result<RemoteStatus, ClientError>;

    /// Downloads a produced asset into memory.
    async fn fetch_asset_bytes(&self, url: &str) -> Result<Bytes, ClientError>;

    /// Opens a streaming read of an asset hosted by the service.
    async fn open_asset_stream(&self, path: &str) -> Result<AssetStream, ClientError>;

    /// Tells the service a consumed task may be dropped.
    async fn release(&self, task_id: &str) -> Result<(), ClientError>;

    /// Last raw status body seen for a task, if the client keeps them.
    fn raw_response(&self, _task_id: &str) -> Option<serde_json::Value> {
        None
    }

    async fn discover_endpoints(&self) -> Result<Vec<String>, ClientError>;

    async fn check_health(&self) -> Result<bool, ClientError>;
}
