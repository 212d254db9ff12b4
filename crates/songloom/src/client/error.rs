use thiserror::Error;

/// Errors talking to the external generation service.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Generation service request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Generation service returned {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Unexpected response from generation service: {0}")]
    Decode(String),

    #[error("Failed to download '{url}': {reason}")]
    Download { url: String, reason: String },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}
