use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum AssistError {
    #[error("{0}")]
    Validation(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("failed to start helper: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("helper timed out after {0:?}")]
    Timeout(Duration),

    #[error("{0}")]
    Failed(String),

    #[error("failed to parse helper output: {0}")]
    Parse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
