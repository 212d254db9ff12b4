use std::path::PathBuf;
use thiserror::Error;

use crate::assist::AssistError;
use crate::client::ClientError;
use crate::db::DatabaseError;
use crate::secrets::SecretError;

#[derive(Error, Debug)]
pub enum SongloomError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Generation error: {0}")]
    Generation(#[from] GenerationError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Generation service error: {0}")]
    Client(#[from] ClientError),

    #[error("Assist error: {0}")]
    Assist(#[from] AssistError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },

    #[error("Schema validation failed: {errors}")]
    SchemaValidation { errors: String },

    #[error("Failed to resolve secret for '{field}': {source}")]
    Secret {
        field: String,
        #[source]
        source: SecretError,
    },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Invalid storage key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Failed to create directory '{path}': {source}")]
    CreateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("File already exists: {0}")]
    FileExists(PathBuf),

    #[error("Object store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Object store rejected '{key}' with status {status}")]
    Rejected { key: String, status: u16 },
}

/// Failures surfaced by the job orchestrator.
///
/// Validation, NotFound and Forbidden are caller mistakes; the rest are
/// infrastructure failures.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("{0}")]
    Validation(String),

    #[error("Failed to submit generation task: {0}")]
    Submission(#[source] ClientError),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job belongs to another user")]
    Forbidden,

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

pub type Result<T> = std::result::Result<T, SongloomError>;
