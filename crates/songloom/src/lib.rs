pub mod assist;
pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod generation;
pub mod logging;
pub mod sanitize;
pub mod secrets;
pub mod storage;
pub mod store;

pub use assist::{CaptionFormatter, LyricsWriter, OllamaLyricsWriter, ScriptCaptionFormatter};
pub use client::{GenerationClient, HttpGenerationClient};
pub use config::{load_config, load_config_from_str, Config};
pub use db::Database;
pub use error::{ConfigError, GenerationError, Result, SongloomError, StorageError};
pub use generation::{
    GenerationJob, GenerationParams, GenerationResult, JobStatus, JobView, Orchestrator,
};
pub use secrets::{SecretError, SecretSource};
pub use storage::{FileStorage, ObjectStorage, StorageProvider, StoredObject};
pub use store::{JobStore, SongStore};
