//! Shared application state handed to every handler.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};

use songloom::assist::{CaptionFormatter, LyricsWriter, OllamaLyricsWriter, ScriptCaptionFormatter};
use songloom::client::{GenerationClient, HttpClientOptions, HttpGenerationClient};
use songloom::config::{Config, StorageBackend};
use songloom::db::default_database_path;
use songloom::secrets::expand_home;
use songloom::{ConfigError, Database, JobStore, Orchestrator, SongStore};

use crate::auth::TokenTable;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    /// Same client the orchestrator uses; the proxy, discovery and health
    /// routes talk to it directly.
    pub client: Arc<dyn GenerationClient>,
    /// `None` when no formatting script is configured.
    pub formatter: Option<Arc<dyn CaptionFormatter>>,
    pub writer: Arc<dyn LyricsWriter>,
    pub tokens: Arc<TokenTable>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let db_path = match &config.database.path {
            Some(path) => expand_home(path),
            None => default_database_path().context("could not determine the home directory")?,
        };
        let db = Database::open(&db_path)
            .with_context(|| format!("failed to open database {}", db_path.display()))?;
        info!(path = %db_path.display(), "Database ready");

        let jobs = JobStore::new(db.clone());
        match jobs.in_flight() {
            Ok(0) => {}
            Ok(count) => info!(count, "Unfinished jobs will resume on their next poll"),
            Err(e) => warn!("Failed to count unfinished jobs: {}", e),
        }

        let generation = &config.generation;
        let api_token = generation
            .api_token_source()
            .resolve_optional()
            .map_err(|source| ConfigError::Secret {
                field: "generation.apiToken".to_string(),
                source,
            })?;
        let options = HttpClientOptions {
            connect_timeout: Duration::from_secs(generation.connect_timeout_secs),
            request_timeout: Duration::from_secs(generation.request_timeout_secs),
            download_timeout: Duration::from_secs(generation.download_timeout_secs),
            api_token,
        };
        let client: Arc<dyn GenerationClient> =
            Arc::new(HttpGenerationClient::new(&generation.base_url, options)?);

        let storage = songloom::storage::from_config(&config.storage)?;
        let orchestrator = Orchestrator::new(jobs, SongStore::new(db), client.clone(), storage);

        let formatter = ScriptCaptionFormatter::from_config(&config.assist)
            .map(|f| Arc::new(f) as Arc<dyn CaptionFormatter>);
        if formatter.is_none() {
            info!("No caption formatting script configured");
        }
        let writer = Arc::new(OllamaLyricsWriter::from_config(&config.assist)?);

        let tokens = TokenTable::from_users(&config.auth.users)?;
        if tokens.is_empty() {
            warn!("No API users configured; every authenticated route will answer 401");
        }

        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            client,
            formatter,
            writer,
            tokens: Arc::new(tokens),
            config: Arc::new(config),
        })
    }

    /// Directory served under the public prefix, for the local backend only.
    pub fn local_audio_root(&self) -> Option<(String, PathBuf)> {
        let storage = &self.config.storage;
        (storage.backend == StorageBackend::Local)
            .then(|| (storage.public_prefix.clone(), expand_home(&storage.root)))
    }
}
