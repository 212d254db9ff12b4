//! Test harness for isolated orchestrator runs.
//!
//! Every harness owns a temporary storage root, an in-memory database and a
//! `ScriptedClient` standing in for the generation service.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tempfile::TempDir;

use songloom::client::{AssetStream, ClientError, RemoteStatus, SubmitReceipt};
use songloom::generation::{GenerationJob, GenerationParams, JobStatus};
use songloom::store::Song;
use songloom::{
    Database, FileStorage, GenerationClient, JobStore, Orchestrator, SongStore, StorageError,
    StorageProvider, StoredObject,
};

/// A generation service that replays scripted status sequences.
///
/// Task ids are handed out as `task-1`, `task-2`, ... in submission order.
/// Each task walks through its script one status per query and then keeps
/// reporting the last one. Unscripted tasks stay running.
#[derive(Default)]
pub struct ScriptedClient {
    scripts: Mutex<HashMap<String, VecDeque<RemoteStatus>>>,
    failing_assets: Mutex<HashSet<String>>,
    reject_submissions: AtomicBool,
    fail_status_queries: AtomicBool,
    query_delay: Mutex<Option<Duration>>,
    next_task: AtomicUsize,
    pub submitted: Mutex<Vec<GenerationParams>>,
    pub status_queries: AtomicUsize,
    pub fetches: AtomicUsize,
    pub released: Mutex<Vec<String>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, task_id: &str, statuses: Vec<RemoteStatus>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(task_id.to_string(), statuses.into());
    }

    pub fn fail_asset(&self, url: &str) {
        self.failing_assets.lock().unwrap().insert(url.to_string());
    }

    pub fn reject_submissions(&self) {
        self.reject_submissions.store(true, Ordering::SeqCst);
    }

    pub fn fail_status_queries(&self, fail: bool) {
        self.fail_status_queries.store(fail, Ordering::SeqCst);
    }

    /// Makes every status query take a while, so concurrent pollers overlap.
    pub fn delay_queries(&self, delay: Duration) {
        *self.query_delay.lock().unwrap() = Some(delay);
    }

    pub fn status_query_count(&self) -> usize {
        self.status_queries.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn released_tasks(&self) -> Vec<String> {
        self.released.lock().unwrap().clone()
    }

    fn next_status(&self, task_id: &str) -> RemoteStatus {
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(task_id) {
            Some(script) if script.len() > 1 => script.pop_front().unwrap(),
            Some(script) if !script.is_empty() => script[0].clone(),
            _ => RemoteStatus::of(JobStatus::Running),
        }
    }
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn submit(&self, params: &GenerationParams) -> Result<SubmitReceipt, ClientError> {
        if self.reject_submissions.load(Ordering::SeqCst) {
            return Err(ClientError::Rejected {
                status: 503,
                body: "model not loaded".to_string(),
            });
        }
        self.submitted.lock().unwrap().push(params.clone());
        let n = self.next_task.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(SubmitReceipt {
            task_id: format!("task-{}", n),
        })
    }

    async fn query_status(&self, task_id: &str) -> Result<RemoteStatus, ClientError> {
        self.status_queries.fetch_add(1, Ordering::SeqCst);
        let delay = *self.query_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_status_queries.load(Ordering::SeqCst) {
            return Err(ClientError::Decode("connection reset".to_string()));
        }
        Ok(self.next_status(task_id))
    }

    async fn fetch_asset_bytes(&self, url: &str) -> Result<Bytes, ClientError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing_assets.lock().unwrap().contains(url) {
            return Err(ClientError::Download {
                url: url.to_string(),
                reason: "HTTP 404".to_string(),
            });
        }
        Ok(Bytes::from(format!("audio from {}", url)))
    }

    async fn open_asset_stream(&self, path: &str) -> Result<AssetStream, ClientError> {
        Err(ClientError::InvalidUrl {
            url: path.to_string(),
            reason: "not supported by the scripted client".to_string(),
        })
    }

    async fn release(&self, task_id: &str) -> Result<(), ClientError> {
        self.released.lock().unwrap().push(task_id.to_string());
        Ok(())
    }

    async fn discover_endpoints(&self) -> Result<Vec<String>, ClientError> {
        Ok(vec!["POST /release_task".to_string()])
    }

    async fn check_health(&self) -> Result<bool, ClientError> {
        Ok(true)
    }
}

/// Storage that refuses every upload.
pub struct FailingStorage;

#[async_trait]
impl StorageProvider for FailingStorage {
    async fn upload(
        &self,
        key: &str,
        _bytes: Bytes,
        _mime_type: &str,
    ) -> Result<StoredObject, StorageError> {
        Err(StorageError::Rejected {
            key: key.to_string(),
            status: 507,
        })
    }
}

/// Test harness providing an isolated orchestrator.
pub struct TestHarness {
    /// Holds the storage root alive for the harness' lifetime.
    temp_dir: TempDir,
    pub storage_root: PathBuf,
    pub db: Database,
    pub client: Arc<ScriptedClient>,
    pub storage: Arc<dyn StorageProvider>,
    pub orchestrator: Orchestrator,
}

impl TestHarness {
    /// Local file storage under a fresh temp directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let storage_root = temp_dir.path().join("audio");
        let storage: Arc<dyn StorageProvider> = Arc::new(FileStorage::new(&storage_root));
        Self::build(temp_dir, storage_root, storage)
    }

    pub fn with_storage(storage: Arc<dyn StorageProvider>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let storage_root = temp_dir.path().join("audio");
        Self::build(temp_dir, storage_root, storage)
    }

    fn build(temp_dir: TempDir, storage_root: PathBuf, storage: Arc<dyn StorageProvider>) -> Self {
        let db = Database::open_in_memory().expect("Failed to open database");
        let client = Arc::new(ScriptedClient::new());
        let orchestrator = Orchestrator::new(
            JobStore::new(db.clone()),
            SongStore::new(db.clone()),
            client.clone(),
            storage.clone(),
        );
        Self {
            temp_dir,
            storage_root,
            db,
            client,
            storage,
            orchestrator,
        }
    }

    /// Another orchestrator over the same database, client and storage but
    /// with its own locks, like a second server process.
    pub fn second_orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            JobStore::new(self.db.clone()),
            SongStore::new(self.db.clone()),
            self.client.clone(),
            self.storage.clone(),
        )
    }

    pub fn job(&self, job_id: &str) -> GenerationJob {
        JobStore::new(self.db.clone())
            .get(job_id)
            .expect("Failed to read job")
            .expect("Job missing")
    }

    pub fn songs_for_job(&self, job_id: &str) -> Vec<Song> {
        SongStore::new(self.db.clone())
            .list_for_job(job_id)
            .expect("Failed to read songs")
    }

    pub fn song_count(&self, user_id: &str) -> usize {
        JobStore::new(self.db.clone())
            .history(user_id, u32::MAX)
            .expect("Failed to list jobs")
            .iter()
            .map(|job| self.songs_for_job(&job.id).len())
            .sum()
    }

    /// Resolves a `/audio/...` URL to the file it was written to.
    pub fn stored_file(&self, url: &str) -> PathBuf {
        let key = url.trim_start_matches("/audio/");
        self.storage_root.join(key)
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }
}
