//! The job state machine.
//!
//! Jobs only move forward when somebody polls. The first poll that sees a
//! job succeed copies every produced asset into owned storage and records
//! one song per asset. That pass runs exactly once per job: pollers of the
//! same job are serialized by [`JobLocks`], and the status change itself is
//! a conditional update that only one writer can win, which also covers
//! pollers in other processes sharing the database.

use std::sync::Arc;

use bytes::Bytes;
use chrono::Utc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use super::assets::{
    audio_extension, is_supported_audio_upload, mime_for_extension, upload_extension,
};
use super::job::{GenerationJob, GenerationResult, JobStatus, JobView, SubmittedJob};
use super::locks::JobLocks;
use super::params::GenerationParams;
use crate::client::{ClientError, GenerationClient};
use crate::error::{GenerationError, StorageError};
use crate::sanitize::{redact_url, short_id};
use crate::storage::{StorageProvider, StoredObject};
use crate::store::{JobStore, NewSong, SongStore};

/// Jobs returned by [`Orchestrator::history`].
pub const HISTORY_LIMIT: u32 = 50;
/// Song duration when neither the result nor the request has one.
pub const DEFAULT_SONG_DURATION_SECS: f64 = 120.0;
/// Stored when the service reports a failure without saying why.
pub const DEFAULT_FAILURE_MESSAGE: &str = "Generation failed";

/// A reference or source audio file sent by the user.
#[derive(Debug, Clone)]
pub struct ReferenceUpload {
    pub filename: Option<String>,
    pub mime_type: Option<String>,
    pub bytes: Bytes,
}

#[derive(Debug, thiserror::Error)]
enum AssetCopyError {
    #[error(transparent)]
    Download(#[from] ClientError),
    #[error(transparent)]
    Store(#[from] StorageError),
}

pub struct Orchestrator {
    jobs: JobStore,
    songs: SongStore,
    client: Arc<dyn GenerationClient>,
    storage: Arc<dyn StorageProvider>,
    locks: JobLocks,
}

impl Orchestrator {
    pub fn new(
        jobs: JobStore,
        songs: SongStore,
        client: Arc<dyn GenerationClient>,
        storage: Arc<dyn StorageProvider>,
    ) -> Self {
        Self {
            jobs,
            songs,
            client,
            storage,
            locks: JobLocks::new(),
        }
    }

    pub fn jobs(&self) -> &JobStore {
        &self.jobs
    }

    pub fn songs(&self) -> &SongStore {
        &self.songs
    }

    pub fn client(&self) -> &Arc<dyn GenerationClient> {
        &self.client
    }

    /// Records a new job and hands it to the generation service.
    ///
    /// If the service refuses, the job stays `queued` without a remote task
    /// and the error is returned to the caller.
    pub async fn submit(
        &self,
        user_id: &str,
        params: GenerationParams,
    ) -> Result<SubmittedJob, GenerationError> {
        params.validate()?;
        let job = self.jobs.create(user_id, &params)?;
        let span = info_span!("submit", job_id = %short_id(&job.id), user_id = %user_id);

        async {
            let receipt = self.client.submit(&params).await.map_err(|e| {
                warn!(error = %e, "Generation service refused the job");
                GenerationError::Submission(e)
            })?;

            if !self.jobs.attach_remote_task(&job.id, &receipt.task_id)? {
                warn!(task_id = %receipt.task_id, "Job already bound to a remote task");
            }
            info!(task_id = %receipt.task_id, "Generation task submitted");

            Ok::<_, GenerationError>(SubmittedJob {
                job_id: job.id.clone(),
                status: JobStatus::Queued,
                queue_position: 1,
            })
        }
        .instrument(span)
        .await
    }

    /// Reports the job's progress, advancing it if the service moved on.
    pub async fn poll_status(
        &self,
        job_id: &str,
        user_id: &str,
    ) -> Result<JobView, GenerationError> {
        let job = self.load_owned(job_id, user_id)?;
        if job.status.is_terminal() || job.remote_task_id.is_none() {
            return Ok(JobView::stored(&job));
        }

        let _guard = self.locks.acquire(job_id).await;

        // Re-read: whoever held the lock before us may have finished the job.
        let job = self.load_owned(job_id, user_id)?;
        let task_id = match &job.remote_task_id {
            Some(task_id) if !job.status.is_terminal() => task_id.clone(),
            _ => return Ok(JobView::stored(&job)),
        };

        let span = info_span!("poll", job_id = %short_id(job_id), task_id = %task_id);
        self.advance(job, &task_id).instrument(span).await
    }

    async fn advance(
        &self,
        job: GenerationJob,
        task_id: &str,
    ) -> Result<JobView, GenerationError> {
        let remote = match self.client.query_status(task_id).await {
            Ok(remote) => remote,
            Err(e @ ClientError::Decode(_)) => {
                tracing::error!(
                    error = %e,
                    "Unreadable status payload, returning last known state"
                );
                return Ok(JobView::stored(&job));
            }
            Err(e) => {
                warn!(error = %e, "Status query failed, returning last known state");
                return Ok(JobView::stored(&job));
            }
        };

        let mut view = JobView {
            job_id: job.id.clone(),
            status: remote.status,
            queue_position: remote.queue_position,
            eta_seconds: remote.eta_seconds,
            result: None,
            error: None,
        };
        if remote.status == job.status {
            return Ok(view);
        }

        match remote.status {
            JobStatus::Succeeded => {
                let result = remote.result.unwrap_or_default();
                if !self.jobs.record_transition(
                    &job.id,
                    job.status,
                    JobStatus::Succeeded,
                    Some(&result),
                    None,
                )? {
                    return self.current_view(&job.id);
                }
                info!(assets = result.audio_urls.len(), "Job succeeded");
                view.result = Some(self.materialize(&job, task_id, result).await?);
            }
            JobStatus::Failed => {
                let error = remote
                    .error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_FAILURE_MESSAGE.to_string());
                if !self.jobs.record_transition(
                    &job.id,
                    job.status,
                    JobStatus::Failed,
                    None,
                    Some(&error),
                )? {
                    return self.current_view(&job.id);
                }
                warn!(error = %error, "Job failed");
                view.error = Some(error);
            }
            status => {
                if !self
                    .jobs
                    .record_transition(&job.id, job.status, status, None, None)?
                {
                    return self.current_view(&job.id);
                }
                debug!(from = %job.status, to = %status, "Job progressed");
            }
        }

        Ok(view)
    }

    /// Turns the produced assets into songs, in result order.
    async fn materialize(
        &self,
        job: &GenerationJob,
        task_id: &str,
        mut result: GenerationResult,
    ) -> Result<GenerationResult, GenerationError> {
        let assets: Vec<(String, String)> = result
            .audio_urls
            .iter()
            .filter_map(|url| audio_extension(url).map(|ext| (url.clone(), ext)))
            .collect();
        let ignored = result.audio_urls.len() - assets.len();
        if ignored > 0 {
            debug!(ignored, "Skipping non-audio result entries");
        }

        let title = job.params.song_title();
        let variations = assets.len();
        let mut locations = Vec::with_capacity(variations);

        for (index, (url, ext)) in assets.into_iter().enumerate() {
            let song_id = Uuid::new_v4().to_string();
            let key = format!("{}/{}.{}", job.user_id, song_id, ext);

            let location = match self.copy_asset(&url, &key, &ext).await {
                Ok(stored) => stored.url,
                Err(e) => {
                    warn!(asset = %redact_url(&url), error = %e, "Keeping remote asset location");
                    url
                }
            };

            let song_title = if variations > 1 {
                format!("{} (v{})", title, index + 1)
            } else {
                title.to_string()
            };
            self.songs
                .insert(song_from_job(job, &result, song_id, song_title, location.clone()))?;
            locations.push(location);
        }

        result.audio_urls = locations;
        self.jobs.rewrite_result(&job.id, &result)?;
        info!(songs = variations, "Job materialized");

        if let Err(e) = self.client.release(task_id).await {
            warn!(error = %e, "Failed to release remote task");
        }

        Ok(result)
    }

    async fn copy_asset(
        &self,
        url: &str,
        key: &str,
        ext: &str,
    ) -> Result<StoredObject, AssetCopyError> {
        let bytes = self.client.fetch_asset_bytes(url).await?;
        let stored = self
            .storage
            .upload(key, bytes, &mime_for_extension(ext))
            .await?;
        Ok(stored)
    }

    /// The caller's most recent jobs, newest first.
    pub fn history(&self, user_id: &str) -> Result<Vec<GenerationJob>, GenerationError> {
        Ok(self.jobs.history(user_id, HISTORY_LIMIT)?)
    }

    /// Stores a reference audio file for later use as `referenceAudioUrl`.
    pub async fn upload_reference(
        &self,
        user_id: &str,
        upload: ReferenceUpload,
    ) -> Result<StoredObject, GenerationError> {
        let filename = upload.filename.as_deref();
        let mime_type = upload.mime_type.as_deref();

        if upload.bytes.is_empty() {
            return Err(GenerationError::Validation("Audio file is empty".to_string()));
        }
        if !is_supported_audio_upload(filename, mime_type) {
            return Err(GenerationError::Validation(
                "Invalid file type. Only audio files are allowed.".to_string(),
            ));
        }

        let ext = upload_extension(filename, mime_type);
        let key = format!(
            "references/{}/{}-{}{}",
            user_id,
            Utc::now().timestamp_millis(),
            Uuid::new_v4(),
            ext
        );
        let mime = mime_type
            .map(str::to_string)
            .unwrap_or_else(|| mime_for_extension(ext.trim_start_matches('.')));

        let stored = self.storage.upload(&key, upload.bytes, &mime).await?;
        info!(key = %stored.key, "Reference audio stored");
        Ok(stored)
    }

    fn load_owned(&self, job_id: &str, user_id: &str) -> Result<GenerationJob, GenerationError> {
        let job = self
            .jobs
            .get(job_id)?
            .ok_or_else(|| GenerationError::NotFound(job_id.to_string()))?;
        if job.user_id != user_id {
            return Err(GenerationError::Forbidden);
        }
        Ok(job)
    }

    fn current_view(&self, job_id: &str) -> Result<JobView, GenerationError> {
        let job = self
            .jobs
            .get(job_id)?
            .ok_or_else(|| GenerationError::NotFound(job_id.to_string()))?;
        Ok(JobView::stored(&job))
    }
}

/// Song metadata prefers what the service reported, then what was asked for.
fn song_from_job(
    job: &GenerationJob,
    result: &GenerationResult,
    id: String,
    title: String,
    audio_url: String,
) -> NewSong {
    let params = &job.params;
    let reported = |value: &Option<String>| value.clone().filter(|v| !v.trim().is_empty());

    NewSong {
        id,
        user_id: job.user_id.clone(),
        job_id: Some(job.id.clone()),
        title,
        lyrics: params.song_lyrics().to_string(),
        style: params.song_style().to_string(),
        caption: params.song_style().to_string(),
        audio_url,
        duration: result
            .duration
            .filter(|d| *d > 0.0)
            .or_else(|| params.requested_duration())
            .unwrap_or(DEFAULT_SONG_DURATION_SECS),
        bpm: result
            .bpm
            .filter(|b| *b > 0)
            .or_else(|| params.requested_bpm()),
        key_scale: reported(&result.key_scale)
            .or_else(|| params.requested_key_scale().map(str::to_string)),
        time_signature: reported(&result.time_signature)
            .or_else(|| params.requested_time_signature().map(str::to_string)),
        generation_params: Some(params.clone()),
    }
}
