use uuid::Uuid;

use super::{now, parse_timestamp};
use crate::db::job_repo::{self, JobRow, StatusTransition};
use crate::db::{Database, DatabaseError};
use crate::generation::{GenerationJob, GenerationParams, GenerationResult, JobStatus};

const TABLE: &str = "generation_jobs";

fn encode<T: serde::Serialize>(
    value: &T,
    column: &'static str,
    id: &str,
) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|source| DatabaseError::Json {
        table: TABLE,
        column,
        id: id.to_string(),
        source,
    })
}

fn decode<T: serde::de::DeserializeOwned>(
    raw: &str,
    column: &'static str,
    id: &str,
) -> Result<T, DatabaseError> {
    serde_json::from_str(raw).map_err(|source| DatabaseError::Json {
        table: TABLE,
        column,
        id: id.to_string(),
        source,
    })
}

fn from_row(row: JobRow) -> Result<GenerationJob, DatabaseError> {
    let params = decode(&row.params, "params", &row.id)?;
    let result = row
        .result
        .as_deref()
        .map(|raw| decode(raw, "result", &row.id))
        .transpose()?;

    Ok(GenerationJob {
        status: JobStatus::parse(&row.status),
        created_at: parse_timestamp(&row.created_at, &row.id),
        updated_at: parse_timestamp(&row.updated_at, &row.id),
        id: row.id,
        user_id: row.user_id,
        remote_task_id: row.remote_task_id,
        params,
        result,
        error: row.error,
    })
}

/// Persistent store of generation jobs.
#[derive(Clone)]
pub struct JobStore {
    db: Database,
}

impl JobStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Persists a new `queued` job with a fresh id.
    pub fn create(
        &self,
        user_id: &str,
        params: &GenerationParams,
    ) -> Result<GenerationJob, DatabaseError> {
        let id = Uuid::new_v4().to_string();
        let timestamp = now();
        let row = JobRow {
            params: encode(params, "params", &id)?,
            id,
            user_id: user_id.to_string(),
            remote_task_id: None,
            status: JobStatus::Queued.as_str().to_string(),
            result: None,
            error: None,
            created_at: timestamp.clone(),
            updated_at: timestamp,
        };
        job_repo::insert(&self.db, &row)?;
        from_row(row)
    }

    pub fn get(&self, job_id: &str) -> Result<Option<GenerationJob>, DatabaseError> {
        job_repo::find_by_id(&self.db, job_id)?
            .map(from_row)
            .transpose()
    }

    /// Binds the job to its remote task and marks it running.
    ///
    /// The task id is write-once; returns `false` if one was already set.
    pub fn attach_remote_task(&self, job_id: &str, task_id: &str) -> Result<bool, DatabaseError> {
        job_repo::attach_remote_task(
            &self.db,
            job_id,
            task_id,
            JobStatus::Running.as_str(),
            &now(),
        )
    }

    /// Moves the job from `from` to `to`, returning whether this caller
    /// won the transition.
    pub fn record_transition(
        &self,
        job_id: &str,
        from: JobStatus,
        to: JobStatus,
        result: Option<&GenerationResult>,
        error: Option<&str>,
    ) -> Result<bool, DatabaseError> {
        let result = result
            .map(|r| encode(r, "result", job_id))
            .transpose()?;
        let updated_at = now();
        job_repo::transition(
            &self.db,
            &StatusTransition {
                id: job_id,
                from: from.as_str(),
                to: to.as_str(),
                result: result.as_deref(),
                error,
                updated_at: &updated_at,
            },
        )
    }

    /// Replaces the stored result of a succeeded job.
    pub fn rewrite_result(
        &self,
        job_id: &str,
        result: &GenerationResult,
    ) -> Result<bool, DatabaseError> {
        let raw = encode(result, "result", job_id)?;
        job_repo::update_result(&self.db, job_id, &raw, &now())
    }

    /// The user's most recent jobs, newest first.
    pub fn history(&self, user_id: &str, limit: u32) -> Result<Vec<GenerationJob>, DatabaseError> {
        job_repo::list_by_user(&self.db, user_id, limit)?
            .into_iter()
            .map(from_row)
            .collect()
    }

    /// Number of jobs still waiting on the remote service.
    pub fn in_flight(&self) -> Result<u64, DatabaseError> {
        Ok(job_repo::count_by_status(&self.db, JobStatus::Queued.as_str())?
            + job_repo::count_by_status(&self.db, JobStatus::Running.as_str())?)
    }
}
