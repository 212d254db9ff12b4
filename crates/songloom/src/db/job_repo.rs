//! Job repository: row-level access to the `generation_jobs` table.
//!
//! Status changes are conditional on the status the caller last observed,
//! so two writers racing on the same job cannot both win.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DatabaseError};

/// A raw job row. `params` and `result` hold JSON text.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRow {
    pub id: String,
    pub user_id: String,
    pub remote_task_id: Option<String>,
    pub status: String,
    pub params: String,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            remote_task_id: row.get("acestep_task_id")?,
            status: row.get("status")?,
            params: row.get("params")?,
            result: row.get("result")?,
            error: row.get("error")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// A status change guarded by the expected current status.
#[derive(Debug, Clone)]
pub struct StatusTransition<'a> {
    pub id: &'a str,
    pub from: &'a str,
    pub to: &'a str,
    /// Replaces the stored result when set.
    pub result: Option<&'a str>,
    /// Replaces the stored error when set.
    pub error: Option<&'a str>,
    pub updated_at: &'a str,
}

pub fn insert(db: &Database, job: &JobRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO generation_jobs (id, user_id, acestep_task_id, status, params, result,
             error, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                job.id,
                job.user_id,
                job.remote_task_id,
                job.status,
                job.params,
                job.result,
                job.error,
                job.created_at,
                job.updated_at,
            ],
        )?;
        Ok(())
    })
}

pub fn find_by_id(db: &Database, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let row = conn
            .query_row(
                "SELECT * FROM generation_jobs WHERE id = ?1",
                params![id],
                JobRow::from_row,
            )
            .optional()?;
        Ok(row)
    })
}

/// Records the remote task id and the status reported at submission.
///
/// Returns `false` when the job already carries a task id.
pub fn attach_remote_task(
    db: &Database,
    id: &str,
    task_id: &str,
    status: &str,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE generation_jobs SET acestep_task_id = ?2, status = ?3, updated_at = ?4
             WHERE id = ?1 AND acestep_task_id IS NULL",
            params![id, task_id, status, updated_at],
        )?;
        Ok(changed == 1)
    })
}

/// Applies `transition` only if the row is still in `transition.from`.
///
/// Returns `true` when this call performed the change.
pub fn transition(db: &Database, transition: &StatusTransition<'_>) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE generation_jobs
             SET status = ?3,
                 result = COALESCE(?4, result),
                 error = COALESCE(?5, error),
                 updated_at = ?6
             WHERE id = ?1 AND status = ?2",
            params![
                transition.id,
                transition.from,
                transition.to,
                transition.result,
                transition.error,
                transition.updated_at,
            ],
        )?;
        Ok(changed == 1)
    })
}

/// Overwrites the result of a succeeded job.
pub fn update_result(
    db: &Database,
    id: &str,
    result: &str,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    db.with_conn(|conn| {
        let changed = conn.execute(
            "UPDATE generation_jobs SET result = ?2, updated_at = ?3
             WHERE id = ?1 AND status = 'succeeded'",
            params![id, result, updated_at],
        )?;
        Ok(changed == 1)
    })
}

/// A user's jobs, newest first.
pub fn list_by_user(db: &Database, user_id: &str, limit: u32) -> Result<Vec<JobRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt = conn.prepare(
            "SELECT * FROM generation_jobs WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
        )?;
        let rows = stmt
            .query_map(params![user_id, limit], JobRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}

pub fn count_by_status(db: &Database, status: &str) -> Result<u64, DatabaseError> {
    db.with_conn(|conn| {
        let count: u64 = conn.query_row(
            "SELECT COUNT(*) FROM generation_jobs WHERE status = ?1",
            params![status],
            |r| r.get(0),
        )?;
        Ok(count)
    })
}
