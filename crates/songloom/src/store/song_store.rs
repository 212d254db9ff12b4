use chrono::{DateTime, Utc};
use serde::Serialize;

use super::{now, parse_timestamp};
use crate::db::song_repo::{self, SongRow};
use crate::db::{Database, DatabaseError};
use crate::generation::GenerationParams;

/// A materialized song, one per audio variation of a job.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    pub id: String,
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub title: String,
    pub lyrics: String,
    pub style: String,
    pub caption: String,
    pub audio_url: String,
    pub duration: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bpm: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_scale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_signature: Option<String>,
    pub tags: Vec<String>,
    pub is_public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_params: Option<GenerationParams>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied at materialization time. Tags start empty and the song
/// starts public.
#[derive(Debug, Clone)]
pub struct NewSong {
    pub id: String,
    pub user_id: String,
    pub job_id: Option<String>,
    pub title: String,
    pub lyrics: String,
    pub style: String,
    pub caption: String,
    pub audio_url: String,
    pub duration: f64,
    pub bpm: Option<u32>,
    pub key_scale: Option<String>,
    pub time_signature: Option<String>,
    pub generation_params: Option<GenerationParams>,
}

fn json_error(column: &'static str, id: &str, source: serde_json::Error) -> DatabaseError {
    DatabaseError::Json {
        table: "songs",
        column,
        id: id.to_string(),
        source,
    }
}

fn from_row(row: SongRow) -> Result<Song, DatabaseError> {
    let tags: Vec<String> =
        serde_json::from_str(&row.tags).map_err(|e| json_error("tags", &row.id, e))?;
    let generation_params: Option<GenerationParams> = row
        .generation_params
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| json_error("generation_params", &row.id, e))?;

    Ok(Song {
        created_at: parse_timestamp(&row.created_at, &row.id),
        updated_at: parse_timestamp(&row.updated_at, &row.id),
        id: row.id,
        user_id: row.user_id,
        job_id: row.job_id,
        title: row.title,
        lyrics: row.lyrics,
        style: row.style,
        caption: row.caption,
        audio_url: row.audio_url,
        duration: row.duration,
        bpm: row.bpm,
        key_scale: row.key_scale,
        time_signature: row.time_signature,
        tags,
        is_public: row.is_public,
        generation_params,
    })
}

#[derive(Clone)]
pub struct SongStore {
    db: Database,
}

impl SongStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn insert(&self, song: NewSong) -> Result<Song, DatabaseError> {
        let timestamp = now();
        let generation_params = song
            .generation_params
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| json_error("generation_params", &song.id, e))?;

        let row = SongRow {
            id: song.id,
            user_id: song.user_id,
            job_id: song.job_id,
            title: song.title,
            lyrics: song.lyrics,
            style: song.style,
            caption: song.caption,
            audio_url: song.audio_url,
            duration: song.duration,
            bpm: song.bpm,
            key_scale: song.key_scale,
            time_signature: song.time_signature,
            tags: "[]".to_string(),
            is_public: true,
            generation_params,
            created_at: timestamp.clone(),
            updated_at: timestamp,
        };
        song_repo::insert(&self.db, &row)?;
        from_row(row)
    }

    /// Songs produced by one job, in variation order.
    pub fn list_for_job(&self, job_id: &str) -> Result<Vec<Song>, DatabaseError> {
        song_repo::list_by_job(&self.db, job_id)?
            .into_iter()
            .map(from_row)
            .collect()
    }
}
