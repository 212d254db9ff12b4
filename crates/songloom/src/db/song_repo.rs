//! Song repository: row-level access to the `songs` table.

use rusqlite::{params, Row};

use super::{Database, DatabaseError};

#[derive(Debug, Clone, PartialEq)]
pub struct SongRow {
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
    /// JSON array of tag strings.
    pub tags: String,
    pub is_public: bool,
    pub generation_params: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl SongRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            job_id: row.get("job_id")?,
            title: row.get("title")?,
            lyrics: row.get("lyrics")?,
            style: row.get("style")?,
            caption: row.get("caption")?,
            audio_url: row.get("audio_url")?,
            duration: row.get("duration")?,
            bpm: row.get("bpm")?,
            key_scale: row.get("key_scale")?,
            time_signature: row.get("time_signature")?,
            tags: row.get("tags")?,
            is_public: row.get("is_public")?,
            generation_params: row.get("generation_params")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

pub fn insert(db: &Database, song: &SongRow) -> Result<(), DatabaseError> {
    db.with_conn(|conn| {
        conn.execute(
            "INSERT INTO songs (id, user_id, job_id, title, lyrics, style, caption, audio_url,
             duration, bpm, key_scale, time_signature, tags, is_public, generation_params,
             created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
            params![
                song.id,
                song.user_id,
                song.job_id,
                song.title,
                song.lyrics,
                song.style,
                song.caption,
                song.audio_url,
                song.duration,
                song.bpm,
                song.key_scale,
                song.time_signature,
                song.tags,
                song.is_public,
                song.generation_params,
                song.created_at,
                song.updated_at,
            ],
        )?;
        Ok(())
    })
}

/// Songs materialized from one job, in insertion order.
pub fn list_by_job(db: &Database, job_id: &str) -> Result<Vec<SongRow>, DatabaseError> {
    db.with_conn(|conn| {
        let mut stmt =
            conn.prepare("SELECT * FROM songs WHERE job_id = ?1 ORDER BY rowid ASC")?;
        let rows = stmt
            .query_map(params![job_id], SongRow::from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    })
}
