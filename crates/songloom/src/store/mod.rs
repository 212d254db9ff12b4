//! Domain-level stores on top of the raw repositories.

use chrono::{DateTime, SecondsFormat, Utc};

mod job_store;
mod song_store;

pub use job_store::JobStore;
pub use song_store::{NewSong, Song, SongStore};

/// Fixed-width UTC timestamps so text ordering matches time ordering.
fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn now() -> String {
    format_timestamp(Utc::now())
}

fn parse_timestamp(s: &str, id: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|e| {
            log::warn!("Unparsable timestamp '{}' on row {}: {}", s, id, e);
            DateTime::<Utc>::UNIX_EPOCH
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_sort_as_text() {
        let earlier = format_timestamp(DateTime::<Utc>::UNIX_EPOCH);
        let later = now();
        assert!(earlier < later);
        assert!(earlier.ends_with('Z'));
    }

    #[test]
    fn test_parse_timestamp_falls_back_to_epoch() {
        assert_eq!(parse_timestamp("garbage", "x"), DateTime::<Utc>::UNIX_EPOCH);
        let ts = "2026-03-01T10:00:00.000000Z";
        assert_eq!(format_timestamp(parse_timestamp(ts, "x")), ts);
    }
}
