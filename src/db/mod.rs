mod schema;
pub mod models;
pub mod sittings;
pub mod timeline;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;

pub use models::{
    BoundingBox, CropRect, Day, Event, NewPhoto, Photo, Session, SessionTags, Sitting,
    TagCategory,
};
pub use schema::{MIGRATIONS, SCHEMA};

use crate::clock::{Clock, SystemClock};

/// Storage format for every instant column. Fixed width, so `MAX()` and
/// `ORDER BY` on the text agree with chronological order.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).map(|dt| dt.and_utc())
}

/// Column reader for stored instants, surfacing bad text as a conversion error.
pub(crate) fn timestamp_column(
    row: &rusqlite::Row,
    idx: usize,
) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        parse_timestamp(&s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}

pub(crate) fn required_timestamp(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    timestamp_column(row, idx)?.ok_or(rusqlite::Error::InvalidColumnType(
        idx,
        "updated_at".to_string(),
        rusqlite::types::Type::Null,
    ))
}

/// The timeline store: one SQLite connection plus the clock that stamps
/// mutations.
pub struct Database {
    pub(crate) conn: Connection,
    clock: Arc<dyn Clock>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_clock(path, Arc::new(SystemClock))
    }

    pub fn open_with_clock(path: &Path, clock: Arc<dyn Clock>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("opening database at {}", path.display()))?;
        Ok(Self { conn, clock })
    }

    pub fn open_in_memory(clock: Arc<dyn Clock>) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn, clock })
    }

    pub fn initialize(&self) -> Result<()> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(SCHEMA)?;
        self.run_migrations()?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        for migration in MIGRATIONS {
            if let Err(e) = self.conn.execute(migration, []) {
                tracing::debug!("Skipping migration {:?}: {}", migration, e);
            }
        }
        Ok(())
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_timestamp_roundtrip_keeps_millis() {
        let ts = Utc.with_ymd_and_hms(2024, 6, 4, 15, 30, 1).unwrap()
            + chrono::Duration::milliseconds(250);
        let text = format_timestamp(&ts);
        assert_eq!(text, "2024-06-04T15:30:01.250Z");
        assert_eq!(parse_timestamp(&text).unwrap(), ts);
    }

    #[test]
    fn test_timestamp_text_orders_chronologically() {
        let a = Utc.with_ymd_and_hms(2024, 6, 4, 9, 59, 59).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 6, 4, 10, 0, 0).unwrap();
        assert!(format_timestamp(&a) < format_timestamp(&b));
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let (db, _clock) = testing::memory_db();
        db.initialize().unwrap();
        let fk: i64 = db
            .conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }
}
