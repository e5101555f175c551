//! Content-derived version token for cached views.
//!
//! Every mutation of a photo, session or day stamps `updated_at`, so the
//! newest stamp of each table is enough to tell whether anything a view
//! reads has changed.

use anyhow::Result;
use md5::{Digest, Md5};
use rusqlite::{Connection, OptionalExtension};

use crate::db::parse_timestamp;

/// Token returned when the store holds no rows at all.
pub const EMPTY_FINGERPRINT: &str = "empty";

const FINGERPRINT_LEN: usize = 12;

/// Tables whose rows feed the cached projections.
const TRACKED_TABLES: [&str; 3] = ["photos", "sessions", "days"];

/// Newest `updated_at` of `table` in whole seconds since the epoch.
fn latest_mutation(conn: &Connection, table: &str) -> Result<Option<i64>> {
    let sql = format!("SELECT MAX(updated_at) FROM {}", table);
    let latest: Option<String> = conn
        .query_row(&sql, [], |row| row.get(0))
        .optional()?
        .flatten();

    match latest {
        Some(text) => Ok(Some(parse_timestamp(&text)?.timestamp())),
        None => Ok(None),
    }
}

pub fn fingerprint(conn: &Connection) -> Result<String> {
    let mut stamps = Vec::with_capacity(TRACKED_TABLES.len());
    for table in TRACKED_TABLES {
        stamps.push(latest_mutation(conn, table)?);
    }

    if stamps.iter().all(Option::is_none) {
        return Ok(EMPTY_FINGERPRINT.to_string());
    }

    let mut hasher = Md5::new();
    for stamp in &stamps {
        hasher.update(stamp.unwrap_or(0).to_string().as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());
    Ok(digest[..FINGERPRINT_LEN].to_string())
}
