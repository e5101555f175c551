//! Legacy sittings.
//!
//! Sittings predate sessions and were the only place contact details were
//! captured. Their session link and hero pointer are unreliable and nothing
//! in the timeline reads them for correlation; restructuring only keeps them
//! pointing at the session that now owns the photos they mention.

use anyhow::Result;
use rusqlite::{params, Connection};

use super::models::Sitting;
use super::{format_timestamp, required_timestamp, Database};

fn row_to_sitting(row: &rusqlite::Row) -> rusqlite::Result<Sitting> {
    Ok(Sitting {
        id: row.get(0)?,
        session_id: row.get(1)?,
        name: row.get(2)?,
        email: row.get(3)?,
        hero_photo_id: row.get(4)?,
        created_at: required_timestamp(row, 5)?,
    })
}

/// Point sittings whose deprecated hero photo now lives in `session_id`
/// at that session.
pub(crate) fn follow_hero_photos(conn: &Connection, session_id: i64) -> Result<usize> {
    let moved = conn.execute(
        r#"
        UPDATE sittings SET session_id = ?1
        WHERE hero_photo_id IN (SELECT id FROM photos WHERE session_id = ?1)
          AND (session_id IS NULL OR session_id != ?1)
        "#,
        [session_id],
    )?;
    Ok(moved)
}

/// Move every sitting of `from` onto `to`.
pub(crate) fn reassign(conn: &Connection, from: i64, to: i64) -> Result<usize> {
    let moved = conn.execute(
        "UPDATE sittings SET session_id = ? WHERE session_id = ?",
        params![to, from],
    )?;
    Ok(moved)
}

impl Database {
    /// Append a sitting. Sittings are never edited afterwards.
    pub fn record_sitting(
        &self,
        session_id: Option<i64>,
        name: Option<&str>,
        email: Option<&str>,
        hero_photo_id: Option<i64>,
    ) -> Result<i64> {
        self.conn.execute(
            r#"
            INSERT INTO sittings (session_id, name, email, hero_photo_id, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
            params![session_id, name, email, hero_photo_id, format_timestamp(&self.now())],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn sittings_for_session(&self, session_id: i64) -> Result<Vec<Sitting>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, session_id, name, email, hero_photo_id, created_at
            FROM sittings
            WHERE session_id = ?
            ORDER BY id
            "#,
        )?;
        let sittings = stmt
            .query_map([session_id], row_to_sitting)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sittings)
    }
}
