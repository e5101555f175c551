//! Queries over events, days, sessions and photos.
//!
//! The free functions take a `&Connection` so the restructuring engine can
//! run them inside its own transaction; `Database` wraps them for everyone
//! else. Every mutation stamps `updated_at` on the rows it touches, which is
//! what moves the cache fingerprint.

use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection};
use serde::de::DeserializeOwned;

use super::models::{
    BoundingBox, CropRect, Day, NewPhoto, Photo, Session, SessionTags, TagCategory,
};
use super::{format_timestamp, required_timestamp, timestamp_column, Database};

pub(crate) const SESSION_COLUMNS: &str = "id, day_id, burst_id, number, started_at, ended_at, \
     photo_count, hero_photo_id, hidden, source, \
     tags_people, tags_activity, tags_location, tags_misc, updated_at";

pub(crate) const PHOTO_COLUMNS: &str = "id, session_id, filename, position, rejected, faces, \
     exif, taken_at, source_path, portrait_crop, updated_at";

fn json_column<T: DeserializeOwned>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<T>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        serde_json::from_str(&s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    })
    .transpose()
}

pub(crate) fn row_to_session(row: &rusqlite::Row) -> rusqlite::Result<Session> {
    Ok(Session {
        id: row.get(0)?,
        day_id: row.get(1)?,
        burst_id: row.get(2)?,
        number: row.get(3)?,
        started_at: timestamp_column(row, 4)?,
        ended_at: timestamp_column(row, 5)?,
        photo_count: row.get(6)?,
        hero_photo_id: row.get(7)?,
        hidden: row.get(8)?,
        source: row.get(9)?,
        tags: SessionTags {
            people: json_column(row, 10)?.unwrap_or_default(),
            activity: json_column(row, 11)?.unwrap_or_default(),
            location: json_column(row, 12)?.unwrap_or_default(),
            misc: json_column(row, 13)?.unwrap_or_default(),
        },
        updated_at: required_timestamp(row, 14)?,
    })
}

pub(crate) fn row_to_photo(row: &rusqlite::Row) -> rusqlite::Result<Photo> {
    Ok(Photo {
        id: row.get(0)?,
        session_id: row.get(1)?,
        filename: row.get(2)?,
        position: row.get(3)?,
        rejected: row.get(4)?,
        faces: json_column(row, 5)?,
        exif: row.get(6)?,
        taken_at: row.get(7)?,
        source_path: row.get(8)?,
        portrait_crop: json_column(row, 9)?,
        updated_at: required_timestamp(row, 10)?,
    })
}

fn row_to_day(row: &rusqlite::Row) -> rusqlite::Result<Day> {
    let date: String = row.get(3)?;
    let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d").map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(Day {
        id: row.get(0)?,
        event_id: row.get(1)?,
        name: row.get(2)?,
        date,
        updated_at: required_timestamp(row, 4)?,
    })
}

pub(crate) fn get_session(conn: &Connection, session_id: i64) -> Result<Option<Session>> {
    let result = conn.query_row(
        &format!("SELECT {} FROM sessions WHERE id = ?", SESSION_COLUMNS),
        [session_id],
        row_to_session,
    );
    match result {
        Ok(session) => Ok(Some(session)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub(crate) fn get_photo(conn: &Connection, photo_id: i64) -> Result<Option<Photo>> {
    let result = conn.query_row(
        &format!("SELECT {} FROM photos WHERE id = ?", PHOTO_COLUMNS),
        [photo_id],
        row_to_photo,
    );
    match result {
        Ok(photo) => Ok(Some(photo)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Photos of a session in position order.
pub(crate) fn photos_in_session(conn: &Connection, session_id: i64) -> Result<Vec<Photo>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM photos WHERE session_id = ? ORDER BY position",
        PHOTO_COLUMNS
    ))?;
    let photos = stmt
        .query_map([session_id], row_to_photo)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(photos)
}

pub(crate) fn count_photos(conn: &Connection, session_id: i64) -> Result<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM photos WHERE session_id = ?",
        [session_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

pub(crate) fn next_session_number(conn: &Connection, day_id: i64) -> Result<i64> {
    let max: Option<i64> = conn.query_row(
        "SELECT MAX(number) FROM sessions WHERE day_id = ?",
        [day_id],
        |row| row.get(0),
    )?;
    Ok(max.unwrap_or(0) + 1)
}

/// Fields for a session created by ingestion or by a split.
#[derive(Debug, Clone)]
pub(crate) struct NewSession<'a> {
    pub day_id: i64,
    pub burst_id: &'a str,
    pub number: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub hidden: bool,
    pub source: Option<&'a str>,
}

/// Insert a session unless `burst_id` is already taken.
/// Returns the new row id, or `None` on a uniqueness conflict.
pub(crate) fn insert_session_if_absent(
    conn: &Connection,
    new: &NewSession<'_>,
    now: DateTime<Utc>,
) -> Result<Option<i64>> {
    let inserted = conn.execute(
        r#"
        INSERT OR IGNORE INTO sessions (day_id, burst_id, number, started_at, hidden, source, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            new.day_id,
            new.burst_id,
            new.number,
            new.started_at.as_ref().map(format_timestamp),
            new.hidden,
            new.source,
            format_timestamp(&now),
        ],
    )?;
    if inserted == 0 {
        return Ok(None);
    }
    Ok(Some(conn.last_insert_rowid()))
}

/// Rewrite the derived span and count columns of a session.
pub(crate) fn update_session_span(
    conn: &Connection,
    session_id: i64,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    photo_count: i64,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        r#"
        UPDATE sessions
        SET started_at = ?, ended_at = ?, photo_count = ?, updated_at = ?
        WHERE id = ?
        "#,
        params![
            started_at.as_ref().map(format_timestamp),
            ended_at.as_ref().map(format_timestamp),
            photo_count,
            format_timestamp(&now),
            session_id,
        ],
    )?;
    Ok(())
}

pub(crate) fn set_session_hero(
    conn: &Connection,
    session_id: i64,
    photo_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE sessions SET hero_photo_id = ?, updated_at = ? WHERE id = ?",
        params![photo_id, format_timestamp(&now), session_id],
    )?;
    Ok(())
}

/// Give the photos of `session_id` positions `0..n` in the order of
/// `ordered_ids`. Current positions are parked on unique negative values
/// first so the `(session_id, position)` constraint never sees a clash.
pub(crate) fn renumber_photos(
    conn: &Connection,
    session_id: i64,
    ordered_ids: &[i64],
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE photos SET position = -1 - id WHERE session_id = ?",
        [session_id],
    )?;
    let now = format_timestamp(&now);
    let mut stmt = conn.prepare(
        "UPDATE photos SET position = ?, updated_at = ? WHERE id = ? AND session_id = ?",
    )?;
    for (position, photo_id) in ordered_ids.iter().enumerate() {
        let changed = stmt.execute(params![position as i64, now, photo_id, session_id])?;
        if changed != 1 {
            bail!("photo {} is not in session {}", photo_id, session_id);
        }
    }
    Ok(())
}

/// Insert a photo row at `position`. The caller keeps `photo_count` in step.
pub(crate) fn insert_photo(
    conn: &Connection,
    session_id: i64,
    position: i64,
    photo: &NewPhoto,
    now: DateTime<Utc>,
) -> Result<i64> {
    let faces = photo.faces.as_ref().map(serde_json::to_string).transpose()?;
    conn.execute(
        r#"
        INSERT INTO photos (session_id, filename, position, faces, exif, taken_at, source_path, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
        params![
            session_id,
            photo.filename,
            position,
            faces,
            photo.exif,
            photo.taken_at,
            photo.source_path,
            format_timestamp(&now),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Store a capture time recovered from the source file. Memoization only,
/// so `updated_at` is left alone.
pub(crate) fn remember_taken_at(conn: &Connection, photo_id: i64, taken_at: &str) -> Result<()> {
    conn.execute(
        "UPDATE photos SET taken_at = ? WHERE id = ? AND taken_at IS NULL",
        params![taken_at, photo_id],
    )?;
    Ok(())
}

/// Overwrite a photo's capture time, e.g. to freeze a calculated instant
/// before its position changes. Unlike [`remember_taken_at`] this is a
/// mutation and stamps `updated_at`.
pub(crate) fn pin_taken_at(
    conn: &Connection,
    photo_id: i64,
    taken_at: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    conn.execute(
        "UPDATE photos SET taken_at = ?, updated_at = ? WHERE id = ?",
        params![taken_at, format_timestamp(&now), photo_id],
    )?;
    Ok(())
}

impl Database {
    // ========================================================================
    // Events and days
    // ========================================================================

    /// Find or create an event, returning its id.
    pub fn create_event(&self, name: &str, year: i32) -> Result<i64> {
        self.conn.execute(
            "INSERT OR IGNORE INTO events (name, year) VALUES (?, ?)",
            params![name, year],
        )?;
        let id = self.conn.query_row(
            "SELECT id FROM events WHERE name = ? AND year = ?",
            params![name, year],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn create_day(&self, event_id: i64, name: &str, date: NaiveDate) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO days (event_id, name, date, updated_at) VALUES (?, ?, ?, ?)",
            params![
                event_id,
                name,
                date.format("%Y-%m-%d").to_string(),
                format_timestamp(&self.now()),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn find_day(&self, event_id: i64, name: &str) -> Result<Option<Day>> {
        let result = self.conn.query_row(
            "SELECT id, event_id, name, date, updated_at FROM days WHERE event_id = ? AND name = ?",
            params![event_id, name],
            row_to_day,
        );
        match result {
            Ok(day) => Ok(Some(day)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// All days across events, in calendar order.
    pub fn all_days(&self) -> Result<Vec<Day>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, event_id, name, date, updated_at FROM days ORDER BY date, id")?;
        let days = stmt
            .query_map([], row_to_day)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(days)
    }

    pub fn rename_day(&self, day_id: i64, name: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE days SET name = ?, updated_at = ? WHERE id = ?",
            params![name, format_timestamp(&self.now()), day_id],
        )?;
        Ok(())
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Create an empty session at the end of its day.
    pub fn create_session(&self, day_id: i64, burst_id: &str, source: Option<&str>) -> Result<i64> {
        let number = next_session_number(&self.conn, day_id)?;
        let new = NewSession {
            day_id,
            burst_id,
            number,
            started_at: None,
            hidden: false,
            source,
        };
        match insert_session_if_absent(&self.conn, &new, self.now())? {
            Some(id) => Ok(id),
            None => bail!("burst id {} already exists", burst_id),
        }
    }

    pub fn get_session(&self, session_id: i64) -> Result<Option<Session>> {
        get_session(&self.conn, session_id)
    }

    pub fn get_session_by_burst_id(&self, burst_id: &str) -> Result<Option<Session>> {
        let result = self.conn.query_row(
            &format!("SELECT {} FROM sessions WHERE burst_id = ?", SESSION_COLUMNS),
            [burst_id],
            row_to_session,
        );
        match result {
            Ok(session) => Ok(Some(session)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Every session, ordered by day then start time.
    pub fn all_sessions(&self) -> Result<Vec<Session>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {}
            FROM sessions
            ORDER BY day_id, started_at IS NULL, started_at, number, id
            "#,
            SESSION_COLUMNS
        ))?;
        let sessions = stmt
            .query_map([], row_to_session)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    pub fn sessions_for_day(&self, day_id: i64) -> Result<Vec<Session>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {}
            FROM sessions
            WHERE day_id = ?
            ORDER BY started_at IS NULL, started_at, number, id
            "#,
            SESSION_COLUMNS
        ))?;
        let sessions = stmt
            .query_map([day_id], row_to_session)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(sessions)
    }

    pub fn set_session_span(
        &self,
        session_id: i64,
        started_at: Option<DateTime<Utc>>,
        ended_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        if let (Some(start), Some(end)) = (started_at, ended_at) {
            if start > end {
                bail!("session {} would end before it starts", session_id);
            }
        }
        let count = count_photos(&self.conn, session_id)?;
        update_session_span(&self.conn, session_id, started_at, ended_at, count, self.now())
    }

    /// Choose the hero photo of a session, or clear it with `None`.
    pub fn set_hero(&self, session_id: i64, photo_id: Option<i64>) -> Result<()> {
        if let Some(photo_id) = photo_id {
            match get_photo(&self.conn, photo_id)? {
                Some(photo) if photo.session_id == session_id => {}
                Some(_) => bail!("photo {} does not belong to session {}", photo_id, session_id),
                None => bail!("photo {} not found", photo_id),
            }
        }
        set_session_hero(&self.conn, session_id, photo_id, self.now())?;
        tracing::info!(session_id, ?photo_id, "Hero photo updated");
        Ok(())
    }

    pub fn set_hidden(&self, session_id: i64, hidden: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE sessions SET hidden = ?, updated_at = ? WHERE id = ?",
            params![hidden, format_timestamp(&self.now()), session_id],
        )?;
        Ok(())
    }

    /// Add a label to one tag category. Adding an existing label is a no-op.
    pub fn add_tag(&self, session_id: i64, category: TagCategory, label: &str) -> Result<()> {
        self.update_tags(session_id, category, |tags| {
            if tags.iter().any(|t| t == label) {
                return false;
            }
            tags.push(label.to_string());
            true
        })
    }

    pub fn remove_tag(&self, session_id: i64, category: TagCategory, label: &str) -> Result<()> {
        self.update_tags(session_id, category, |tags| {
            let before = tags.len();
            tags.retain(|t| t != label);
            tags.len() != before
        })
    }

    fn update_tags(
        &self,
        session_id: i64,
        category: TagCategory,
        edit: impl FnOnce(&mut Vec<String>) -> bool,
    ) -> Result<()> {
        let Some(session) = get_session(&self.conn, session_id)? else {
            bail!("session {} not found", session_id);
        };
        let mut tags = session.tags.get(category).to_vec();
        if !edit(&mut tags) {
            return Ok(());
        }
        self.conn.execute(
            &format!(
                "UPDATE sessions SET {} = ?, updated_at = ? WHERE id = ?",
                category.column()
            ),
            params![serde_json::to_string(&tags)?, format_timestamp(&self.now()), session_id],
        )?;
        Ok(())
    }

    // ========================================================================
    // Photos
    // ========================================================================

    /// Append a photo to the end of a session and refresh its count.
    pub fn add_photo(&self, session_id: i64, photo: &NewPhoto) -> Result<i64> {
        let tx = self.conn.unchecked_transaction()?;
        let position = count_photos(&tx, session_id)?;
        let now = self.now();
        let photo_id = insert_photo(&tx, session_id, position, photo, now)?;
        tx.execute(
            "UPDATE sessions SET photo_count = ?, updated_at = ? WHERE id = ?",
            params![position + 1, format_timestamp(&now), session_id],
        )?;
        tx.commit()?;
        Ok(photo_id)
    }

    pub fn get_photo(&self, photo_id: i64) -> Result<Option<Photo>> {
        get_photo(&self.conn, photo_id)
    }

    pub fn photos_in_session(&self, session_id: i64) -> Result<Vec<Photo>> {
        photos_in_session(&self.conn, session_id)
    }

    /// Photo at a given position of a session.
    pub fn photo_at(&self, session_id: i64, position: i64) -> Result<Option<Photo>> {
        let result = self.conn.query_row(
            &format!(
                "SELECT {} FROM photos WHERE session_id = ? AND position = ?",
                PHOTO_COLUMNS
            ),
            params![session_id, position],
            row_to_photo,
        );
        match result {
            Ok(photo) => Ok(Some(photo)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn set_rejected(&self, photo_id: i64, rejected: bool) -> Result<()> {
        self.conn.execute(
            "UPDATE photos SET rejected = ?, updated_at = ? WHERE id = ?",
            params![rejected, format_timestamp(&self.now()), photo_id],
        )?;
        Ok(())
    }

    /// Record results from the face detection pipeline.
    pub fn set_faces(&self, photo_id: i64, faces: &[BoundingBox]) -> Result<()> {
        self.conn.execute(
            "UPDATE photos SET faces = ?, updated_at = ? WHERE id = ?",
            params![serde_json::to_string(faces)?, format_timestamp(&self.now()), photo_id],
        )?;
        Ok(())
    }

    pub fn set_portrait_crop(&self, photo_id: i64, crop: Option<CropRect>) -> Result<()> {
        let crop = crop.as_ref().map(serde_json::to_string).transpose()?;
        self.conn.execute(
            "UPDATE photos SET portrait_crop = ?, updated_at = ? WHERE id = ?",
            params![crop, format_timestamp(&self.now()), photo_id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use crate::db::testing::{memory_db, seed_day};
    use chrono::Duration;

    #[test]
    fn test_add_photo_packs_positions() {
        let (db, _clock) = memory_db();
        let day = seed_day(&db);
        let session = db.create_session(day, "B001", Some("cam-a")).unwrap();

        for name in ["a.jpg", "b.jpg", "c.jpg"] {
            db.add_photo(session, &NewPhoto::named(name)).unwrap();
        }

        let photos = db.photos_in_session(session).unwrap();
        let positions: Vec<i64> = photos.iter().map(|p| p.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);

        let session = db.get_session(session).unwrap().unwrap();
        assert_eq!(session.photo_count, 3);
        assert_eq!(session.number, 1);
        assert_eq!(session.source.as_deref(), Some("cam-a"));
    }

    #[test]
    fn test_duplicate_burst_id_rejected() {
        let (db, _clock) = memory_db();
        let day = seed_day(&db);
        db.create_session(day, "B001", None).unwrap();
        assert!(db.create_session(day, "B001", None).is_err());
    }

    #[test]
    fn test_day_name_unique_per_event() {
        let (db, _clock) = memory_db();
        let event = db.create_event("Summer Camp", 2024).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 6, 4).unwrap();
        db.create_day(event, "tuesday", date).unwrap();
        assert!(db.create_day(event, "tuesday", date).is_err());

        let other = db.create_event("Summer Camp", 2025).unwrap();
        assert_ne!(event, other);
        db.create_day(other, "tuesday", date).unwrap();
        assert_eq!(db.find_day(other, "tuesday").unwrap().unwrap().event_id, other);
    }

    #[test]
    fn test_hero_must_belong_to_session() {
        let (db, _clock) = memory_db();
        let day = seed_day(&db);
        let first = db.create_session(day, "B001", None).unwrap();
        let second = db.create_session(day, "B002", None).unwrap();
        let own = db.add_photo(first, &NewPhoto::named("a.jpg")).unwrap();
        let foreign = db.add_photo(second, &NewPhoto::named("b.jpg")).unwrap();

        assert!(db.set_hero(first, Some(foreign)).is_err());
        db.set_hero(first, Some(own)).unwrap();
        assert_eq!(db.get_session(first).unwrap().unwrap().hero_photo_id, Some(own));

        db.set_hero(first, None).unwrap();
        assert_eq!(db.get_session(first).unwrap().unwrap().hero_photo_id, None);
    }

    #[test]
    fn test_tags_roundtrip_and_dedupe() {
        let (db, _clock) = memory_db();
        let day = seed_day(&db);
        let session = db.create_session(day, "B001", None).unwrap();

        db.add_tag(session, TagCategory::People, "Ana").unwrap();
        db.add_tag(session, TagCategory::People, "Ana").unwrap();
        db.add_tag(session, TagCategory::Location, "lake").unwrap();
        db.remove_tag(session, TagCategory::Misc, "absent").unwrap();

        let tags = db.get_session(session).unwrap().unwrap().tags;
        assert_eq!(tags.people, vec!["Ana".to_string()]);
        assert_eq!(tags.location, vec!["lake".to_string()]);
        assert!(tags.misc.is_empty());

        db.remove_tag(session, TagCategory::People, "Ana").unwrap();
        assert!(db.get_session(session).unwrap().unwrap().tags.people.is_empty());
    }

    #[test]
    fn test_mutations_stamp_updated_at() {
        let (db, clock) = memory_db();
        let day = seed_day(&db);
        let session = db.create_session(day, "B001", None).unwrap();
        let photo = db.add_photo(session, &NewPhoto::named("a.jpg")).unwrap();
        let before = db.get_photo(photo).unwrap().unwrap().updated_at;

        clock.advance(Duration::seconds(3));
        db.set_rejected(photo, true).unwrap();

        let after = db.get_photo(photo).unwrap().unwrap();
        assert!(after.rejected);
        assert_eq!(after.updated_at, before + Duration::seconds(3));
    }

    #[test]
    fn test_renumber_follows_given_order() {
        let (db, _clock) = memory_db();
        let day = seed_day(&db);
        let session = db.create_session(day, "B001", None).unwrap();
        let a = db.add_photo(session, &NewPhoto::named("a.jpg")).unwrap();
        let b = db.add_photo(session, &NewPhoto::named("b.jpg")).unwrap();
        let c = db.add_photo(session, &NewPhoto::named("c.jpg")).unwrap();

        renumber_photos(&db.conn, session, &[c, a, b], db.now()).unwrap();

        let order: Vec<i64> = db.photos_in_session(session).unwrap().iter().map(|p| p.id).collect();
        assert_eq!(order, vec![c, a, b]);
    }

    #[test]
    fn test_crop_and_faces_stored_as_json() {
        let (db, _clock) = memory_db();
        let day = seed_day(&db);
        let session = db.create_session(day, "B001", None).unwrap();
        let photo = db.add_photo(session, &NewPhoto::named("a.jpg")).unwrap();

        let crop = CropRect { x: 10, y: 20, width: 300, height: 400 };
        db.set_portrait_crop(photo, Some(crop)).unwrap();
        db.set_faces(
            photo,
            &[BoundingBox { x: 1, y: 2, width: 3, height: 4, confidence: Some(0.9) }],
        )
        .unwrap();

        let stored = db.get_photo(photo).unwrap().unwrap();
        assert_eq!(stored.portrait_crop, Some(crop));
        assert_eq!(stored.face_count(), 1);
    }

    #[test]
    fn test_span_rejects_inverted_range() {
        let (db, clock) = memory_db();
        let day = seed_day(&db);
        let session = db.create_session(day, "B001", None).unwrap();
        let now = clock.now();
        assert!(db
            .set_session_span(session, Some(now), Some(now - Duration::seconds(1)))
            .is_err());
        db.set_session_span(session, Some(now), Some(now)).unwrap();
    }
}
