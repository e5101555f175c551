//! Session restructuring.
//!
//! Split and merge each run in one SQLite transaction. On return every
//! touched session has dense positions that follow resolved capture order,
//! or nothing was written at all.

mod merge;
pub mod resolve;
mod split;

use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::collections::HashMap;

use crate::config::Config;
use crate::db::timeline::{get_session, photos_in_session, pin_taken_at};
use crate::db::Database;
use crate::error::RollbackReason;

pub use resolve::{CaptureSource, ExifExtractor, MetadataExtractor, TimeResolver};

/// Result of a merge request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The source was emptied into the target and destroyed.
    Merged { moved: usize },
    /// Nothing changed.
    RolledBack(RollbackReason),
}

impl MergeOutcome {
    pub fn moved(&self) -> Option<usize> {
        match self {
            MergeOutcome::Merged { moved } => Some(*moved),
            MergeOutcome::RolledBack(_) => None,
        }
    }
}

#[cfg(test)]
type AfterMoveHook = Box<dyn Fn(&Connection, i64) -> Result<()>>;

pub struct Restructurer<'a> {
    db: &'a Database,
    resolver: &'a TimeResolver,
    split_id_max_attempts: u32,
    /// Runs inside the merge transaction right after the bulk move.
    #[cfg(test)]
    after_move: Option<AfterMoveHook>,
}

impl<'a> Restructurer<'a> {
    pub fn new(db: &'a Database, resolver: &'a TimeResolver) -> Self {
        Self {
            db,
            resolver,
            split_id_max_attempts: 1000,
            #[cfg(test)]
            after_move: None,
        }
    }

    pub fn from_config(db: &'a Database, resolver: &'a TimeResolver, config: &Config) -> Self {
        Self::new(db, resolver).with_split_attempts(config.restructure.split_id_max_attempts)
    }

    pub fn with_split_attempts(mut self, attempts: u32) -> Self {
        self.split_id_max_attempts = attempts.max(1);
        self
    }

    /// Resolved capture instant of a photo, for display and sorting.
    pub fn resolve_capture_instant(&self, photo_id: i64) -> Result<Option<DateTime<Utc>>> {
        let conn = self.db.connection();
        let Some(photo) = self.db.get_photo(photo_id)? else {
            return Ok(None);
        };
        let Some(session) = get_session(conn, photo.session_id)? else {
            return Ok(None);
        };
        Ok(Some(self.resolver.resolve(conn, &photo, &session)))
    }

    /// Whether position order and resolved capture order agree for a session.
    /// Equal instants count as ordered.
    pub fn is_chronological(&self, session_id: i64) -> Result<bool> {
        let conn = self.db.connection();
        let Some(session) = get_session(conn, session_id)? else {
            return Ok(true);
        };
        let instants = resolved_in_order(conn, self.resolver, &session)?;
        Ok(instants.windows(2).all(|w| w[0] <= w[1]))
    }
}

pub(crate) fn resolved_in_order(
    conn: &Connection,
    resolver: &TimeResolver,
    session: &crate::db::Session,
) -> Result<Vec<DateTime<Utc>>> {
    Ok(photos_in_session(conn, session.id)?
        .iter()
        .map(|photo| resolver.resolve(conn, photo, session))
        .collect())
}

/// Resolve every photo of `session` and freeze the calculated ones onto
/// their rows, so moving or renumbering them keeps their instants.
pub(crate) fn resolve_and_pin(
    conn: &Connection,
    resolver: &TimeResolver,
    session: &crate::db::Session,
    now: DateTime<Utc>,
) -> Result<HashMap<i64, DateTime<Utc>>> {
    let mut instants = HashMap::new();
    for photo in photos_in_session(conn, session.id)? {
        instants.insert(photo.id, resolve_pinned(conn, resolver, &photo, session, now)?);
    }
    Ok(instants)
}

pub(crate) fn resolve_pinned(
    conn: &Connection,
    resolver: &TimeResolver,
    photo: &crate::db::Photo,
    session: &crate::db::Session,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    let (instant, source) = resolver.resolve_with_source(conn, photo, session);
    if source == CaptureSource::Calculated {
        pin_taken_at(conn, photo.id, &resolver.wall_clock(instant), now)?;
    }
    Ok(instant)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::db::testing::exif_at;
    use crate::db::NewPhoto;
    use chrono::{Duration, FixedOffset};

    pub fn resolver() -> TimeResolver {
        TimeResolver::new(
            FixedOffset::east_opt(-5 * 3600).unwrap(),
            Duration::milliseconds(500),
        )
    }

    /// Session whose photos carry embedded times `offsets` seconds after
    /// 10:00 local, with span and count set the way ingestion would.
    pub fn session_with_times(
        db: &Database,
        resolver: &TimeResolver,
        day: i64,
        burst_id: &str,
        offsets: &[i64],
    ) -> (i64, Vec<i64>) {
        let session = db.create_session(day, burst_id, Some("cam-a")).unwrap();
        let photos: Vec<i64> = offsets
            .iter()
            .enumerate()
            .map(|(i, offset)| {
                let photo = NewPhoto::named(format!("{}_{:03}.jpg", burst_id, i)).taken_at(exif_at(*offset));
                db.add_photo(session, &photo).unwrap()
            })
            .collect();
        let start = offsets.first().map(|o| resolver.embedded_instant(&exif_at(*o)).unwrap());
        let end = offsets.last().map(|o| resolver.embedded_instant(&exif_at(*o)).unwrap());
        db.set_session_span(session, start, end).unwrap();
        (session, photos)
    }

    pub fn photo_ids(db: &Database, session: i64) -> Vec<i64> {
        db.photos_in_session(session).unwrap().iter().map(|p| p.id).collect()
    }
}
