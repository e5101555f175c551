use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{resolve_pinned, Restructurer};
use crate::db::sittings;
use crate::db::timeline::{
    get_photo, get_session, insert_session_if_absent, next_session_number, photos_in_session,
    renumber_photos, set_session_hero, update_session_span, NewSession,
};
use crate::db::Session;
use crate::error::SplitError;

impl Restructurer<'_> {
    /// Move `pivot_photo_id` and every later photo of `session_id` into a new
    /// session that starts at the pivot's capture instant.
    pub fn split(&self, session_id: i64, pivot_photo_id: i64) -> Result<Session, SplitError> {
        let tx = self.db.connection().unchecked_transaction()?;
        let now = self.db.now();

        let Some(original) = get_session(&tx, session_id)? else {
            return Err(SplitError::validation(format!("session {} not found", session_id)));
        };
        let pivot = match get_photo(&tx, pivot_photo_id)? {
            Some(photo) if photo.session_id == session_id => photo,
            Some(_) => {
                return Err(SplitError::validation(format!(
                    "photo {} is not part of session {}",
                    pivot_photo_id, original.burst_id
                )))
            }
            None => {
                return Err(SplitError::validation(format!("photo {} not found", pivot_photo_id)))
            }
        };
        if pivot.position == 0 {
            return Err(SplitError::validation(
                "cannot split at the first photo of a session",
            ));
        }

        let photos = photos_in_session(&tx, session_id)?;
        let (remaining, moving): (Vec<_>, Vec<_>) =
            photos.into_iter().partition(|p| p.position < pivot.position);
        if moving.is_empty() {
            return Err(SplitError::validation("no photos to move"));
        }

        // The new session starts elsewhere, so freeze what position implied.
        for photo in &moving {
            resolve_pinned(&tx, self.resolver, photo, &original, now)?;
        }
        let started_at = self.resolver.resolve(&tx, &pivot, &original);
        let number = next_session_number(&tx, original.day_id)?;
        let (new_id, burst_id) = self.allocate_split_session(&tx, &original, number, started_at, now)?;

        tx.execute(
            r#"
            UPDATE photos SET session_id = ?, position = -1 - id
            WHERE session_id = ? AND position >= ?
            "#,
            params![new_id, session_id, pivot.position],
        )?;
        let moved_ids: Vec<i64> = moving.iter().map(|p| p.id).collect();
        renumber_photos(&tx, new_id, &moved_ids, now)?;

        let Some(created) = get_session(&tx, new_id)? else {
            return Err(anyhow::anyhow!("split session {} vanished", new_id).into());
        };
        let ended_at = match photos_in_session(&tx, new_id)?.last() {
            Some(last) => self.resolver.resolve(&tx, last, &created).max(started_at),
            None => started_at,
        };
        update_session_span(&tx, new_id, Some(started_at), Some(ended_at), moved_ids.len() as i64, now)?;

        let original_end = match remaining.last() {
            Some(last) => Some(self.resolver.resolve(&tx, last, &original)),
            None => original.ended_at,
        };
        let original_end = match (original.started_at, original_end) {
            (Some(start), Some(end)) => Some(end.max(start)),
            (_, end) => end,
        };
        update_session_span(
            &tx,
            session_id,
            original.started_at,
            original_end,
            remaining.len() as i64,
            now,
        )?;

        if let Some(hero) = original.hero_photo_id {
            if moved_ids.contains(&hero) {
                set_session_hero(&tx, session_id, None, now)?;
                set_session_hero(&tx, new_id, Some(hero), now)?;
            }
        }

        let sittings_moved = sittings::follow_hero_photos(&tx, new_id)?;

        let Some(created) = get_session(&tx, new_id)? else {
            return Err(anyhow::anyhow!("split session {} vanished", new_id).into());
        };
        tx.commit()?;

        tracing::info!(
            session = %original.burst_id,
            new_session = %burst_id,
            moved = moved_ids.len(),
            sittings_moved,
            "Split session"
        );
        Ok(created)
    }

    /// Insert the new session under the first free `<burst_id>-split-N`.
    fn allocate_split_session(
        &self,
        conn: &Connection,
        original: &Session,
        number: i64,
        started_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(i64, String), SplitError> {
        for n in 1..=self.split_id_max_attempts {
            let candidate = format!("{}-split-{}", original.burst_id, n);
            let new = NewSession {
                day_id: original.day_id,
                burst_id: &candidate,
                number,
                started_at: Some(started_at),
                hidden: original.hidden,
                source: original.source.as_deref(),
            };
            if let Some(id) = insert_session_if_absent(conn, &new, now)? {
                return Ok((id, candidate));
            }
            tracing::debug!("Burst id {} taken, trying next", candidate);
        }
        Err(SplitError::IdExhausted {
            burst_id: original.burst_id.clone(),
            attempts: self.split_id_max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{exif_at, memory_db, seed_day};
    use crate::db::NewPhoto;
    use crate::timeline::fixtures::{photo_ids, resolver, session_with_times};
    use chrono::Duration;

    #[test]
    fn test_split_moves_tail_into_new_session() {
        let (db, _clock) = memory_db();
        let resolver = resolver();
        let day = seed_day(&db);
        let (a, photos) = session_with_times(&db, &resolver, day, "B001", &[0, 2, 4, 6, 8]);
        let engine = Restructurer::new(&db, &resolver);

        let t2 = engine.resolve_capture_instant(photos[2]).unwrap().unwrap();
        let t4 = engine.resolve_capture_instant(photos[4]).unwrap().unwrap();
        let t1 = engine.resolve_capture_instant(photos[1]).unwrap().unwrap();

        let b = engine.split(a, photos[2]).unwrap();

        assert_eq!(b.burst_id, "B001-split-1");
        assert_eq!(b.photo_count, 3);
        assert_eq!(b.started_at, Some(t2));
        assert_eq!(b.ended_at, Some(t4));
        assert_eq!(b.number, 2);
        assert_eq!(b.source.as_deref(), Some("cam-a"));
        assert_eq!(photo_ids(&db, b.id), photos[2..].to_vec());
        let positions: Vec<i64> = db.photos_in_session(b.id).unwrap().iter().map(|p| p.position).collect();
        assert_eq!(positions, vec![0, 1, 2]);

        let a_after = db.get_session(a).unwrap().unwrap();
        assert_eq!(a_after.photo_count, 2);
        assert_eq!(a_after.ended_at, Some(t1));
        assert_eq!(photo_ids(&db, a), photos[..2].to_vec());
        assert_eq!(engine.resolve_capture_instant(photos[1]).unwrap(), Some(t1));

        assert!(engine.is_chronological(a).unwrap());
        assert!(engine.is_chronological(b.id).unwrap());
    }

    #[test]
    fn test_split_at_first_photo_is_rejected() {
        let (db, _clock) = memory_db();
        let resolver = resolver();
        let day = seed_day(&db);
        let (a, photos) = session_with_times(&db, &resolver, day, "B001", &[0, 1, 2]);
        let before = db.get_session(a).unwrap().unwrap();
        let engine = Restructurer::new(&db, &resolver);

        let err = engine.split(a, photos[0]).unwrap_err();
        assert!(matches!(err, SplitError::Validation(_)));
        assert_eq!(photo_ids(&db, a), photos);
        assert_eq!(db.get_session(a).unwrap().unwrap(), before);
        assert_eq!(db.all_sessions().unwrap().len(), 1);
    }

    #[test]
    fn test_split_rejects_foreign_pivot() {
        let (db, _clock) = memory_db();
        let resolver = resolver();
        let day = seed_day(&db);
        let (a, _) = session_with_times(&db, &resolver, day, "B001", &[0, 1]);
        let (_, other) = session_with_times(&db, &resolver, day, "B002", &[5, 6]);
        let engine = Restructurer::new(&db, &resolver);

        let err = engine.split(a, other[1]).unwrap_err();
        assert_eq!(err.messages(), vec!["photo 4 is not part of session B001".to_string()]);
        assert!(matches!(engine.split(a, 999), Err(SplitError::Validation(_))));
        assert!(matches!(engine.split(999, other[1]), Err(SplitError::Validation(_))));
    }

    #[test]
    fn test_split_skips_taken_burst_ids() {
        let (db, _clock) = memory_db();
        let resolver = resolver();
        let day = seed_day(&db);
        let (a, photos) = session_with_times(&db, &resolver, day, "B001", &[0, 1, 2, 3]);
        db.create_session(day, "B001-split-1", None).unwrap();
        db.create_session(day, "B001-split-2", None).unwrap();
        let engine = Restructurer::new(&db, &resolver);

        let b = engine.split(a, photos[3]).unwrap();
        assert_eq!(b.burst_id, "B001-split-3");
    }

    #[test]
    fn test_split_id_exhaustion_rolls_back() {
        let (db, _clock) = memory_db();
        let resolver = resolver();
        let day = seed_day(&db);
        let (a, photos) = session_with_times(&db, &resolver, day, "B001", &[0, 1, 2]);
        db.create_session(day, "B001-split-1", None).unwrap();
        db.create_session(day, "B001-split-2", None).unwrap();
        let engine = Restructurer::new(&db, &resolver).with_split_attempts(2);

        let err = engine.split(a, photos[1]).unwrap_err();
        assert!(matches!(err, SplitError::IdExhausted { attempts: 2, .. }));
        assert_eq!(photo_ids(&db, a), photos);
        assert_eq!(db.get_session(a).unwrap().unwrap().photo_count, 3);
    }

    #[test]
    fn test_split_start_ignores_wall_clock() {
        let (db, clock) = memory_db();
        let resolver = resolver();
        let day = seed_day(&db);
        let (a, photos) = session_with_times(&db, &resolver, day, "B001", &[0, 10, 20]);
        clock.advance(Duration::days(30));
        let engine = Restructurer::new(&db, &resolver);

        let expected = engine.resolve_capture_instant(photos[1]).unwrap();
        let b = engine.split(a, photos[1]).unwrap();
        assert_eq!(b.started_at, expected);
    }

    #[test]
    fn test_split_without_metadata_keeps_calculated_times() {
        let (db, _clock) = memory_db();
        let resolver = resolver();
        let day = seed_day(&db);
        let a = db.create_session(day, "B001", None).unwrap();
        let ids: Vec<i64> = (0..4)
            .map(|i| db.add_photo(a, &NewPhoto::named(format!("f{}.jpg", i))).unwrap())
            .collect();
        let start = resolver.embedded_instant("2024:06:04 10:00:00").unwrap();
        db.set_session_span(a, Some(start), Some(start + Duration::milliseconds(1500))).unwrap();
        let engine = Restructurer::new(&db, &resolver);

        let before: Vec<_> = ids
            .iter()
            .map(|id| engine.resolve_capture_instant(*id).unwrap().unwrap())
            .collect();
        let b = engine.split(a, ids[2]).unwrap();
        let after: Vec<_> = ids
            .iter()
            .map(|id| engine.resolve_capture_instant(*id).unwrap().unwrap())
            .collect();

        assert_eq!(before, after);
        assert_eq!(b.started_at, Some(start + Duration::milliseconds(1000)));
        assert_eq!(b.ended_at, Some(start + Duration::milliseconds(1500)));
    }

    #[test]
    fn test_split_at_timed_pivot_keeps_untimed_followers_in_place() {
        let (db, _clock) = memory_db();
        let resolver = resolver();
        let day = seed_day(&db);
        let (a, mut photos) = session_with_times(&db, &resolver, day, "B001", &[0, 1]);
        photos.push(db.add_photo(a, &NewPhoto::named("B001_002.jpg")).unwrap());
        photos.push(
            db.add_photo(a, &NewPhoto::named("B001_003.jpg").taken_at(exif_at(1)))
                .unwrap(),
        );
        let engine = Restructurer::new(&db, &resolver);
        assert!(engine.is_chronological(a).unwrap());
        let untimed_before = engine.resolve_capture_instant(photos[2]).unwrap();

        let b = engine.split(a, photos[1]).unwrap();

        assert_eq!(photo_ids(&db, b.id), photos[1..].to_vec());
        assert_eq!(engine.resolve_capture_instant(photos[2]).unwrap(), untimed_before);
        assert!(engine.is_chronological(b.id).unwrap());
    }

    #[test]
    fn test_split_carries_hero_and_sittings() {
        let (db, _clock) = memory_db();
        let resolver = resolver();
        let day = seed_day(&db);
        let (a, photos) = session_with_times(&db, &resolver, day, "B001", &[0, 1, 2, 3]);
        db.set_hero(a, Some(photos[3])).unwrap();
        let follows = db.record_sitting(Some(a), Some("Ana"), None, Some(photos[2])).unwrap();
        let stays = db.record_sitting(Some(a), Some("Bo"), None, Some(photos[0])).unwrap();
        let engine = Restructurer::new(&db, &resolver);

        let b = engine.split(a, photos[2]).unwrap();

        assert_eq!(b.hero_photo_id, Some(photos[3]));
        assert_eq!(db.get_session(a).unwrap().unwrap().hero_photo_id, None);
        let moved: Vec<i64> = db.sittings_for_session(b.id).unwrap().iter().map(|s| s.id).collect();
        assert_eq!(moved, vec![follows]);
        let kept: Vec<i64> = db.sittings_for_session(a).unwrap().iter().map(|s| s.id).collect();
        assert_eq!(kept, vec![stays]);
    }
}
