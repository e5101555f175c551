//! Gallery listing: visible sessions grouped by day.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::db::Database;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryCounts {
    pub days: usize,
    pub sessions: usize,
    pub photos: i64,
    pub rejected: i64,
    pub heroes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GalleryView {
    /// Day id to session ids, each list in capture order. Day names repeat
    /// across events and years, so they only label.
    pub session_ids_by_day: BTreeMap<i64, Vec<i64>>,
    pub day_names: BTreeMap<i64, String>,
    /// Every listed session, days in calendar order.
    pub session_ids: Vec<i64>,
    /// Detected faces summed over each session's photos.
    pub face_counts: BTreeMap<i64, usize>,
    /// Photo at `photo_count / 2`, used as the session thumbnail.
    pub middle_photo_ids: BTreeMap<i64, i64>,
    pub stats: GalleryCounts,
}

/// Build the gallery listing. Hidden sessions are never listed; with
/// `hide_heroes` sessions that already have a hero are left out too.
pub fn compute_gallery(db: &Database, hide_heroes: bool) -> Result<GalleryView> {
    let mut view = GalleryView::default();

    for day in db.all_days()? {
        let sessions: Vec<_> = db
            .sessions_for_day(day.id)?
            .into_iter()
            .filter(|s| !s.hidden)
            .filter(|s| !(hide_heroes && s.hero_photo_id.is_some()))
            .collect();
        if sessions.is_empty() {
            continue;
        }

        view.day_names.insert(day.id, day.name.clone());
        let ids = view.session_ids_by_day.entry(day.id).or_default();
        for session in sessions {
            let photos = db.photos_in_session(session.id)?;
            let faces: usize = photos.iter().map(|p| p.face_count()).sum();
            let rejected = photos.iter().filter(|p| p.rejected).count() as i64;

            if let Some(middle) = db.photo_at(session.id, session.photo_count / 2)? {
                view.middle_photo_ids.insert(session.id, middle.id);
            }
            view.face_counts.insert(session.id, faces);

            view.stats.sessions += 1;
            view.stats.photos += session.photo_count;
            view.stats.rejected += rejected;
            if session.hero_photo_id.is_some() {
                view.stats.heroes += 1;
            }

            ids.push(session.id);
            view.session_ids.push(session.id);
        }
    }

    view.stats.days = view.session_ids_by_day.len();
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{memory_db, seed_day};
    use crate::db::{BoundingBox, NewPhoto};
    use chrono::NaiveDate;

    fn face() -> BoundingBox {
        BoundingBox {
            x: 0,
            y: 0,
            width: 10,
            height: 10,
            confidence: None,
        }
    }

    fn session_with(db: &Database, day: i64, burst_id: &str, photos: usize) -> (i64, Vec<i64>) {
        let session = db.create_session(day, burst_id, None).unwrap();
        let ids = (0..photos)
            .map(|i| {
                db.add_photo(session, &NewPhoto::named(format!("{}_{}.jpg", burst_id, i)))
                    .unwrap()
            })
            .collect();
        (session, ids)
    }

    #[test]
    fn test_gallery_groups_and_counts() {
        let (db, _clock) = memory_db();
        let tuesday = seed_day(&db);
        let event = db.create_event("Summer Camp", 2024).unwrap();
        let wednesday = db
            .create_day(event, "wednesday", NaiveDate::from_ymd_opt(2024, 6, 5).unwrap())
            .unwrap();

        let (a, a_photos) = session_with(&db, tuesday, "A", 5);
        let (b, b_photos) = session_with(&db, tuesday, "B", 2);
        let (c, c_photos) = session_with(&db, wednesday, "C", 1);
        let (hidden, _) = session_with(&db, wednesday, "H", 3);
        db.set_hidden(hidden, true).unwrap();

        db.set_faces(a_photos[0], &[face(), face()]).unwrap();
        db.set_faces(a_photos[3], &[face()]).unwrap();
        db.set_rejected(b_photos[1], true).unwrap();
        db.set_hero(c, Some(c_photos[0])).unwrap();

        let view = compute_gallery(&db, false).unwrap();

        assert_eq!(view.session_ids, vec![a, b, c]);
        assert_eq!(view.session_ids_by_day[&tuesday], vec![a, b]);
        assert_eq!(view.session_ids_by_day[&wednesday], vec![c]);
        assert_eq!(view.day_names[&wednesday], "wednesday");
        assert_eq!(view.face_counts[&a], 3);
        assert_eq!(view.face_counts[&b], 0);
        assert_eq!(view.middle_photo_ids[&a], a_photos[2]);
        assert_eq!(view.middle_photo_ids[&b], b_photos[1]);
        assert_eq!(view.middle_photo_ids[&c], c_photos[0]);
        assert_eq!(
            view.stats,
            GalleryCounts {
                days: 2,
                sessions: 3,
                photos: 8,
                rejected: 1,
                heroes: 1,
            }
        );
    }

    #[test]
    fn test_same_day_name_in_two_events_stays_apart() {
        let (db, _clock) = memory_db();
        let camp_2024 = seed_day(&db);
        let event_2025 = db.create_event("Summer Camp", 2025).unwrap();
        let camp_2025 = db
            .create_day(event_2025, "tuesday", NaiveDate::from_ymd_opt(2025, 6, 3).unwrap())
            .unwrap();
        let (a, _) = session_with(&db, camp_2024, "A", 1);
        let (b, _) = session_with(&db, camp_2025, "B", 1);

        let view = compute_gallery(&db, false).unwrap();

        assert_eq!(view.stats.days, 2);
        assert_eq!(view.session_ids_by_day[&camp_2024], vec![a]);
        assert_eq!(view.session_ids_by_day[&camp_2025], vec![b]);
        assert_eq!(view.day_names[&camp_2025], "tuesday");
    }

    #[test]
    fn test_hide_heroes() {
        let (db, _clock) = memory_db();
        let day = seed_day(&db);
        let (a, a_photos) = session_with(&db, day, "A", 2);
        let (b, _) = session_with(&db, day, "B", 2);
        db.set_hero(a, Some(a_photos[0])).unwrap();

        let view = compute_gallery(&db, true).unwrap();
        assert_eq!(view.session_ids, vec![b]);
        assert_eq!(view.stats.heroes, 0);
    }

    #[test]
    fn test_empty_session_has_no_middle_photo() {
        let (db, _clock) = memory_db();
        let day = seed_day(&db);
        let (empty, _) = session_with(&db, day, "E", 0);

        let view = compute_gallery(&db, false).unwrap();
        assert_eq!(view.session_ids, vec![empty]);
        assert!(view.middle_photo_ids.is_empty());
        assert_eq!(view.face_counts[&empty], 0);
    }
}
