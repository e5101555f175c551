//! Cached aggregate projections over the timeline.

pub mod gallery;
pub mod stats;

use anyhow::Result;
use chrono::FixedOffset;

use crate::cache::{fingerprint, ViewCache, ViewFilter};
use crate::config::Config;
use crate::db::Database;

pub use gallery::{compute_gallery, GalleryCounts, GalleryView};
pub use stats::{compute_stats, StatsView};

pub const GALLERY_VIEW: &str = "gallery";
pub const STATS_VIEW: &str = "stats";

pub struct Views<'a> {
    db: &'a Database,
    cache: &'a ViewCache,
    offset: FixedOffset,
    top_sessions: usize,
}

impl<'a> Views<'a> {
    pub fn new(db: &'a Database, cache: &'a ViewCache, offset: FixedOffset) -> Self {
        Self {
            db,
            cache,
            offset,
            top_sessions: 10,
        }
    }

    pub fn from_config(db: &'a Database, cache: &'a ViewCache, config: &Config) -> Result<Self> {
        Ok(Self::new(db, cache, config.event.offset()?).with_top_sessions(config.stats.top_sessions))
    }

    pub fn with_top_sessions(mut self, n: usize) -> Self {
        self.top_sessions = n;
        self
    }

    /// Current version token of the store.
    pub fn fingerprint(&self) -> Result<String> {
        fingerprint(self.db.connection())
    }

    pub fn gallery(&self, hide_heroes: bool, force: bool) -> Result<GalleryView> {
        let fingerprint = self.fingerprint()?;
        self.gallery_at(&fingerprint, hide_heroes, force)
    }

    /// Gallery listing for a fingerprint the caller already holds.
    pub fn gallery_at(&self, fingerprint: &str, hide_heroes: bool, force: bool) -> Result<GalleryView> {
        let filter = if hide_heroes {
            ViewFilter::all().with("hide_heroes", 1)
        } else {
            ViewFilter::all()
        };
        self.cache
            .get_or_compute_as(GALLERY_VIEW, fingerprint, &filter, force, || {
                compute_gallery(self.db, hide_heroes)
            })
    }

    pub fn stats(&self, force: bool) -> Result<StatsView> {
        let fingerprint = self.fingerprint()?;
        self.stats_at(&fingerprint, force)
    }

    pub fn stats_at(&self, fingerprint: &str, force: bool) -> Result<StatsView> {
        self.cache
            .get_or_compute_as(STATS_VIEW, fingerprint, &ViewFilter::all(), force, || {
                compute_stats(self.db, self.offset, self.top_sessions)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{cache_key, CacheStore, MemoryCache};
    use crate::db::testing::{memory_db, seed_day};
    use crate::db::NewPhoto;
    use crate::timeline::fixtures::{resolver, session_with_times};
    use crate::timeline::Restructurer;
    use chrono::Duration;
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    fn cache() -> (ViewCache, Arc<MemoryCache>) {
        let store = Arc::new(MemoryCache::new());
        let cache = ViewCache::new(store.clone(), StdDuration::from_secs(60), StdDuration::from_secs(5));
        (cache, store)
    }

    fn offset() -> FixedOffset {
        FixedOffset::east_opt(-5 * 3600).unwrap()
    }

    #[test]
    fn test_gallery_is_cached_under_fingerprint() {
        let (db, _clock) = memory_db();
        let day = seed_day(&db);
        let session = db.create_session(day, "A", None).unwrap();
        db.add_photo(session, &NewPhoto::named("a.jpg")).unwrap();
        let (cache, store) = cache();
        let views = Views::new(&db, &cache, offset());

        let first = views.gallery(false, false).unwrap();
        let fp = views.fingerprint().unwrap();
        let key = cache_key(GALLERY_VIEW, &fp, &ViewFilter::all());
        let stored = store.get(&key).unwrap().unwrap();

        assert_eq!(views.gallery(false, false).unwrap(), first);
        assert_eq!(store.get(&key).unwrap().unwrap(), stored);
        assert!(store
            .get(&cache_key(GALLERY_VIEW, &fp, &ViewFilter::all().with("hide_heroes", 1)))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_stale_entry_is_bypassed_after_mutation() {
        let (db, clock) = memory_db();
        let day = seed_day(&db);
        let session = db.create_session(day, "A", None).unwrap();
        let photo = db.add_photo(session, &NewPhoto::named("a.jpg")).unwrap();
        let (cache, _store) = cache();
        let views = Views::new(&db, &cache, offset());

        let before = views.gallery(true, false).unwrap();
        assert_eq!(before.session_ids, vec![session]);

        clock.advance(Duration::seconds(1));
        db.set_hero(session, Some(photo)).unwrap();

        let after = views.gallery(true, false).unwrap();
        assert!(after.session_ids.is_empty());
    }

    #[test]
    fn test_restructuring_moves_the_fingerprint() {
        let (db, clock) = memory_db();
        let resolver = resolver();
        let day = seed_day(&db);
        let (a, photos) = session_with_times(&db, &resolver, day, "A", &[0, 1, 2, 3]);
        let (cache, _store) = cache();
        let views = Views::new(&db, &cache, offset());
        let engine = Restructurer::new(&db, &resolver);

        let before = views.stats(false).unwrap();
        assert_eq!(before.summary.total_sessions, 1);

        clock.advance(Duration::seconds(1));
        let b = engine.split(a, photos[2]).unwrap();
        let split = views.stats(false).unwrap();
        assert_eq!(split.summary.total_sessions, 2);

        clock.advance(Duration::seconds(1));
        assert_eq!(engine.merge(a, b.id).moved(), Some(2));
        let merged = views.stats(false).unwrap();
        assert_eq!(merged.summary.total_sessions, 1);
        assert_eq!(merged.summary.total_photos, 4);
    }

    #[test]
    fn test_force_refresh_returns_same_projection() {
        let (db, _clock) = memory_db();
        let day = seed_day(&db);
        db.create_session(day, "A", None).unwrap();
        let (cache, _store) = cache();
        let views = Views::new(&db, &cache, offset()).with_top_sessions(1);

        let cached = views.stats(false).unwrap();
        let forced = views.stats(true).unwrap();
        assert_eq!(cached.serialized_json, forced.serialized_json);
        assert_eq!(forced.top_sessions.len(), 1);
    }
}
