//! Statistics bundle for the dashboard.

use anyhow::Result;
use chrono::{FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::db::{Database, Session};

/// Photo-count histogram buckets: inclusive lower bound, inclusive upper
/// bound (`None` for the open top bucket) and label.
const BUCKETS: [(i64, Option<i64>, &str); 6] = [
    (1, Some(5), "1-5"),
    (6, Some(10), "6-10"),
    (11, Some(20), "11-20"),
    (21, Some(50), "21-50"),
    (51, Some(100), "51-100"),
    (101, None, "100+"),
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_sessions: usize,
    pub total_photos: i64,
    pub rejected_photos: i64,
    pub reject_rate: f64,
    pub hero_sessions: usize,
    pub hero_rate: f64,
    pub avg_photos_per_session: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayDetail {
    pub day_id: i64,
    pub name: String,
    pub date: NaiveDate,
    pub sessions: usize,
    pub photos: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub label: String,
    pub min: i64,
    pub max: Option<i64>,
    pub sessions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopSession {
    pub session_id: i64,
    pub burst_id: String,
    pub photo_count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionDuration {
    pub session_id: i64,
    pub seconds: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Durations {
    pub sessions: Vec<SessionDuration>,
    pub average_seconds: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsView {
    pub summary: Summary,
    pub daily_details: Vec<DayDetail>,
    /// Day id to event-local `HH:MM` to number of sessions started in that
    /// minute. Names are in `daily_details`.
    pub daily_timelines: BTreeMap<i64, BTreeMap<String, usize>>,
    pub photo_distribution: Vec<Bucket>,
    pub top_sessions: Vec<TopSession>,
    pub session_durations: Durations,
    /// Everything above as one JSON document, ready to hand to a client.
    pub serialized_json: String,
}

#[derive(Serialize)]
struct StatsDocument<'a> {
    summary: &'a Summary,
    daily_details: &'a [DayDetail],
    daily_timelines: &'a BTreeMap<i64, BTreeMap<String, usize>>,
    photo_distribution: &'a [Bucket],
    top_sessions: &'a [TopSession],
    session_durations: &'a Durations,
}

fn ratio(part: f64, whole: f64) -> f64 {
    if whole == 0.0 {
        0.0
    } else {
        part / whole
    }
}

fn count_rejected(db: &Database, session: &Session) -> Result<i64> {
    let rejected = db.connection().query_row(
        "SELECT COUNT(*) FROM photos WHERE session_id = ? AND rejected = 1",
        [session.id],
        |row| row.get(0),
    )?;
    Ok(rejected)
}

/// Build the statistics bundle over all visible sessions. `offset` places
/// session starts on the event's local clock for the per-minute timelines.
pub fn compute_stats(db: &Database, offset: FixedOffset, top_n: usize) -> Result<StatsView> {
    let mut view = StatsView::default();
    let mut sessions: Vec<Session> = Vec::new();

    for day in db.all_days()? {
        let day_sessions: Vec<Session> = db
            .sessions_for_day(day.id)?
            .into_iter()
            .filter(|s| !s.hidden)
            .collect();

        let mut timeline: BTreeMap<String, usize> = BTreeMap::new();
        for session in &day_sessions {
            if let Some(start) = session.started_at {
                let minute = start.with_timezone(&offset).format("%H:%M").to_string();
                *timeline.entry(minute).or_insert(0) += 1;
            }
        }
        if !timeline.is_empty() {
            view.daily_timelines.insert(day.id, timeline);
        }

        view.daily_details.push(DayDetail {
            day_id: day.id,
            name: day.name,
            date: day.date,
            sessions: day_sessions.len(),
            photos: day_sessions.iter().map(|s| s.photo_count).sum(),
        });
        sessions.extend(day_sessions);
    }

    let summary = &mut view.summary;
    summary.total_sessions = sessions.len();
    for session in &sessions {
        summary.total_photos += session.photo_count;
        summary.rejected_photos += count_rejected(db, session)?;
        if session.hero_photo_id.is_some() {
            summary.hero_sessions += 1;
        }
    }
    summary.reject_rate = ratio(summary.rejected_photos as f64, summary.total_photos as f64);
    summary.hero_rate = ratio(summary.hero_sessions as f64, summary.total_sessions as f64);
    summary.avg_photos_per_session =
        ratio(summary.total_photos as f64, summary.total_sessions as f64);

    view.photo_distribution = BUCKETS
        .iter()
        .map(|(min, max, label)| Bucket {
            label: label.to_string(),
            min: *min,
            max: *max,
            sessions: sessions
                .iter()
                .filter(|s| s.photo_count >= *min && max.map_or(true, |max| s.photo_count <= max))
                .count(),
        })
        .collect();

    let mut ranked: Vec<&Session> = sessions.iter().collect();
    ranked.sort_by(|a, b| b.photo_count.cmp(&a.photo_count).then(a.id.cmp(&b.id)));
    view.top_sessions = ranked
        .into_iter()
        .take(top_n)
        .map(|s| TopSession {
            session_id: s.id,
            burst_id: s.burst_id.clone(),
            photo_count: s.photo_count,
        })
        .collect();

    let durations: Vec<SessionDuration> = sessions
        .iter()
        .filter_map(|s| {
            s.duration().map(|d| SessionDuration {
                session_id: s.id,
                seconds: d.num_seconds(),
            })
        })
        .collect();
    let total: i64 = durations.iter().map(|d| d.seconds).sum();
    view.session_durations = Durations {
        average_seconds: ratio(total as f64, durations.len() as f64),
        sessions: durations,
    };

    view.serialized_json = serde_json::to_string(&StatsDocument {
        summary: &view.summary,
        daily_details: &view.daily_details,
        daily_timelines: &view.daily_timelines,
        photo_distribution: &view.photo_distribution,
        top_sessions: &view.top_sessions,
        session_durations: &view.session_durations,
    })?;

    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::testing::{memory_db, seed_day};
    use crate::db::NewPhoto;
    use chrono::{Duration, TimeZone, Utc};

    fn offset() -> FixedOffset {
        FixedOffset::east_opt(-5 * 3600).unwrap()
    }

    /// Session of `photos` frames starting at 15:00 UTC plus `start_secs`
    /// and lasting `length_secs`.
    fn session_with(db: &Database, day: i64, burst_id: &str, photos: usize, start_secs: i64, length_secs: i64) -> i64 {
        let session = db.create_session(day, burst_id, None).unwrap();
        for i in 0..photos {
            db.add_photo(session, &NewPhoto::named(format!("{}_{}.jpg", burst_id, i)))
                .unwrap();
        }
        let start = Utc.with_ymd_and_hms(2024, 6, 4, 15, 0, 0).unwrap() + Duration::seconds(start_secs);
        db.set_session_span(session, Some(start), Some(start + Duration::seconds(length_secs)))
            .unwrap();
        session
    }

    #[test]
    fn test_stats_bundle() {
        let (db, _clock) = memory_db();
        let day = seed_day(&db);
        let a = session_with(&db, day, "A", 4, 0, 10);
        let b = session_with(&db, day, "B", 12, 20, 30);
        let c = session_with(&db, day, "C", 120, 90, 50);
        let hidden = session_with(&db, day, "H", 7, 0, 5);
        db.set_hidden(hidden, true).unwrap();

        let photo = db.photo_at(a, 0).unwrap().unwrap();
        db.set_rejected(photo.id, true).unwrap();
        db.set_hero(b, Some(db.photo_at(b, 3).unwrap().unwrap().id)).unwrap();

        let stats = compute_stats(&db, offset(), 2).unwrap();

        assert_eq!(stats.summary.total_sessions, 3);
        assert_eq!(stats.summary.total_photos, 136);
        assert_eq!(stats.summary.rejected_photos, 1);
        assert_eq!(stats.summary.hero_sessions, 1);
        assert!((stats.summary.hero_rate - 1.0 / 3.0).abs() < 1e-9);
        assert!((stats.summary.avg_photos_per_session - 136.0 / 3.0).abs() < 1e-9);

        assert_eq!(stats.daily_details.len(), 1);
        assert_eq!(stats.daily_details[0].sessions, 3);
        assert_eq!(stats.daily_details[0].photos, 136);

        let timeline = &stats.daily_timelines[&day];
        assert_eq!(timeline["10:00"], 2);
        assert_eq!(timeline["10:01"], 1);

        let counts: Vec<usize> = stats.photo_distribution.iter().map(|b| b.sessions).collect();
        assert_eq!(counts, vec![1, 0, 1, 0, 0, 1]);

        let top: Vec<i64> = stats.top_sessions.iter().map(|t| t.session_id).collect();
        assert_eq!(top, vec![c, b]);

        assert_eq!(stats.session_durations.sessions.len(), 3);
        assert!((stats.session_durations.average_seconds - 30.0).abs() < 1e-9);

        let blob: serde_json::Value = serde_json::from_str(&stats.serialized_json).unwrap();
        assert_eq!(blob["summary"]["total_photos"], 136);
        assert!(blob.get("serialized_json").is_none());
    }

    #[test]
    fn test_days_of_different_events_are_counted_apart() {
        let (db, _clock) = memory_db();
        let camp_2024 = seed_day(&db);
        let event_2025 = db.create_event("Summer Camp", 2025).unwrap();
        let camp_2025 = db
            .create_day(event_2025, "tuesday", NaiveDate::from_ymd_opt(2025, 6, 3).unwrap())
            .unwrap();
        session_with(&db, camp_2024, "A", 2, 0, 10);
        session_with(&db, camp_2025, "B", 3, 0, 10);

        let stats = compute_stats(&db, offset(), 10).unwrap();

        assert_eq!(stats.daily_details.len(), 2);
        assert_eq!(stats.daily_timelines[&camp_2024]["10:00"], 1);
        assert_eq!(stats.daily_timelines[&camp_2025]["10:00"], 1);

        let blob: serde_json::Value = serde_json::from_str(&stats.serialized_json).unwrap();
        assert_eq!(blob["daily_timelines"][camp_2025.to_string()]["10:00"], 1);
    }

    #[test]
    fn test_stats_on_empty_store() {
        let (db, _clock) = memory_db();
        let stats = compute_stats(&db, offset(), 10).unwrap();

        assert_eq!(stats.summary, Summary::default());
        assert!(stats.daily_details.is_empty());
        assert!(stats.top_sessions.is_empty());
        assert_eq!(stats.photo_distribution.len(), 6);
        assert_eq!(stats.session_durations.average_seconds, 0.0);
    }

    #[test]
    fn test_stats_are_deterministic() {
        let (db, _clock) = memory_db();
        let day = seed_day(&db);
        session_with(&db, day, "A", 3, 0, 5);
        session_with(&db, day, "B", 3, 0, 5);

        let first = compute_stats(&db, offset(), 10).unwrap();
        let second = compute_stats(&db, offset(), 10).unwrap();
        assert_eq!(first.serialized_json, second.serialized_json);
        let ties: Vec<&str> = first.top_sessions.iter().map(|t| t.burst_id.as_str()).collect();
        assert_eq!(ties, vec!["A", "B"]);
    }
}
