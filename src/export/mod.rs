use anyhow::{bail, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::db::{format_timestamp, Database};

/// Export format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }

    pub fn from_name(name: &str) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            other => bail!("unknown export format: {}", other),
        }
    }
}

/// Session data for export
#[derive(Debug, Serialize)]
pub struct ExportedSession {
    pub burst_id: String,
    pub day: String,
    pub date: String,
    pub number: i64,
    pub photo_count: i64,
    pub rejected: i64,
    pub hero_photo_id: Option<i64>,
    pub hidden: bool,
    pub source: Option<String>,
    pub started_at: Option<String>,
    pub ended_at: Option<String>,
    pub duration_secs: Option<i64>,
    pub people: Vec<String>,
}

/// Export every session to a file, returning how many were written.
pub fn export_sessions(db: &Database, output_path: &Path, format: ExportFormat) -> Result<usize> {
    let sessions = get_sessions_for_export(db)?;
    let count = sessions.len();

    match format {
        ExportFormat::Json => export_json(&sessions, output_path)?,
        ExportFormat::Csv => export_csv(&sessions, output_path)?,
    }

    tracing::info!(count, path = %output_path.display(), "Exported sessions");
    Ok(count)
}

fn get_sessions_for_export(db: &Database) -> Result<Vec<ExportedSession>> {
    let mut stmt = db.connection().prepare(
        r#"
        SELECT session_id, COUNT(*)
        FROM photos
        WHERE rejected = 1
        GROUP BY session_id
        "#,
    )?;
    let rejected: HashMap<i64, i64> = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<_>>()?;

    let mut exported = Vec::new();
    for day in db.all_days()? {
        for session in db.sessions_for_day(day.id)? {
            exported.push(ExportedSession {
                day: day.name.clone(),
                date: day.date.to_string(),
                number: session.number,
                photo_count: session.photo_count,
                rejected: rejected.get(&session.id).copied().unwrap_or(0),
                hero_photo_id: session.hero_photo_id,
                hidden: session.hidden,
                started_at: session.started_at.as_ref().map(format_timestamp),
                ended_at: session.ended_at.as_ref().map(format_timestamp),
                duration_secs: session.duration().map(|d| d.num_seconds()),
                burst_id: session.burst_id,
                source: session.source,
                people: session.tags.people,
            });
        }
    }

    Ok(exported)
}

fn export_json(sessions: &[ExportedSession], output_path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(sessions)?;
    let mut file = File::create(output_path)?;
    file.write_all(json.as_bytes())?;
    Ok(())
}

fn export_csv(sessions: &[ExportedSession], output_path: &Path) -> Result<()> {
    let mut wtr = csv::Writer::from_path(output_path)?;

    wtr.write_record([
        "burst_id",
        "day",
        "date",
        "number",
        "photo_count",
        "rejected",
        "hero_photo_id",
        "hidden",
        "source",
        "started_at",
        "ended_at",
        "duration_secs",
        "people",
    ])?;

    for session in sessions {
        wtr.write_record([
            &session.burst_id,
            &session.day,
            &session.date,
            &session.number.to_string(),
            &session.photo_count.to_string(),
            &session.rejected.to_string(),
            &session.hero_photo_id.map(|v| v.to_string()).unwrap_or_default(),
            &session.hidden.to_string(),
            session.source.as_deref().unwrap_or(""),
            session.started_at.as_deref().unwrap_or(""),
            session.ended_at.as_deref().unwrap_or(""),
            &session.duration_secs.map(|v| v.to_string()).unwrap_or_default(),
            &session.people.join(";"),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
