//! Capture-time resolution.
//!
//! Cameras disagree about their clocks and none of them record a zone, so a
//! photo's true instant is resolved in order of trust:
//!
//! 1. the stored `DateTimeOriginal`, read as event-local wall clock;
//! 2. `DateTimeOriginal` read from the source file now, remembered on the row;
//! 3. the session start plus `position` frame intervals.
//!
//! The last step always succeeds and grows with `position`, so resolution
//! never fails.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::config::EventConfig;
use crate::db::timeline::remember_taken_at;
use crate::db::{Photo, Session};

/// Source of embedded capture metadata for files on disk.
pub trait MetadataExtractor: Send + Sync {
    /// `DateTimeOriginal` as `YYYY:MM:DD HH:MM:SS`, if the file has one.
    fn capture_time(&self, path: &Path) -> Result<Option<String>>;

    /// Everything worth keeping from the file. Defaults to the capture time.
    fn metadata(&self, path: &Path) -> Result<ExtractedMetadata> {
        Ok(ExtractedMetadata {
            taken_at: self.capture_time(path)?,
            ..ExtractedMetadata::default()
        })
    }
}

/// Fields pulled out of a file's EXIF block.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractedMetadata {
    pub taken_at: Option<String>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
}

/// Reads EXIF with `kamadak-exif`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifExtractor;

impl ExifExtractor {
    pub fn read(&self, path: &Path) -> Result<ExtractedMetadata> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let exif = exif::Reader::new().read_from_container(&mut reader)?;

        let mut metadata = ExtractedMetadata::default();

        if let Some(field) = exif.get_field(exif::Tag::DateTimeOriginal, exif::In::PRIMARY) {
            if let exif::Value::Ascii(ref v) = field.value {
                if let Some(raw) = v.first() {
                    let dt = exif::DateTime::from_ascii(raw)?;
                    metadata.taken_at = Some(format!(
                        "{:04}:{:02}:{:02} {:02}:{:02}:{:02}",
                        dt.year, dt.month, dt.day, dt.hour, dt.minute, dt.second
                    ));
                }
            }
        }

        if let Some(field) = exif.get_field(exif::Tag::Make, exif::In::PRIMARY) {
            metadata.camera_make = Some(field.display_value().to_string().trim_matches('"').to_string());
        }

        if let Some(field) = exif.get_field(exif::Tag::Model, exif::In::PRIMARY) {
            metadata.camera_model = Some(field.display_value().to_string().trim_matches('"').to_string());
        }

        Ok(metadata)
    }
}

impl MetadataExtractor for ExifExtractor {
    fn capture_time(&self, path: &Path) -> Result<Option<String>> {
        Ok(self.read(path)?.taken_at)
    }

    fn metadata(&self, path: &Path) -> Result<ExtractedMetadata> {
        self.read(path)
    }
}

/// Parse a camera wall-clock string. Accepts the EXIF `YYYY:MM:DD` form and
/// the dashed form some tools write back, with optional fractional seconds.
pub fn parse_wall_clock(s: &str) -> Result<NaiveDateTime> {
    let s = s.trim().trim_matches('"');
    NaiveDateTime::parse_from_str(s, "%Y:%m:%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f"))
        .map_err(|e| anyhow!("unparseable capture time {:?}: {}", s, e))
}

/// Which rung of the resolution order produced an instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureSource {
    Embedded,
    Extracted,
    Calculated,
}

pub struct TimeResolver {
    offset: FixedOffset,
    interval: Duration,
    extractor: Option<Box<dyn MetadataExtractor>>,
}

impl TimeResolver {
    pub fn new(offset: FixedOffset, interval: Duration) -> Self {
        Self {
            offset,
            interval,
            extractor: None,
        }
    }

    pub fn from_config(config: &EventConfig) -> Result<Self> {
        Ok(Self::new(config.offset()?, config.interframe_interval()))
    }

    pub fn with_extractor(mut self, extractor: Box<dyn MetadataExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Event-local wall clock to UTC.
    pub fn embedded_instant(&self, taken_at: &str) -> Result<DateTime<Utc>> {
        let naive = parse_wall_clock(taken_at)?;
        let local = self
            .offset
            .from_local_datetime(&naive)
            .single()
            .ok_or_else(|| anyhow!("ambiguous local time {}", naive))?;
        Ok(local.with_timezone(&Utc))
    }

    /// UTC instant as event-local wall clock, in the form
    /// [`parse_wall_clock`] reads back without loss.
    pub fn wall_clock(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.offset)
            .format("%Y:%m:%d %H:%M:%S%.3f")
            .to_string()
    }

    /// `position` frame intervals after `start`, counting from the Unix
    /// epoch when the start is unknown.
    pub fn frame_instant(&self, start: Option<DateTime<Utc>>, position: i64) -> DateTime<Utc> {
        start.unwrap_or(DateTime::<Utc>::UNIX_EPOCH) + self.interval * position as i32
    }

    /// Instant implied by frame position alone.
    pub fn calculated_instant(&self, session: &Session, position: i64) -> DateTime<Utc> {
        self.frame_instant(session.started_at, position)
    }

    /// Best available capture instant of `photo`, which must belong to
    /// `session`. Never fails; problems are logged and the calculated
    /// instant is used.
    pub fn resolve(&self, conn: &Connection, photo: &Photo, session: &Session) -> DateTime<Utc> {
        self.resolve_with_source(conn, photo, session).0
    }

    /// Like [`resolve`](Self::resolve), also reporting which rung answered.
    pub fn resolve_with_source(
        &self,
        conn: &Connection,
        photo: &Photo,
        session: &Session,
    ) -> (DateTime<Utc>, CaptureSource) {
        if let Some(taken_at) = photo.taken_at.as_deref() {
            match self.embedded_instant(taken_at) {
                Ok(instant) => return (instant, CaptureSource::Embedded),
                Err(e) => {
                    tracing::warn!(photo_id = photo.id, "Ignoring embedded capture time: {}", e);
                }
            }
        } else if let Some(instant) = self.extract_and_remember(conn, photo) {
            return (instant, CaptureSource::Extracted);
        }

        (self.calculated_instant(session, photo.position), CaptureSource::Calculated)
    }

    fn extract_and_remember(&self, conn: &Connection, photo: &Photo) -> Option<DateTime<Utc>> {
        let extractor = self.extractor.as_ref()?;
        let path = photo.source_path.as_deref()?;

        let taken_at = match extractor.capture_time(Path::new(path)) {
            Ok(Some(taken_at)) => taken_at,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!(photo_id = photo.id, "Metadata extraction failed for {}: {}", path, e);
                return None;
            }
        };

        let instant = match self.embedded_instant(&taken_at) {
            Ok(instant) => instant,
            Err(e) => {
                tracing::warn!(photo_id = photo.id, "Extracted capture time unusable: {}", e);
                return None;
            }
        };

        if let Err(e) = remember_taken_at(conn, photo.id, &taken_at) {
            tracing::warn!(photo_id = photo.id, "Could not store extracted capture time: {}", e);
        }
        Some(instant)
    }
}
