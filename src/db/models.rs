//! Row types for the timeline tables.

use anyhow::bail;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// A recurring gathering, e.g. a festival held every year.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub id: i64,
    pub name: String,
    pub year: i32,
}

/// One calendar date of an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Day {
    pub id: i64,
    pub event_id: i64,
    pub name: String,
    pub date: NaiveDate,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagCategory {
    People,
    Activity,
    Location,
    Misc,
}

impl TagCategory {
    pub(crate) fn column(&self) -> &'static str {
        match self {
            TagCategory::People => "tags_people",
            TagCategory::Activity => "tags_activity",
            TagCategory::Location => "tags_location",
            TagCategory::Misc => "tags_misc",
        }
    }
}

impl FromStr for TagCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "people" => Ok(TagCategory::People),
            "activity" => Ok(TagCategory::Activity),
            "location" => Ok(TagCategory::Location),
            "misc" => Ok(TagCategory::Misc),
            other => bail!("unknown tag category: {}", other),
        }
    }
}

/// Free-form session labels, one list per category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTags {
    pub people: Vec<String>,
    pub activity: Vec<String>,
    pub location: Vec<String>,
    pub misc: Vec<String>,
}

impl SessionTags {
    pub fn get(&self, category: TagCategory) -> &[String] {
        match category {
            TagCategory::People => &self.people,
            TagCategory::Activity => &self.activity,
            TagCategory::Location => &self.location,
            TagCategory::Misc => &self.misc,
        }
    }
}

/// A contiguous burst of photos.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: i64,
    pub day_id: i64,
    pub burst_id: String,
    pub number: i64,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub photo_count: i64,
    pub hero_photo_id: Option<i64>,
    pub hidden: bool,
    pub source: Option<String>,
    pub tags: SessionTags,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }
}

/// Bounding box of a detected face, in pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
}

/// Manual portrait crop, in pixels of the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One captured image.
#[derive(Debug, Clone, PartialEq)]
pub struct Photo {
    pub id: i64,
    pub session_id: i64,
    pub filename: String,
    pub position: i64,
    pub rejected: bool,
    pub faces: Option<Vec<BoundingBox>>,
    pub exif: Option<String>,
    /// `DateTimeOriginal` as recorded by the camera, `YYYY:MM:DD HH:MM:SS`.
    pub taken_at: Option<String>,
    pub source_path: Option<String>,
    pub portrait_crop: Option<CropRect>,
    pub updated_at: DateTime<Utc>,
}

impl Photo {
    pub fn face_count(&self) -> usize {
        self.faces.as_ref().map(|f| f.len()).unwrap_or(0)
    }
}

/// Fields needed to insert a photo.
#[derive(Debug, Clone, Default)]
pub struct NewPhoto {
    pub filename: String,
    pub taken_at: Option<String>,
    pub exif: Option<String>,
    pub source_path: Option<String>,
    pub faces: Option<Vec<BoundingBox>>,
}

impl NewPhoto {
    pub fn named(filename: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            ..Self::default()
        }
    }

    pub fn taken_at(mut self, taken_at: impl Into<String>) -> Self {
        self.taken_at = Some(taken_at.into());
        self
    }
}

/// Legacy contact record. Its session link is best effort only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sitting {
    pub id: i64,
    pub session_id: Option<i64>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub hero_photo_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}
