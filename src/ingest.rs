//! Import a burst directory as a new session.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::db::timeline::{
    get_session, insert_photo, insert_session_if_absent, next_session_number, update_session_span,
    NewSession,
};
use crate::db::{Database, NewPhoto};
use crate::timeline::{resolved_in_order, MetadataExtractor, TimeResolver};

/// Image files directly inside `directory`, sorted by filename.
pub fn discover_images(directory: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();

    for entry in WalkDir::new(directory)
        .max_depth(1)
        .follow_links(false)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();

        if path.is_file() {
            if let Some(ext) = path.extension() {
                let ext_lower = ext.to_string_lossy().to_lowercase();
                if extensions.iter().any(|e| e.to_lowercase() == ext_lower) {
                    images.push(path.to_path_buf());
                }
            }
        }
    }

    images.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    Ok(images)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub session_id: i64,
    pub burst_id: String,
    pub photos: usize,
    /// Photos whose file carried a usable `DateTimeOriginal`.
    pub timed: usize,
}

pub struct Ingestor<'a> {
    db: &'a Database,
    resolver: &'a TimeResolver,
    extractor: &'a dyn MetadataExtractor,
    extensions: Vec<String>,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        db: &'a Database,
        resolver: &'a TimeResolver,
        extractor: &'a dyn MetadataExtractor,
        extensions: Vec<String>,
    ) -> Self {
        Self {
            db,
            resolver,
            extractor,
            extensions,
        }
    }

    fn read_photo(&self, path: &Path) -> NewPhoto {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let mut photo = NewPhoto::named(filename);
        photo.source_path = Some(path.to_string_lossy().to_string());

        match self.extractor.metadata(path) {
            Ok(metadata) => {
                photo.taken_at = metadata.taken_at.clone();
                photo.exif = serde_json::to_string(&metadata).ok();
            }
            Err(e) => {
                tracing::debug!(path = %path.display(), "No metadata: {}", e);
            }
        }
        photo
    }

    /// Create a session named after `directory` on `day_id` holding every
    /// image in it, positions following resolved capture order.
    pub fn ingest_directory(
        &self,
        day_id: i64,
        directory: &Path,
        source: Option<&str>,
    ) -> Result<IngestReport> {
        let burst_id = directory
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .with_context(|| format!("{} has no directory name", directory.display()))?;

        let files = discover_images(directory, &self.extensions)?;
        let mut photos: Vec<NewPhoto> = files.iter().map(|path| self.read_photo(path)).collect();

        let embedded: Vec<Option<DateTime<Utc>>> = photos
            .iter()
            .map(|p| p.taken_at.as_deref().and_then(|t| self.resolver.embedded_instant(t).ok()))
            .collect();
        let timed = embedded.iter().flatten().count();

        // Untimed frames count on from the first file's time, or the earliest
        // one found. Once a start is known their instants are written onto the
        // rows so reordering cannot move them.
        let start = embedded
            .first()
            .copied()
            .flatten()
            .or_else(|| embedded.iter().flatten().min().copied());
        let mut ordered: Vec<(DateTime<Utc>, String, usize)> = Vec::with_capacity(photos.len());
        for (index, (photo, instant)) in photos.iter_mut().zip(&embedded).enumerate() {
            let instant = match instant {
                Some(instant) => *instant,
                None => {
                    let calculated = self.resolver.frame_instant(start, index as i64);
                    if start.is_some() {
                        photo.taken_at = Some(self.resolver.wall_clock(calculated));
                    }
                    calculated
                }
            };
            ordered.push((instant, photo.filename.clone(), index));
        }
        // File order is the camera's frame counter; capture times win where
        // they disagree with it.
        ordered.sort();

        // Without any embedded time the span stays unknown.
        let (started_at, ended_at) = match (start, ordered.first(), ordered.last()) {
            (Some(_), Some((first, _, _)), Some((last, _, _))) => (Some(*first), Some(*last)),
            _ => (None, None),
        };

        let tx = self.db.connection().unchecked_transaction()?;
        let now = self.db.now();

        let new = NewSession {
            day_id,
            burst_id: &burst_id,
            number: next_session_number(&tx, day_id)?,
            started_at,
            hidden: false,
            source,
        };
        let Some(session_id) = insert_session_if_absent(&tx, &new, now)? else {
            bail!("burst id {} already exists", burst_id);
        };

        for (position, (_, _, index)) in ordered.iter().enumerate() {
            insert_photo(&tx, session_id, position as i64, &photos[*index], now)?;
        }
        update_session_span(&tx, session_id, started_at, ended_at, photos.len() as i64, now)?;

        let Some(session) = get_session(&tx, session_id)? else {
            bail!("session {} vanished during ingest", session_id);
        };
        let instants = resolved_in_order(&tx, self.resolver, &session)?;
        if !instants.windows(2).all(|w| w[0] <= w[1]) {
            bail!("ingest of {} would leave it out of capture order", burst_id);
        }

        tx.commit()?;

        tracing::info!(
            burst_id = %burst_id,
            photos = photos.len(),
            timed,
            "Ingested burst"
        );
        Ok(IngestReport {
            session_id,
            burst_id,
            photos: photos.len(),
            timed,
        })
    }
}
