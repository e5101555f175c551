//! Burst photo sessions with a chronology-preserving timeline and
//! fingerprint-keyed aggregate views.

pub mod cache;
pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod ingest;
pub mod logging;
pub mod timeline;
pub mod views;

pub use cache::{fingerprint, CacheStore, MemoryCache, ViewCache, ViewFilter};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use db::{Database, Photo, Session};
pub use error::{RollbackReason, SplitError};
pub use timeline::{CaptureSource, ExifExtractor, MergeOutcome, MetadataExtractor, Restructurer, TimeResolver};
pub use views::{GalleryView, StatsView, Views};
