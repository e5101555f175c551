use anyhow::Result;
use chrono::{Duration, FixedOffset};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default)]
    pub event: EventConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub restructure: RestructureConfig,

    #[serde(default)]
    pub stats: StatsConfig,

    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventConfig {
    /// Fixed offset of the event's local wall clock from UTC, in minutes.
    /// Cameras record local time without a zone.
    #[serde(default = "default_utc_offset_minutes")]
    pub utc_offset_minutes: i32,

    /// Gap assumed between consecutive frames when a photo has no usable
    /// capture time. Matches the slowest supported burst cadence.
    #[serde(default = "default_interframe_interval_ms")]
    pub interframe_interval_ms: u64,
}

fn default_utc_offset_minutes() -> i32 {
    -5 * 60
}

fn default_interframe_interval_ms() -> u64 {
    500
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: default_utc_offset_minutes(),
            interframe_interval_ms: default_interframe_interval_ms(),
        }
    }
}

impl EventConfig {
    pub fn offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            anyhow::anyhow!("utc_offset_minutes out of range: {}", self.utc_offset_minutes)
        })
    }

    pub fn interframe_interval(&self) -> Duration {
        Duration::milliseconds(self.interframe_interval_ms as i64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Upper bound on how long a projection lives. Fingerprints normally
    /// retire entries long before this.
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    /// How long a computing caller holds the recompute lease before others
    /// give up waiting and compute themselves.
    #[serde(default = "default_race_condition_ttl_secs")]
    pub race_condition_ttl_secs: u64,

    /// Entry limit of the in-process store; least recently used go first.
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

fn default_cache_max_entries() -> usize {
    1000
}

fn default_cache_ttl_secs() -> u64 {
    60 * 60 * 24
}

fn default_race_condition_ttl_secs() -> u64 {
    30
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
            race_condition_ttl_secs: default_race_condition_ttl_secs(),
            max_entries: default_cache_max_entries(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestructureConfig {
    #[serde(default = "default_split_id_max_attempts")]
    pub split_id_max_attempts: u32,
}

fn default_split_id_max_attempts() -> u32 {
    1000
}

impl Default for RestructureConfig {
    fn default() -> Self {
        Self {
            split_id_max_attempts: default_split_id_max_attempts(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    #[serde(default = "default_top_sessions")]
    pub top_sessions: usize,
}

fn default_top_sessions() -> usize {
    10
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            top_sessions: default_top_sessions(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_image_extensions")]
    pub image_extensions: Vec<String>,
}

fn default_image_extensions() -> Vec<String> {
    vec![
        "jpg".to_string(),
        "jpeg".to_string(),
        "png".to_string(),
        "heic".to_string(),
        "cr2".to_string(),
        "nef".to_string(),
        "arw".to_string(),
    ]
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            image_extensions: default_image_extensions(),
        }
    }
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("burstline")
        .join("burstline.db")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            event: EventConfig::default(),
            cache: CacheConfig::default(),
            restructure: RestructureConfig::default(),
            stats: StatsConfig::default(),
            ingest: IngestConfig::default(),
        }
    }
}

impl Config {
    /// Load from `BURSTLINE_CONFIG` or the default location, writing a
    /// default file on first run.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var_os("BURSTLINE_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(Self::config_path);

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            let config = Config::default();
            config.save_to(&config_path)?;
            Ok(config)
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("burstline")
    }

    fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }
}
