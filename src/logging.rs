//! Tracing setup for the `burstline` binary.
//!
//! Restructuring and ingestion report through `tracing` with the burst ids
//! involved as fields: splits and merges at `info`, rollbacks at `warn`,
//! failed merges at `error`. Cache hits, cache fills and failed EXIF
//! extraction log at `debug`. The library never installs a subscriber.

use anyhow::Result;
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable holding an `EnvFilter` directive.
pub const LOG_ENV: &str = "BURSTLINE_LOG";

/// Our own events at `info`, dependencies only when they warn.
const DEFAULT_DIRECTIVE: &str = "warn,burstline=info";

/// Where the subscriber ended up sending events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogBackend {
    Journald,
    File(PathBuf),
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE))
}

/// `$XDG_DATA_HOME/burstline/logs`, or `./burstline/logs` without one.
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("burstline")
        .join("logs")
}

/// Install the global subscriber. Fails if one is already installed.
///
/// The journal is preferred on Linux. Otherwise events go to a daily
/// rolling `burstline.log` under `log_dir` (or [`default_log_dir`]).
pub fn init(log_dir: Option<PathBuf>) -> Result<LogBackend> {
    #[cfg(target_os = "linux")]
    {
        if let Ok(journald_layer) = tracing_journald::layer() {
            tracing_subscriber::registry()
                .with(env_filter())
                .with(journald_layer)
                .try_init()?;

            tracing::debug!("Logging to journald");
            return Ok(LogBackend::Journald);
        }
    }

    let log_dir = log_dir.unwrap_or_else(default_log_dir);
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "burstline.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The writer thread stops when the guard drops.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .try_init()?;

    tracing::debug!("Logging to {}", log_dir.display());
    Ok(LogBackend::File(log_dir))
}
