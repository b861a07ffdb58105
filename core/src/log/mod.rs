//! Logging bootstrap for the gallery.
//!
//! [`crate::GalleryConfig::init_logging`] is the usual entry point: it installs a `tracing`
//! registry writing to a rolling file under the data directory and to stderr, and bridges
//! `log` crate records. Installation happens once per process; later calls hand back the
//! first [`LogHandle`].

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::SystemTime;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::Rotation;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, filter::LevelFilter, util::SubscriberInitExt};

use crate::config::APP_NAME;

/// Variables consulted, in order, for a filter directive.
const FILTER_ENV_VARS: [&str; 2] = ["GALLERY_LOG", "RUST_LOG"];

const DEFAULT_RETENTION: usize = 7;

static LOG_HANDLE: OnceLock<LogHandle> = OnceLock::new();

pub use tracing_subscriber::filter::LevelFilter as LogLevel;

/// How often the log file rolls over.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum LogRolling {
    Hourly,
    Daily,
    Never,
}

impl From<LogRolling> for Rotation {
    fn from(rolling: LogRolling) -> Self {
        match rolling {
            LogRolling::Hourly => Rotation::HOURLY,
            LogRolling::Daily => Rotation::DAILY,
            LogRolling::Never => Rotation::NEVER,
        }
    }
}

/// Where and how much the gallery logs. Built by [`crate::GalleryConfig`].
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub directory: PathBuf,
    /// File name prefix; files end in `.log`.
    pub file_prefix: String,
    /// Number of rolled files to keep. `None` keeps everything.
    pub retention: Option<usize>,
    pub file_level: LevelFilter,
    pub console_level: LevelFilter,
    /// Forward `log` crate records into `tracing`.
    pub capture_log: bool,
    /// Filter directive such as `gallery_core=debug`. Falls back to the environment.
    pub env_filter: Option<String>,
    pub rolling: LogRolling,
}

impl LogConfig {
    /// Defaults for a log directory: debug to file, quieter on the console, a week of files.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        let console_level =
            if cfg!(debug_assertions) { LevelFilter::INFO } else { LevelFilter::WARN };

        Self {
            directory: directory.into(),
            file_prefix: APP_NAME.to_string(),
            retention: Some(DEFAULT_RETENTION),
            file_level: LevelFilter::DEBUG,
            console_level,
            capture_log: true,
            env_filter: None,
            rolling: LogRolling::Daily,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.file_prefix = prefix.into();
        self
    }

    pub fn with_console_level(mut self, level: LevelFilter) -> Self {
        self.console_level = level;
        self
    }

    pub fn with_filter(mut self, directive: impl Into<String>) -> Self {
        self.env_filter = Some(directive.into());
        self
    }

    fn directive(&self) -> String {
        self.env_filter
            .clone()
            .or_else(directive_from_env)
            .unwrap_or_else(|| if cfg!(debug_assertions) { "debug" } else { "info" }.to_string())
    }
}

/// Owns the background writer; dropping it would stop file logging.
#[derive(Debug)]
pub struct LogHandle {
    _guard: WorkerGuard,
    directory: PathBuf,
    file_prefix: String,
}

impl LogHandle {
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn file_prefix(&self) -> &str {
        &self.file_prefix
    }
}

/// Install the global subscriber. Later calls return the first handle and ignore `config`.
pub fn init(config: LogConfig) -> Result<&'static LogHandle> {
    if let Some(handle) = LOG_HANDLE.get() {
        return Ok(handle);
    }

    let handle = install(config)?;
    let _ = LOG_HANDLE.set(handle);
    LOG_HANDLE.get().context("log handle missing after initialisation")
}

fn install(config: LogConfig) -> Result<LogHandle> {
    if config.capture_log {
        let max = to_log_level(config.file_level.max(config.console_level));
        let _ = tracing_log::LogTracer::builder().with_max_level(max).init();
    }

    let filter = env_filter(&config)?;
    let (writer, guard) = file_writer(&config)?;
    subscriber(filter, &config, writer).try_init().map_err(|err| anyhow::anyhow!(err))?;

    Ok(LogHandle { _guard: guard, directory: config.directory, file_prefix: config.file_prefix })
}

/// Create the log directory, prune old files, and start the non-blocking rolling writer.
fn file_writer(config: &LogConfig) -> Result<(NonBlocking, WorkerGuard)> {
    fs::create_dir_all(&config.directory)
        .with_context(|| format!("creating log directory at {}", config.directory.display()))?;

    if let Some(retention) = config.retention.filter(|keep| *keep > 0) {
        prune_old_logs(&config.directory, &config.file_prefix, retention)
            .context("applying log retention policy")?;
    }

    let appender = tracing_appender::rolling::Builder::new()
        .rotation(config.rolling.into())
        .filename_prefix(&config.file_prefix)
        .filename_suffix("log")
        .build(&config.directory)
        .context("creating rolling log appender")?;
    Ok(tracing_appender::non_blocking(appender))
}

fn env_filter(config: &LogConfig) -> Result<EnvFilter> {
    EnvFilter::try_new(config.directive()).context("parsing env filter directive")
}

fn subscriber<W>(
    filter: EnvFilter,
    config: &LogConfig,
    file_writer: W,
) -> impl tracing::Subscriber + Send + Sync + use<W>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer)
        .with_file(true)
        .with_line_number(true)
        .with_filter(config.file_level);
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(config.console_level);

    tracing_subscriber::registry().with(filter).with(file_layer).with(console_layer)
}

fn directive_from_env() -> Option<String> {
    FILTER_ENV_VARS
        .iter()
        .find_map(|var| std::env::var(var).ok())
        .filter(|directive| !directive.trim().is_empty())
}

fn to_log_level(level: LevelFilter) -> ::log::LevelFilter {
    match level {
        LevelFilter::OFF => ::log::LevelFilter::Off,
        LevelFilter::ERROR => ::log::LevelFilter::Error,
        LevelFilter::WARN => ::log::LevelFilter::Warn,
        LevelFilter::INFO => ::log::LevelFilter::Info,
        LevelFilter::DEBUG => ::log::LevelFilter::Debug,
        _ => ::log::LevelFilter::Trace,
    }
}

/// Delete the oldest files starting with `prefix` until `retention` remain.
fn prune_old_logs(dir: &Path, prefix: &str, retention: usize) -> Result<()> {
    let mut logs: Vec<(PathBuf, SystemTime)> = fs::read_dir(dir)
        .with_context(|| format!("reading log directory at {}", dir.display()))?
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| {
            let meta = entry.metadata().ok().filter(|meta| meta.is_file())?;
            let path = entry.path();
            let stem = path.file_stem().and_then(OsStr::to_str)?;
            if !stem.starts_with(prefix) {
                return None;
            }
            Some((path, meta.modified().unwrap_or(SystemTime::UNIX_EPOCH)))
        })
        .collect();

    if logs.len() <= retention {
        return Ok(());
    }

    logs.sort_by_key(|(_, modified)| *modified);
    let excess = logs.len() - retention;
    for (path, _) in logs.into_iter().take(excess) {
        let _ = fs::remove_file(&path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_text(dir: &Path) -> String {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .map(|entry| fs::read_to_string(entry.path()).unwrap_or_default())
            .collect()
    }

    #[test]
    fn file_sink_honours_filter_directive() {
        let temp = tempfile::tempdir().expect("temp dir");
        let mut config = LogConfig::new(temp.path())
            .with_prefix("scoped")
            .with_console_level(LevelFilter::OFF)
            .with_filter("info");
        config.rolling = LogRolling::Never;

        let filter = env_filter(&config).unwrap();
        let (writer, guard) = file_writer(&config).unwrap();
        tracing::subscriber::with_default(subscriber(filter, &config, writer), || {
            tracing::debug!("hidden detail");
            tracing::warn!(entries = 3, "folder vanished");
        });
        drop(guard);

        let text = log_text(temp.path());
        assert!(text.contains("folder vanished"));
        assert!(text.contains("entries=3"));
        assert!(!text.contains("hidden detail"));
    }

    #[test]
    fn invalid_directive_is_reported() {
        let temp = tempfile::tempdir().expect("temp dir");
        let config = LogConfig::new(temp.path()).with_filter("gallery_core=loud");
        assert!(env_filter(&config).is_err());
    }

    #[test]
    fn prune_keeps_newest_files() {
        let temp = tempfile::tempdir().expect("temp dir");
        for name in ["gallery.1.log", "gallery.2.log", "gallery.3.log", "other.log"] {
            fs::write(temp.path().join(name), b"x").unwrap();
        }

        prune_old_logs(temp.path(), "gallery", 2).unwrap();
        let remaining = fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(remaining, 3);
        assert!(temp.path().join("other.log").exists());
    }
}
