use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use anyhow::{Context, Result, anyhow};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{self, RollingFileAppender},
};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, Layer, filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt,
};
use uuid::Uuid;

use crate::config::{LoggingConfig, LoggingRotation};

const LOG_FILE_PREFIX: &str = "syrinx.log";

pub struct LoggingGuard {
    _worker_guard: WorkerGuard,
    run_id: String,
}

impl LoggingGuard {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }
}

/// Installs the process-wide subscriber: a rolling JSON file layer plus
/// an optional WARN-and-up stderr layer. The returned guard keeps the
/// non-blocking writer alive for the life of the process.
pub fn init_tracing(logging_config: &LoggingConfig) -> Result<LoggingGuard> {
    if logging_config.filter.trim().is_empty() {
        return Err(anyhow!("logging.filter cannot be empty"));
    }

    let log_dir = resolve_log_dir(&logging_config.dir)?;
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create logging directory {}", log_dir.display()))?;
    prune_expired_logs(&log_dir, LOG_FILE_PREFIX, logging_config.retention_days);

    let appender = build_rolling_appender(&log_dir, &logging_config.rotation);
    let (non_blocking_writer, worker_guard) = tracing_appender::non_blocking(appender);
    let env_filter = build_env_filter(&logging_config.filter)?;

    let file_layer = fmt::layer()
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .with_ansi(false)
        .with_writer(non_blocking_writer)
        .with_filter(env_filter);

    let stderr_layer = logging_config.stderr_warn_enabled.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_filter(LevelFilter::WARN)
    });

    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("failed to initialize tracing subscriber")?;

    let run_id = Uuid::now_v7().to_string();
    tracing::info!(
        target: "logging",
        run_id = %run_id,
        dir = %log_dir.display(),
        filter = %logging_config.filter,
        "tracing_initialized"
    );

    Ok(LoggingGuard {
        _worker_guard: worker_guard,
        run_id,
    })
}

fn build_env_filter(filter: &str) -> Result<EnvFilter> {
    EnvFilter::try_new(filter)
        .with_context(|| format!("failed to parse logging.filter '{}'", filter))
}

fn build_rolling_appender(log_dir: &Path, rotation: &LoggingRotation) -> RollingFileAppender {
    match rotation {
        LoggingRotation::Daily => rolling::daily(log_dir, LOG_FILE_PREFIX),
        LoggingRotation::Hourly => rolling::hourly(log_dir, LOG_FILE_PREFIX),
    }
}

fn resolve_log_dir(dir: &Path) -> Result<PathBuf> {
    if dir.is_absolute() {
        return Ok(dir.to_path_buf());
    }
    Ok(std::env::current_dir()
        .context("failed to read current working directory for logging.dir resolution")?
        .join(dir))
}

fn prune_expired_logs(log_dir: &Path, prefix: &str, retention_days: usize) {
    prune_expired_logs_at(log_dir, prefix, retention_days, SystemTime::now());
}

/// Best-effort removal of rotated files older than the retention
/// window; failures are reported on stderr because tracing is not
/// installed yet when this runs.
fn prune_expired_logs_at(log_dir: &Path, prefix: &str, retention_days: usize, now: SystemTime) {
    let retention = Duration::from_secs(retention_days.saturating_mul(24 * 60 * 60) as u64);
    let cutoff = now.checked_sub(retention).unwrap_or(SystemTime::UNIX_EPOCH);

    let Ok(entries) = fs::read_dir(log_dir) else {
        return;
    };
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        if !file_name.to_string_lossy().starts_with(prefix) {
            continue;
        }
        let expired = entry
            .metadata()
            .ok()
            .filter(|metadata| metadata.is_file())
            .and_then(|metadata| metadata.modified().ok())
            .is_some_and(|modified| modified <= cutoff);
        if expired && let Err(err) = fs::remove_file(entry.path()) {
            eprintln!(
                "failed to remove expired log file {}: {err}",
                entry.path().display()
            );
        }
    }
}
