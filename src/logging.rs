use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use serde::Serialize;
use std::fs;
use std::time::{Duration, SystemTime};
use tracing_appender::rolling::{Builder, Rotation};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Prefix of the rolling diagnostic log (`certman.<date>.log`).
pub const LOG_PREFIX: &str = "certman";

/// Setup logging with a daily rotating file appender.
///
/// Diagnostics go to `<log_dir>/certman.<date>.log`. With `debug_mode` the
/// level is lowered to debug and events are mirrored to stderr so that
/// stdout stays reserved for command output.
///
/// # Returns
/// A guard that must be held for the duration of the program to keep logging active
pub fn setup_logging(
    log_dir: &Utf8Path,
    debug_mode: bool,
) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir))?;

    let file_appender = Builder::new()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix("log")
        .build(log_dir)
        .with_context(|| format!("Failed to open log file in {}", log_dir))?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let env_filter = if debug_mode {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_file(true)
        .with_line_number(true);

    if debug_mode {
        let console_layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .init();
    }

    tracing::info!("Logging initialized: dir={}, debug={}", log_dir, debug_mode);

    Ok(guard)
}

/// Replace everything outside `[A-Za-z0-9_-]` with `_`.
pub fn sanitize_command(command: &str) -> String {
    command
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch
            } else {
                '_'
            }
        })
        .collect()
}

/// Reserve a new per-invocation run log: `<log_dir>/<YYYYmmdd-HHMMSS>_<command>.log`.
///
/// Creates `log_dir` and an empty file at the returned path; the content is
/// written by [`write_command_log`]. Runs started within the same second get
/// `-1`, `-2`, ... appended to the timestamp so no run log replaces another.
pub fn new_run_logfile(log_dir: &Utf8Path, command: &str) -> Result<Utf8PathBuf> {
    fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory: {}", log_dir))?;
    let ts = chrono::Local::now().format("%Y%m%d-%H%M%S").to_string();
    let command = sanitize_command(command);

    for attempt in 0u32.. {
        let name = if attempt == 0 {
            format!("{}_{}.log", ts, command)
        } else {
            format!("{}-{}_{}.log", ts, attempt, command)
        };
        let path = log_dir.join(name);
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(_) => return Ok(path),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to create run log: {}", path));
            }
        }
    }

    anyhow::bail!("No free run log name in {}", log_dir)
}

/// Write `payload` as pretty-printed JSON.
pub fn write_command_log<T: Serialize + ?Sized>(path: &Utf8Path, payload: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(payload).context("Failed to serialize run log")?;
    fs::write(path, json).with_context(|| format!("Failed to write run log: {}", path))?;
    tracing::debug!("Run log written to {}", path);
    Ok(())
}

/// Remove `*.log` files directly under `log_dir` last modified more than
/// `keep_days` days ago. Returns how many were removed.
///
/// A missing directory removes nothing. Files that can't be inspected or
/// removed are skipped.
pub fn cleanup_logs(log_dir: &Utf8Path, keep_days: u32) -> Result<usize> {
    if !log_dir.exists() {
        return Ok(0);
    }

    let cutoff = SystemTime::now()
        .checked_sub(Duration::from_secs(u64::from(keep_days) * 86_400))
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut removed = 0;
    for dir_entry in log_dir
        .read_dir_utf8()
        .with_context(|| format!("Failed to read log directory: {}", log_dir))?
    {
        let Ok(dir_entry) = dir_entry else { continue };
        let path = dir_entry.path();
        if path.extension() != Some("log") {
            continue;
        }

        let modified = match dir_entry.metadata().and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) => {
                tracing::debug!("Skipping {}: {}", path, e);
                continue;
            }
        };
        if modified >= cutoff {
            continue;
        }

        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => tracing::warn!("Could not remove {}: {}", path, e),
        }
    }

    tracing::info!("Removed {} log file(s) older than {} days", removed, keep_days);
    Ok(removed)
}
