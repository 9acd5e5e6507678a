//! Console and rolling file logging for the bridge process.
//!
//! `RUST_LOG` overrides the default filter. Dated files older than a week
//! are pruned at start-up.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "yarpc.log";
const LOG_DIR_ENV: &str = "YARPC_LOG_DIR";
const MAX_LOG_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

// discord-sdk reports every IPC frame at debug
const DEFAULT_FILTER: &str = "info,discord_sdk=warn";

/// Dropping the returned guard flushes and closes the log file.
pub fn init_logging() -> WorkerGuard {
    let log_dir = log_directory();

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX));

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_target(false))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_line_number(true)
                .with_writer(file_writer),
        )
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        dir = %log_dir.display(),
        "yarpc logging to file"
    );

    prune_logs(&log_dir, SystemTime::now());
    guard
}

/// `$YARPC_LOG_DIR`, else `<local data dir>/yarpc/logs`
fn log_directory() -> PathBuf {
    let dir = std::env::var_os(LOG_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("yarpc")
                .join("logs")
        });

    // The subscriber is not up yet
    if let Err(e) = fs_err::create_dir_all(&dir) {
        eprintln!("yarpc: cannot create log directory: {}", e);
    }
    dir
}

fn prune_logs(dir: &Path, now: SystemTime) {
    let expired = match expired_logs(dir, now) {
        Ok(expired) => expired,
        Err(e) => {
            tracing::warn!("Skipping log cleanup: {}", e);
            return;
        }
    };

    for path in expired {
        match fs_err::remove_file(&path) {
            Ok(()) => tracing::debug!("Pruned {}", path.display()),
            Err(e) => tracing::warn!("{}", e),
        }
    }
}

/// Rotated files in `dir` last written more than [`MAX_LOG_AGE`] before `now`.
/// The file the appender is writing to is never returned.
fn expired_logs(dir: &Path, now: SystemTime) -> std::io::Result<Vec<PathBuf>> {
    let cutoff = now.checked_sub(MAX_LOG_AGE).unwrap_or(SystemTime::UNIX_EPOCH);

    let expired = fs_err::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix(LOG_FILE_PREFIX))
                .is_some_and(|suffix| suffix.starts_with('.'))
        })
        .filter(|path| {
            path.metadata()
                .and_then(|meta| meta.modified())
                .is_ok_and(|modified| modified < cutoff)
        })
        .collect();
    Ok(expired)
}
