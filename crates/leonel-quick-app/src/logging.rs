//! Per-run log file, stderr mirror and panic containment.

use std::fs::{self, File};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use leonel_quick_auth::redact_deep_link;
use leonel_quick_core::DEEP_LINK_PREFIX;
use time::OffsetDateTime;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::AppError;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_DIRECTIVE: &str = "leonel_quick=info";

/// Log file name for a run started at `started`: `<YYYYMMDD_HHMMSS>_log.txt`.
pub fn log_file_name(started: OffsetDateTime) -> String {
    format!(
        "{:04}{:02}{:02}_{:02}{:02}{:02}_log.txt",
        started.year(),
        started.month() as u8,
        started.day(),
        started.hour(),
        started.minute(),
        started.second()
    )
}

/// Directory next to the running executable.
///
/// # Errors
/// Returns [`AppError::Logging`] when the executable path is unknown.
pub fn executable_dir() -> Result<PathBuf, AppError> {
    let exe_path = std::env::current_exe()
        .map_err(|error| AppError::Logging(format!("unable to resolve executable path: {error}")))?;
    exe_path
        .parent()
        .map(Path::to_path_buf)
        .ok_or_else(|| AppError::Logging("executable parent directory is missing".to_string()))
}

/// Installs the global subscriber: a per-run file in `log_dir` plus stderr.
///
/// # Returns
/// Path of the created log file.
///
/// # Errors
/// Returns [`AppError::Logging`] when the file cannot be created or a
/// subscriber is already installed.
pub fn init_logging(log_dir: &Path) -> Result<PathBuf, AppError> {
    fs::create_dir_all(log_dir).map_err(|error| {
        AppError::Logging(format!("unable to create '{}': {error}", log_dir.display()))
    })?;
    let path = log_dir.join(log_file_name(OffsetDateTime::now_utc()));
    let file = File::create(&path).map_err(|error| {
        AppError::Logging(format!("unable to create log file '{}': {error}", path.display()))
    })?;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(file)),
        )
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .map_err(|error| AppError::Logging(error.to_string()))?;

    info!(
        event = "logging.file_created",
        path = %path.display(),
        "per-run log file created"
    );
    Ok(path)
}

/// Routes panics through `tracing` instead of bare stderr.
pub fn install_panic_hook() {
    panic::set_hook(Box::new(|info| {
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        let location = info
            .location()
            .map(|location| format!("{}:{}", location.file(), location.line()))
            .unwrap_or_default();
        error!(event = "process.panic", %location, "panic: {payload}");
    }));
}

/// Runs `f`, logging and swallowing a panic instead of unwinding further.
pub fn contain<T>(stage: &str, f: impl FnOnce() -> T) -> Option<T> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(_) => {
            error!(event = "process.fault_contained", stage, "handler panicked; continuing");
            None
        }
    }
}

/// Argument list safe to log: deep links lose their query.
pub fn redact_args(args: &[String]) -> Vec<String> {
    args.iter()
        .map(|arg| {
            if arg.starts_with(DEEP_LINK_PREFIX) {
                redact_deep_link(arg)
            } else {
                arg.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    //! Unit tests for log naming and fault containment.

    use super::*;

    #[test]
    fn log_file_name_uses_compact_utc_timestamp() {
        let started =
            OffsetDateTime::from_unix_timestamp(1_772_600_767).expect("timestamp in range");
        assert_eq!(log_file_name(started), "20260304_050607_log.txt");
    }

    #[test]
    fn contain_returns_value_or_none() {
        assert_eq!(contain("ok", || 7), Some(7));
        let contained: Option<()> = contain("boom", || panic!("boom"));
        assert!(contained.is_none());
    }
}
