//! Startup configuration read from the environment.

use std::fmt;
use std::path::PathBuf;

use leonel_quick_core::{DEFAULT_BASE_URL, Routes};
use tracing::warn;

use crate::AppError;
use crate::shortcut::{DEFAULT_SHORTCUT, Shortcut};

/// First-party origin override.
pub const ENV_BASE_URL: &str = "LEONEL_QUICK_BASE_URL";
/// Global shortcut override.
pub const ENV_HOTKEY: &str = "LEONEL_QUICK_HOTKEY";
/// Capture kill switch.
pub const ENV_CAPTURE_ENABLED: &str = "LEONEL_QUICK_CAPTURE_ENABLED";
/// Single-instance loopback port.
pub const ENV_INSTANCE_PORT: &str = "LEONEL_QUICK_INSTANCE_PORT";
/// Log directory override.
pub const ENV_LOG_DIR: &str = "LEONEL_QUICK_LOG_DIR";

/// Default single-instance loopback port.
pub const DEFAULT_INSTANCE_PORT: u16 = 47813;

/// Effective shell configuration.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// First-party routes.
    pub routes: Routes,
    /// Global toggle shortcut.
    pub shortcut: Shortcut,
    /// Whether reveals capture the screen.
    pub capture_enabled: bool,
    /// Loopback port for single-instance handoff.
    pub instance_port: u16,
    /// Log directory; `None` means next to the executable.
    pub log_dir: Option<PathBuf>,
}

impl ShellConfig {
    /// Reads the process environment.
    ///
    /// # Errors
    /// Returns [`AppError::Core`] when the base URL override is unusable.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    ///
    /// Bad shortcut or port values fall back to their defaults with a warning.
    ///
    /// # Errors
    /// Returns [`AppError::Core`] when the base URL is unusable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(ENV_BASE_URL).unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let routes = Routes::new(base_url.trim())?;

        let shortcut = match lookup(ENV_HOTKEY) {
            Some(raw) => Shortcut::parse(&raw).or_else(|error| {
                warn!(event = "config.invalid_hotkey", %error, "using default shortcut");
                Shortcut::parse(DEFAULT_SHORTCUT)
            })?,
            None => Shortcut::parse(DEFAULT_SHORTCUT)?,
        };

        let instance_port = match lookup(ENV_INSTANCE_PORT) {
            Some(raw) => match raw.trim().parse::<u16>() {
                Ok(port) if port != 0 => port,
                _ => {
                    warn!(
                        event = "config.invalid_port",
                        value = raw.as_str(),
                        "using default instance port"
                    );
                    DEFAULT_INSTANCE_PORT
                }
            },
            None => DEFAULT_INSTANCE_PORT,
        };

        let log_dir = lookup(ENV_LOG_DIR)
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map(PathBuf::from);

        Ok(Self {
            routes,
            shortcut,
            capture_enabled: capture_enabled_from(lookup(ENV_CAPTURE_ENABLED).as_deref()),
            instance_port,
            log_dir,
        })
    }
}

impl fmt::Display for ShellConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "base_url={} ({ENV_BASE_URL})", self.routes.base())?;
        writeln!(f, "hotkey={} ({ENV_HOTKEY})", self.shortcut)?;
        writeln!(
            f,
            "capture_enabled={} ({ENV_CAPTURE_ENABLED})",
            self.capture_enabled
        )?;
        writeln!(f, "instance_port={} ({ENV_INSTANCE_PORT})", self.instance_port)?;
        match &self.log_dir {
            Some(dir) => write!(f, "log_dir={} ({ENV_LOG_DIR})", dir.display()),
            None => write!(f, "log_dir=<executable dir> ({ENV_LOG_DIR})"),
        }
    }
}

/// Interprets a kill-switch value.
///
/// Semantics:
/// - Unset => capture enabled.
/// - `0`, `false`, `off` (case-insensitive) => capture disabled.
/// - Any other value => capture enabled.
pub fn capture_enabled_from(value: Option<&str>) -> bool {
    match value {
        Some(value) => {
            let normalized = value.trim().to_ascii_lowercase();
            !(normalized == "0" || normalized == "false" || normalized == "off")
        }
        None => true,
    }
}

/// Checks the capture kill switch in the process environment.
pub fn capture_enabled_from_env() -> bool {
    capture_enabled_from(std::env::var(ENV_CAPTURE_ENABLED).ok().as_deref())
}
