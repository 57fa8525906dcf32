#![warn(missing_docs)]
//! # leonel-quick-app
//!
//! ## Purpose
//! Process-level wiring for `leonel-quick`: configuration, logging, single
//! instance enforcement, protocol registration and event dispatch.
//!
//! ## Responsibilities
//! - Read [`ShellConfig`] from the environment.
//! - Install the per-run log file, the stderr mirror and the panic hook.
//! - Keep one running instance and forward later launches to it.
//! - Register the `leonel-quick://` scheme handler.
//! - Locate the primary display's work area for overlay placement.
//! - Route hotkey, tray, deep-link and window events through [`Dispatcher`].
//!
//! ## Data flow
//! Native callbacks (shortcut, tray, web view, capture worker, instance
//! listener) post [`LaunchEvent`]s to the event loop. The loop hands each one
//! to [`Dispatcher::dispatch`], which drives the window controller and the
//! protocol auth handler on the control thread.
//!
//! ## Ownership and lifetimes
//! The dispatcher is constructed once and owned by the event-loop closure.
//! Background threads only hold event-loop proxies.
//!
//! ## Error model
//! Startup failures are [`AppError`]s. After startup nothing propagates:
//! dispatch is wrapped in [`contain`] so a faulting handler is logged and the
//! process keeps running.
//!
//! ## Security and privacy notes
//! - Deep-link arguments are redacted before logging.
//! - The single-instance socket binds loopback only.
//! - The capture kill switch disables every capture at runtime.

mod config;
mod dispatcher;
mod instance;
mod logging;
mod protocol;
mod shortcut;
mod work_area;

use leonel_quick_capture::CaptureError;
use leonel_quick_core::CoreError;
use leonel_quick_window::WindowError;
use thiserror::Error;

pub use config::{
    DEFAULT_INSTANCE_PORT, ENV_BASE_URL, ENV_CAPTURE_ENABLED, ENV_HOTKEY, ENV_INSTANCE_PORT,
    ENV_LOG_DIR, ShellConfig, capture_enabled_from, capture_enabled_from_env,
};
pub use dispatcher::{Dispatcher, Flow, LaunchEvent, ToggleSource};
pub use instance::{
    InstanceAck, InstanceError, InstanceListener, InstanceMessage, InstanceRole, acquire,
    decode_message, encode_ack, encode_message, forward_args, is_ack,
};
pub use logging::{
    DEFAULT_DIRECTIVE, contain, executable_dir, init_logging, install_panic_hook, log_file_name,
    redact_args,
};
pub use protocol::{open_command, register_protocol_handler, registry_key};
pub use shortcut::{DEFAULT_SHORTCUT, Shortcut, ShortcutKey, tray_tooltip};
pub use work_area::{from_bottom_left_origin, logical_from_physical, system_work_area};

/// Build-time application version loaded from root `VERSION` file.
pub const APP_VERSION: &str = env!("LEONEL_QUICK_VERSION");

/// Returns the app version sourced from root `VERSION`.
pub fn app_version() -> &'static str {
    APP_VERSION
}

/// App integration error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// A configuration value is unusable.
    #[error("config error: {0}")]
    Config(String),
    /// Core model error.
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    /// Capture subsystem error.
    #[error("capture error: {0}")]
    Capture(#[from] CaptureError),
    /// Window subsystem error.
    #[error("window error: {0}")]
    Window(#[from] WindowError),
    /// Single-instance error.
    #[error("instance error: {0}")]
    Instance(#[from] InstanceError),
    /// Logging could not be initialized.
    #[error("logging error: {0}")]
    Logging(String),
    /// Scheme registration failed.
    #[error("protocol registration error: {0}")]
    Protocol(String),
    /// The native shell failed to start.
    #[error("shell error: {0}")]
    Shell(String),
}
