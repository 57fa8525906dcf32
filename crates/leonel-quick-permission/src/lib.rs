#![warn(missing_docs)]
//! # leonel-quick-permission
//!
//! ## Purpose
//! Reports the platform screen-capture authorization state.
//!
//! ## Responsibilities
//! - Define a probe trait that answers "may this process capture the screen".
//! - Provide the system probe (macOS TCC query, granted elsewhere).
//! - Provide a static probe for tests and headless runs.
//! - Surface the native permission prompt once at startup.
//!
//! ## Data flow
//! The capture pipeline queries [`PermissionProbe::query`] before touching any
//! screen source. The bridge forwards the same answer to the hosted page as a
//! string via [`ScreenCaptureAuthorization::as_bridge_str`].
//!
//! ## Ownership and lifetimes
//! Probes are shared as `Arc<dyn PermissionProbe>` between the control thread
//! and the capture worker, hence the `Send + Sync` bound.
//!
//! ## Error model
//! Queries never fail. Priming may fail with [`PermissionError`]; callers go
//! through [`prime_once`], which logs and discards the error.
//!
//! ## Security and privacy notes
//! Querying does not trigger any OS dialog. Only [`PermissionProbe::prime`]
//! may show one.

use std::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;
use tracing::{debug, warn};

/// Screen-capture authorization as reported by the OS.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenCaptureAuthorization {
    /// Capture is allowed.
    Granted,
    /// The user refused capture.
    Denied,
    /// The user has not answered the prompt yet.
    NotDetermined,
    /// The platform cannot answer the question.
    UnsupportedPlatform,
}

impl ScreenCaptureAuthorization {
    /// Returns `false` only for an explicit denial.
    pub fn allows_capture(self) -> bool {
        !matches!(self, Self::Denied)
    }

    /// String form handed to the hosted page.
    pub fn as_bridge_str(self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::NotDetermined => "not-determined",
            Self::UnsupportedPlatform => "unknown",
        }
    }
}

/// Source of screen-capture authorization state.
pub trait PermissionProbe: Send + Sync {
    /// Reads the current authorization without side effects.
    fn query(&self) -> ScreenCaptureAuthorization;

    /// Asks the OS to show its permission prompt if it has one.
    ///
    /// # Errors
    /// Returns [`PermissionError::Prompt`] when the OS refuses the request.
    fn prime(&self) -> Result<(), PermissionError>;
}

/// Probe backed by the running operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPermissionProbe;

impl SystemPermissionProbe {
    /// Creates the system probe.
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_os = "macos")]
mod macos {
    #[link(name = "CoreGraphics", kind = "framework")]
    unsafe extern "C" {
        fn CGPreflightScreenCaptureAccess() -> bool;
        fn CGRequestScreenCaptureAccess() -> bool;
    }

    pub(crate) fn preflight() -> bool {
        unsafe {
            // Safety:
            // - Takes no arguments and only reads TCC state.
            CGPreflightScreenCaptureAccess()
        }
    }

    pub(crate) fn request() -> bool {
        unsafe {
            // Safety:
            // - Takes no arguments; shows the system prompt at most once.
            CGRequestScreenCaptureAccess()
        }
    }
}

/// Maps a TCC preflight answer to an authorization state.
///
/// A failed preflight is reported as [`ScreenCaptureAuthorization::Denied`]:
/// without access, capture only yields the desktop wallpaper, so the pipeline
/// must stop before touching any source.
pub fn authorization_from_preflight(granted: bool) -> ScreenCaptureAuthorization {
    if granted {
        ScreenCaptureAuthorization::Granted
    } else {
        ScreenCaptureAuthorization::Denied
    }
}

impl PermissionProbe for SystemPermissionProbe {
    fn query(&self) -> ScreenCaptureAuthorization {
        #[cfg(target_os = "macos")]
        {
            authorization_from_preflight(macos::preflight())
        }

        #[cfg(not(target_os = "macos"))]
        {
            ScreenCaptureAuthorization::Granted
        }
    }

    fn prime(&self) -> Result<(), PermissionError> {
        #[cfg(target_os = "macos")]
        {
            if macos::request() {
                return Ok(());
            }
            Err(PermissionError::Prompt(
                "screen recording access not granted yet".to_string(),
            ))
        }

        #[cfg(not(target_os = "macos"))]
        {
            Ok(())
        }
    }
}

/// Fixed-answer probe for tests and headless runs.
#[derive(Debug)]
pub struct StaticPermissionProbe {
    answer: ScreenCaptureAuthorization,
    queries: AtomicUsize,
    primes: AtomicUsize,
}

impl StaticPermissionProbe {
    /// Creates a probe that always returns `answer`.
    pub fn new(answer: ScreenCaptureAuthorization) -> Self {
        Self {
            answer,
            queries: AtomicUsize::new(0),
            primes: AtomicUsize::new(0),
        }
    }

    /// Number of [`PermissionProbe::query`] calls so far.
    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    /// Number of [`PermissionProbe::prime`] calls so far.
    pub fn prime_count(&self) -> usize {
        self.primes.load(Ordering::SeqCst)
    }
}

impl PermissionProbe for StaticPermissionProbe {
    fn query(&self) -> ScreenCaptureAuthorization {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.answer
    }

    fn prime(&self) -> Result<(), PermissionError> {
        self.primes.fetch_add(1, Ordering::SeqCst);
        match self.answer {
            ScreenCaptureAuthorization::Denied => Err(PermissionError::Prompt(
                "static probe is denied".to_string(),
            )),
            _ => Ok(()),
        }
    }
}

/// Surfaces the OS prompt early; failures are logged and dropped.
pub fn prime_once(probe: &dyn PermissionProbe) {
    match probe.prime() {
        Ok(()) => debug!(event = "permission.prime", "permission prompt primed"),
        Err(error) => warn!(event = "permission.prime", %error, "permission prime failed"),
    }
}

/// Permission layer error type.
#[derive(Debug, Error)]
pub enum PermissionError {
    /// The OS refused or could not show the prompt.
    #[error("permission prompt failed: {0}")]
    Prompt(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for authorization mapping and priming.

    use super::*;

    #[test]
    fn only_denied_blocks_capture() {
        assert!(ScreenCaptureAuthorization::Granted.allows_capture());
        assert!(ScreenCaptureAuthorization::NotDetermined.allows_capture());
        assert!(ScreenCaptureAuthorization::UnsupportedPlatform.allows_capture());
        assert!(!ScreenCaptureAuthorization::Denied.allows_capture());
    }

    #[test]
    fn failed_preflight_is_denied_and_blocks_capture() {
        let refused = authorization_from_preflight(false);
        assert_eq!(refused, ScreenCaptureAuthorization::Denied);
        assert!(!refused.allows_capture());
        assert_eq!(refused.as_bridge_str(), "denied");
        assert_eq!(
            authorization_from_preflight(true),
            ScreenCaptureAuthorization::Granted
        );
    }

    #[test]
    fn bridge_strings_match_page_contract() {
        assert_eq!(ScreenCaptureAuthorization::Granted.as_bridge_str(), "granted");
        assert_eq!(ScreenCaptureAuthorization::Denied.as_bridge_str(), "denied");
        assert_eq!(
            ScreenCaptureAuthorization::NotDetermined.as_bridge_str(),
            "not-determined"
        );
    }

    #[test]
    fn prime_once_swallows_errors() {
        let probe = StaticPermissionProbe::new(ScreenCaptureAuthorization::Denied);
        prime_once(&probe);
        assert_eq!(probe.prime_count(), 1);
        assert_eq!(probe.query_count(), 0);
    }

    #[cfg(not(target_os = "macos"))]
    #[test]
    fn system_probe_grants_without_permission_model() {
        let probe = SystemPermissionProbe::new();
        assert_eq!(probe.query(), ScreenCaptureAuthorization::Granted);
        assert!(probe.prime().is_ok());
    }
}
