#![warn(missing_docs)]
//! # leonel-quick-core
//!
//! ## Purpose
//! Defines the shared data model used across the `leonel-quick` workspace.
//!
//! ## Responsibilities
//! - Resolve the first-party routes (login, authenticated landing, handoff).
//! - Own the overlay geometry policy (default bounds, min/max size).
//! - Hold the single captured frame together with its reveal cycle.
//! - Define the session-probe contract evaluated against the hosted page.
//!
//! ## Data flow
//! The window controller asks [`Routes`] where to navigate and
//! [`default_bounds`] where to place the overlay. Each reveal opens a new
//! cycle in [`FrameSlot`]; capture results for that cycle land in the slot and
//! are read back by the content-layer bridge.
//!
//! ## Ownership and lifetimes
//! Frames own their encoded text (`String`) so they can cross the capture
//! worker boundary without borrowing from it.
//!
//! ## Error model
//! Only route construction can fail and reports [`CoreError`]. Everything else
//! is total.
//!
//! ## Security and privacy notes
//! Frames live in process memory only. Nothing here writes to disk or logs
//! frame contents.
//!
//! ## Example
//! ```rust
//! use leonel_quick_core::{FrameSlot, SlotUpdate};
//!
//! let mut slot = FrameSlot::new();
//! let first = slot.begin_cycle();
//! let second = slot.begin_cycle();
//! assert_eq!(slot.resolve(first, None), SlotUpdate::Stale);
//! assert_eq!(slot.resolve(second, None), SlotUpdate::Applied);
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Custom URL scheme registered for deep links.
pub const DEEP_LINK_SCHEME: &str = "leonel-quick";
/// String prefix every deep link must start with.
pub const DEEP_LINK_PREFIX: &str = "leonel-quick://";
/// Query parameter carrying the raw token in a deep link.
pub const TOKEN_QUERY_PARAM: &str = "rt";
/// Query key used when handing the sanitized token to the landing route.
pub const HANDOFF_QUERY_KEY: &str = "quick_auth";
/// Minimum token length, checked before and after sanitization.
pub const MIN_TOKEN_LEN: usize = 10;
/// Maximum raw token length.
pub const MAX_TOKEN_LEN: usize = 4096;

/// Default first-party origin.
pub const DEFAULT_BASE_URL: &str = "https://leonel.app";
/// Login (default) route path.
pub const LOGIN_ROUTE: &str = "/";
/// Authenticated landing route path.
pub const LANDING_ROUTE: &str = "/exam";
/// Zoom factor applied to every loaded page.
pub const PAGE_ZOOM: f64 = 0.85;

/// Default overlay size.
pub const DEFAULT_SIZE: Size = Size {
    width: 340,
    height: 280,
};
/// Minimum overlay size.
pub const MIN_SIZE: Size = Size {
    width: 300,
    height: 220,
};
/// Maximum overlay size.
pub const MAX_SIZE: Size = Size {
    width: 600,
    height: 500,
};
/// Horizontal offset from the work-area left edge.
pub const OFFSET_FROM_LEFT: i32 = 20;
/// Distance between the overlay top edge and the work-area bottom edge.
pub const OFFSET_FROM_BOTTOM: i32 = 300;

/// Key prefix used by the hosted content's session storage.
pub const SESSION_KEY_PREFIX: &str = "sb-";
/// Marker every session-token key contains.
pub const SESSION_KEY_MARKER: &str = "auth-token";

/// Script evaluated in the hosted page; resolves to the `localStorage` key
/// names (never their values), or an empty array when storage is unreadable.
pub const SESSION_PROBE_SCRIPT: &str = r#"(function() {
  try {
    return Object.keys(window.localStorage);
  } catch (e) {
    return [];
  }
})();"#;

/// Returns `true` when a storage key names a session token.
pub fn is_session_key(key: &str) -> bool {
    key.starts_with(SESSION_KEY_PREFIX) && key.contains(SESSION_KEY_MARKER)
}

/// Interprets the serialized result of [`SESSION_PROBE_SCRIPT`]: `true` when
/// any returned key passes [`is_session_key`].
///
/// Web views differ in how they serialize the result: a JSON array of strings
/// and a JSON string holding that array are both accepted. Anything else
/// counts as "no session".
pub fn parse_probe_result(raw: &str) -> bool {
    let keys = match serde_json::from_str::<serde_json::Value>(raw.trim()) {
        Ok(serde_json::Value::String(inner)) => serde_json::from_str::<Vec<String>>(&inner),
        Ok(value) => serde_json::from_value::<Vec<String>>(value),
        Err(error) => Err(error),
    };
    keys.is_ok_and(|keys| keys.iter().any(|key| is_session_key(key)))
}

/// Width and height in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    /// Width in logical pixels.
    pub width: u32,
    /// Height in logical pixels.
    pub height: u32,
}

/// Window position and size in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounds {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

/// Usable area of the primary display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkArea {
    /// Left edge.
    pub x: i32,
    /// Top edge.
    pub y: i32,
    /// Width.
    pub width: u32,
    /// Height.
    pub height: u32,
}

/// Computes canonical overlay bounds for a work area.
pub fn default_bounds(work_area: WorkArea) -> Bounds {
    let height = i32::try_from(work_area.height).unwrap_or(i32::MAX);
    let bottom = work_area.y.saturating_add(height);
    Bounds {
        x: work_area.x.saturating_add(OFFSET_FROM_LEFT),
        y: bottom.saturating_sub(OFFSET_FROM_BOTTOM),
        width: DEFAULT_SIZE.width,
        height: DEFAULT_SIZE.height,
    }
}

/// Overlay visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Window exists (or will be created) but is not shown.
    Hidden,
    /// Window is shown.
    Visible,
}

/// First-party navigation targets derived from one base origin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routes {
    base: Url,
    login: Url,
    landing: Url,
}

impl Routes {
    /// Builds routes from a base origin.
    ///
    /// # Errors
    /// Returns [`CoreError::InvalidBaseUrl`] when the URL does not parse, is not
    /// HTTPS, or has no host.
    pub fn new(base: &str) -> Result<Self, CoreError> {
        let base = Url::parse(base)
            .map_err(|error| CoreError::InvalidBaseUrl(format!("{base}: {error}")))?;
        if base.scheme() != "https" {
            return Err(CoreError::InvalidBaseUrl(
                "base url must use https".to_string(),
            ));
        }
        if base.host_str().is_none() {
            return Err(CoreError::InvalidBaseUrl(
                "base url must have a host".to_string(),
            ));
        }

        let login = base
            .join(LOGIN_ROUTE)
            .map_err(|error| CoreError::InvalidBaseUrl(error.to_string()))?;
        let landing = base
            .join(LANDING_ROUTE)
            .map_err(|error| CoreError::InvalidBaseUrl(error.to_string()))?;

        Ok(Self {
            base,
            login,
            landing,
        })
    }

    /// First-party origin.
    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Default/login route.
    pub fn login(&self) -> &Url {
        &self.login
    }

    /// Authenticated landing route.
    pub fn landing(&self) -> &Url {
        &self.landing
    }

    /// Landing route with the sanitized token as a URL-encoded query value.
    pub fn handoff(&self, sanitized_token: &str) -> Url {
        let mut url = self.landing.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair(HANDOFF_QUERY_KEY, sanitized_token);
        url
    }

    /// Returns `true` when `url` is already on the landing route.
    pub fn is_landing(&self, url: &Url) -> bool {
        self.is_first_party(url)
            && (url.path() == LANDING_ROUTE || url.path().starts_with("/exam/"))
    }

    /// Returns `true` for the base host and its subdomains over HTTPS.
    pub fn is_first_party(&self, url: &Url) -> bool {
        let (Some(host), Some(base_host)) = (url.host_str(), self.base.host_str()) else {
            return false;
        };
        url.scheme() == "https"
            && (host == base_host
                || host
                    .strip_suffix(base_host)
                    .is_some_and(|prefix| prefix.ends_with('.')))
    }
}

/// One encoded still image of the primary display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedFrame {
    /// JPEG bytes in standard base64.
    pub jpeg_base64: String,
    /// Size of the JPEG before base64 encoding.
    pub encoded_len: usize,
    /// Encoded image width.
    pub width: u32,
    /// Encoded image height.
    pub height: u32,
}

/// Result of applying a capture completion to the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotUpdate {
    /// The completion belongs to the current reveal and replaced the slot.
    Applied,
    /// The completion belongs to an older reveal and was dropped.
    Stale,
}

/// Latest-wins holder for the single captured frame.
#[derive(Debug, Clone, Default)]
pub struct FrameSlot {
    cycle: u64,
    frame: Option<CapturedFrame>,
}

impl FrameSlot {
    /// Creates an empty slot at cycle zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new reveal cycle and invalidates the previous frame.
    ///
    /// # Returns
    /// The cycle number capture completions must carry to be accepted.
    pub fn begin_cycle(&mut self) -> u64 {
        self.cycle = self.cycle.saturating_add(1);
        self.frame = None;
        self.cycle
    }

    /// Applies a capture completion.
    ///
    /// A `None` frame for the current cycle clears the slot; it never keeps an
    /// older image around.
    pub fn resolve(&mut self, cycle: u64, frame: Option<CapturedFrame>) -> SlotUpdate {
        if cycle != self.cycle {
            return SlotUpdate::Stale;
        }
        self.frame = frame;
        SlotUpdate::Applied
    }

    /// Current reveal cycle.
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    /// Frame for the current cycle, if one was captured.
    pub fn current(&self) -> Option<&CapturedFrame> {
        self.frame.as_ref()
    }
}

/// Core model error type.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Base URL is unusable for first-party routing.
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for routing, geometry, and frame-slot rules.

    use super::*;

    fn routes() -> Routes {
        Routes::new(DEFAULT_BASE_URL).expect("default base url should parse")
    }

    fn frame(tag: &str) -> CapturedFrame {
        CapturedFrame {
            jpeg_base64: tag.to_string(),
            encoded_len: 6_000,
            width: 1920,
            height: 1080,
        }
    }

    #[test]
    fn routes_resolve_login_and_landing() {
        let routes = routes();
        assert_eq!(routes.login().as_str(), "https://leonel.app/");
        assert_eq!(routes.landing().as_str(), "https://leonel.app/exam");
        assert_eq!(
            routes.handoff("abcDEF1234").as_str(),
            "https://leonel.app/exam?quick_auth=abcDEF1234"
        );
    }

    #[test]
    fn routes_reject_plain_http() {
        assert!(Routes::new("http://leonel.app").is_err());
        assert!(Routes::new("not a url").is_err());
    }

    #[test]
    fn first_party_accepts_subdomains_only() {
        let routes = routes();
        let ok = Url::parse("https://auth.leonel.app/x").expect("url");
        let lookalike = Url::parse("https://evilleonel.app/").expect("url");
        let external = Url::parse("https://example.com/leonel.app").expect("url");
        assert!(routes.is_first_party(&ok));
        assert!(!routes.is_first_party(&lookalike));
        assert!(!routes.is_first_party(&external));
    }

    #[test]
    fn landing_detection_ignores_query() {
        let routes = routes();
        let landing = Url::parse("https://leonel.app/exam?quick_auth=x").expect("url");
        let nested = Url::parse("https://leonel.app/exam/42").expect("url");
        let other = Url::parse("https://leonel.app/examples").expect("url");
        assert!(routes.is_landing(&landing));
        assert!(routes.is_landing(&nested));
        assert!(!routes.is_landing(&other));
    }

    #[test]
    fn default_bounds_anchor_bottom_left() {
        let bounds = default_bounds(WorkArea {
            x: 0,
            y: 25,
            width: 1440,
            height: 875,
        });
        assert_eq!(
            bounds,
            Bounds {
                x: 20,
                y: 600,
                width: 340,
                height: 280,
            }
        );
    }

    #[test]
    fn default_bounds_saturate_on_oversized_work_area() {
        let bounds = default_bounds(WorkArea {
            x: 0,
            y: 0,
            width: 1920,
            height: u32::MAX,
        });
        assert_eq!(bounds.y, i32::MAX - OFFSET_FROM_BOTTOM);

        let bounds = default_bounds(WorkArea {
            x: 0,
            y: 100,
            width: 1920,
            height: u32::MAX,
        });
        assert_eq!(bounds.y, i32::MAX - OFFSET_FROM_BOTTOM);
    }

    #[test]
    fn failed_capture_clears_previous_frame() {
        let mut slot = FrameSlot::new();
        let cycle = slot.begin_cycle();
        assert_eq!(slot.resolve(cycle, Some(frame("a"))), SlotUpdate::Applied);
        assert!(slot.current().is_some());

        let next = slot.begin_cycle();
        assert!(slot.current().is_none());
        assert_eq!(slot.resolve(next, None), SlotUpdate::Applied);
        assert!(slot.current().is_none());
    }

    #[test]
    fn stale_completion_does_not_replace_current_cycle() {
        let mut slot = FrameSlot::new();
        let old = slot.begin_cycle();
        let current = slot.begin_cycle();
        assert_eq!(slot.resolve(current, Some(frame("new"))), SlotUpdate::Applied);
        assert_eq!(slot.resolve(old, Some(frame("old"))), SlotUpdate::Stale);
        assert_eq!(slot.current().map(|f| f.jpeg_base64.as_str()), Some("new"));
    }

    #[test]
    fn session_key_pattern() {
        assert!(is_session_key("sb-abcd-auth-token"));
        assert!(!is_session_key("auth-token"));
        assert!(!is_session_key("sb-abcd-settings"));
        assert!(SESSION_PROBE_SCRIPT.contains("Object.keys(window.localStorage)"));
    }

    #[test]
    fn probe_result_matches_session_keys_only() {
        assert!(parse_probe_result(r#"["theme","sb-abcd-auth-token"]"#));
        assert!(!parse_probe_result(r#"["theme","sb-abcd-settings"]"#));
        assert!(!parse_probe_result("[]"));
        assert!(parse_probe_result(r#""[\"sb-abcd-auth-token\"]""#));
    }

    #[test]
    fn probe_result_parsing_is_strict() {
        assert!(!parse_probe_result("true"));
        assert!(!parse_probe_result(r#""sb-abcd-auth-token""#));
        assert!(!parse_probe_result(r#"[1, 2]"#));
        assert!(!parse_probe_result(""));
    }
}
