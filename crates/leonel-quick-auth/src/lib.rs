#![warn(missing_docs)]
//! # leonel-quick-auth
//!
//! ## Purpose
//! Hands a session token from a `leonel-quick://` deep link into the overlay.
//!
//! ## Responsibilities
//! - Validate the deep-link scheme and extract the `rt` query parameter.
//! - Enforce token length bounds and sanitize the token charset.
//! - Defer deep links that arrive before the window subsystem is ready.
//! - Forward the landing URL to a [`HandoffSink`] (the window controller).
//!
//! ## Data flow
//! OS / second instance -> [`ProtocolAuthHandler::handle`] -> pending slot or
//! [`parse_deep_link`] -> [`Routes::handoff`] URL -> [`HandoffSink::open_handoff`].
//!
//! ## Ownership and lifetimes
//! The handler owns the single pending URL. Tokens live only inside one
//! `handle` call and are dropped once embedded into the navigation URL.
//!
//! ## Error model
//! Each validation step fails closed with a [`DeepLinkError`]. The error is
//! logged and returned inside [`HandoffDisposition::Rejected`]; nothing is
//! shown to the user and nothing is retried.
//!
//! ## Security and privacy notes
//! Token values are never logged. Deep links are logged through
//! [`redact_deep_link`] and tokens by length only.
//!
//! ## Example
//! ```rust
//! use leonel_quick_auth::{parse_deep_link, sanitize_token};
//!
//! let token = parse_deep_link("leonel-quick://auth?rt=abcDEF1234!!!").unwrap();
//! assert_eq!(token.as_str(), "abcDEF1234");
//! assert_eq!(sanitize_token(token.as_str()), "abcDEF1234");
//! ```

use leonel_quick_core::{
    DEEP_LINK_PREFIX, DEEP_LINK_SCHEME, MAX_TOKEN_LEN, MIN_TOKEN_LEN, Routes, TOKEN_QUERY_PARAM,
};
use thiserror::Error;
use tracing::{info, warn};
use url::Url;

/// Token that passed length bounds and charset sanitization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedToken(String);

impl SanitizedToken {
    /// Token text, restricted to `[A-Za-z0-9._-]`.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Token length in characters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false` for a constructed token; present for API symmetry.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Removes every character outside `[A-Za-z0-9._-]`.
pub fn sanitize_token(raw: &str) -> String {
    raw.chars()
        .filter(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-'))
        .collect()
}

/// Validates a deep link and returns its sanitized token.
///
/// # Errors
/// - [`DeepLinkError::NotDeepLink`] when the text lacks the scheme prefix.
/// - [`DeepLinkError::Unparseable`] when URL parsing fails.
/// - [`DeepLinkError::SchemeMismatch`] when the parsed scheme differs.
/// - [`DeepLinkError::MissingToken`] when `rt` is absent.
/// - [`DeepLinkError::TokenLength`] when the raw token is outside bounds.
/// - [`DeepLinkError::SanitizedTooShort`] when sanitization shrinks it below
///   the minimum.
pub fn parse_deep_link(raw: &str) -> Result<SanitizedToken, DeepLinkError> {
    if !raw.starts_with(DEEP_LINK_PREFIX) {
        return Err(DeepLinkError::NotDeepLink);
    }

    let parsed =
        Url::parse(raw).map_err(|error| DeepLinkError::Unparseable(error.to_string()))?;
    if parsed.scheme() != DEEP_LINK_SCHEME {
        return Err(DeepLinkError::SchemeMismatch(parsed.scheme().to_string()));
    }

    let token = parsed
        .query_pairs()
        .find(|(key, _)| key == TOKEN_QUERY_PARAM)
        .map(|(_, value)| value.into_owned())
        .ok_or(DeepLinkError::MissingToken)?;

    let raw_len = token.chars().count();
    if !(MIN_TOKEN_LEN..=MAX_TOKEN_LEN).contains(&raw_len) {
        return Err(DeepLinkError::TokenLength { len: raw_len });
    }

    let sanitized = sanitize_token(&token);
    if sanitized.len() < MIN_TOKEN_LEN {
        return Err(DeepLinkError::SanitizedTooShort {
            len: sanitized.len(),
        });
    }

    Ok(SanitizedToken(sanitized))
}

/// Returns the first argument that looks like a deep link.
pub fn find_deep_link<S: AsRef<str>>(args: &[S]) -> Option<&str> {
    args.iter()
        .map(|arg| -> &str { arg.as_ref() })
        .find(|arg| arg.starts_with(DEEP_LINK_PREFIX))
}

/// Log-safe rendering of a deep link: the query string is replaced.
pub fn redact_deep_link(raw: &str) -> String {
    let head = raw.split_once('?').map_or(raw, |(head, _)| head);
    let mut redacted: String = head.chars().take(96).collect();
    if raw.contains('?') {
        redacted.push_str("?<redacted>");
    }
    redacted
}

/// Single-slot holder for a deep link received before startup completes.
#[derive(Debug, Clone, Default)]
pub struct PendingAuthUrl {
    slot: Option<String>,
}

impl PendingAuthUrl {
    /// Creates an empty slot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `url`, replacing any earlier one.
    ///
    /// # Returns
    /// `true` when an earlier URL was overwritten.
    pub fn stash(&mut self, url: impl Into<String>) -> bool {
        self.slot.replace(url.into()).is_some()
    }

    /// Removes and returns the stored URL.
    pub fn take(&mut self) -> Option<String> {
        self.slot.take()
    }

    /// Returns `true` when a URL is waiting.
    pub fn is_pending(&self) -> bool {
        self.slot.is_some()
    }
}

/// Receiver of a validated handoff; implemented by the window controller.
pub trait HandoffSink {
    /// Ensures a window exists, navigates it to `landing`, reveals and focuses it.
    fn open_handoff(&mut self, landing: Url);
}

impl<F> HandoffSink for F
where
    F: FnMut(Url),
{
    fn open_handoff(&mut self, landing: Url) {
        self(landing)
    }
}

/// What [`ProtocolAuthHandler::handle`] did with a deep link.
#[derive(Debug)]
pub enum HandoffDisposition {
    /// Stored until startup completes.
    Deferred,
    /// Validated and forwarded to the sink.
    Forwarded,
    /// Failed validation; nothing was navigated.
    Rejected(DeepLinkError),
}

/// Deep-link protocol handler with startup deferral.
#[derive(Debug, Clone)]
pub struct ProtocolAuthHandler {
    routes: Routes,
    ready: bool,
    pending: PendingAuthUrl,
}

impl ProtocolAuthHandler {
    /// Creates a handler that defers until [`Self::mark_ready`].
    pub fn new(routes: Routes) -> Self {
        Self {
            routes,
            ready: false,
            pending: PendingAuthUrl::new(),
        }
    }

    /// Returns `true` once startup has completed.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    /// Returns `true` when a deferred deep link is waiting.
    pub fn has_pending(&self) -> bool {
        self.pending.is_pending()
    }

    /// Handles one inbound deep link.
    pub fn handle(&mut self, raw: &str, sink: &mut dyn HandoffSink) -> HandoffDisposition {
        if !self.ready {
            let replaced = self.pending.stash(raw);
            info!(
                event = "auth.deferred",
                url = %redact_deep_link(raw),
                replaced,
                "deep link received before startup; deferring"
            );
            return HandoffDisposition::Deferred;
        }

        self.forward(raw, sink)
    }

    /// Marks startup complete and replays the pending deep link, if any.
    pub fn mark_ready(&mut self, sink: &mut dyn HandoffSink) -> Option<HandoffDisposition> {
        self.ready = true;
        let raw = self.pending.take()?;
        Some(self.forward(&raw, sink))
    }

    fn forward(&self, raw: &str, sink: &mut dyn HandoffSink) -> HandoffDisposition {
        match parse_deep_link(raw) {
            Ok(token) => {
                info!(
                    event = "auth.handoff",
                    token_len = token.len(),
                    "deep link accepted"
                );
                sink.open_handoff(self.routes.handoff(token.as_str()));
                HandoffDisposition::Forwarded
            }
            Err(error) => {
                warn!(
                    event = "auth.rejected",
                    url = %redact_deep_link(raw),
                    %error,
                    "deep link rejected"
                );
                HandoffDisposition::Rejected(error)
            }
        }
    }
}

/// Deep-link validation failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeepLinkError {
    /// Input does not start with the registered scheme prefix.
    #[error("input is not a leonel-quick deep link")]
    NotDeepLink,
    /// URL parsing failed.
    #[error("deep link does not parse: {0}")]
    Unparseable(String),
    /// Parsed scheme differs from the registered one.
    #[error("unexpected scheme: {0}")]
    SchemeMismatch(String),
    /// The `rt` parameter is absent.
    #[error("deep link carries no token")]
    MissingToken,
    /// Raw token length is outside the accepted bounds.
    #[error("token length {len} outside [10, 4096]")]
    TokenLength {
        /// Raw token length.
        len: usize,
    },
    /// Sanitization left fewer characters than required.
    #[error("sanitized token length {len} below 10")]
    SanitizedTooShort {
        /// Sanitized token length.
        len: usize,
    },
}
