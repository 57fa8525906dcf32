#![warn(missing_docs)]
//! # leonel-quick-capture
//!
//! ## Purpose
//! Produces one bounded, JPEG-encoded still image of the primary display each
//! time the overlay is revealed.
//!
//! ## Responsibilities
//! - Define a backend-agnostic screen source trait.
//! - Expose real screen sources on supported desktop targets.
//! - Expose deterministic synthetic sources for CI and unit tests.
//! - Gate capture on permission, encode, and enforce size bounds.
//! - Run captures on a background worker so reveals never wait on them.
//!
//! ## Data flow
//! Reveal -> [`CaptureWorker::request`] -> worker thread runs
//! [`ScreenshotCapturer::capture`] -> permission check -> first source
//! thumbnail -> JPEG -> size gate -> base64 [`CapturedFrame`] ->
//! [`CaptureCompleted`] handed to the notifier.
//!
//! ## Ownership and lifetimes
//! Thumbnails and encoded frames are owned buffers. Providers and probes are
//! shared through `Arc` so the worker can outlive the caller's stack frame.
//!
//! ## Error model
//! Backend and encoder failures are [`CaptureError`] values internally. At the
//! public boundary every failure degrades to [`CaptureOutcome::NoImage`].
//!
//! ## Security and privacy notes
//! Frames are never written to disk and never logged; only sizes are.

mod worker;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use base64::Engine as _;
use leonel_quick_core::CapturedFrame;
use leonel_quick_permission::PermissionProbe;
use thiserror::Error;
use tracing::debug;

pub use worker::{CaptureCompleted, CaptureWorker};

/// Requested thumbnail size.
pub const CAPTURE_REQUEST_SIZE: ThumbnailSize = ThumbnailSize {
    width: 1920,
    height: 1080,
};
/// JPEG quality used for captured frames.
pub const JPEG_QUALITY: u8 = 70;
/// Smallest plausible encoded frame; anything smaller is treated as blank.
pub const MIN_ENCODED_BYTES: usize = 5_000;
/// Largest encoded frame handed to the content layer.
pub const MAX_ENCODED_BYTES: usize = 5 * 1024 * 1024;

/// Metadata describing one capturable screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceInfo {
    /// Stable source identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Native width in pixels.
    pub width: u32,
    /// Native height in pixels.
    pub height: u32,
    /// Whether this is the primary display.
    pub is_primary: bool,
}

/// Target box a thumbnail is scaled into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbnailSize {
    /// Maximum width.
    pub width: u32,
    /// Maximum height.
    pub height: u32,
}

/// Raw RGBA thumbnail of one source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// RGBA pixels (`width * height * 4` bytes).
    pub rgba: Vec<u8>,
}

impl Thumbnail {
    /// Returns `true` when the thumbnail carries no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.rgba.is_empty()
    }
}

/// Trait implemented by concrete screen source providers.
pub trait SourceProvider: Send + Sync {
    /// Enumerates capturable screens, primary first.
    ///
    /// # Errors
    /// Returns [`CaptureError::Backend`] when the OS query fails.
    fn list_sources(&self) -> Result<Vec<SourceInfo>, CaptureError>;

    /// Captures one source scaled to fit inside `target`.
    ///
    /// # Errors
    /// Returns [`CaptureError::UnknownSource`] for an unknown id and
    /// [`CaptureError::Backend`] for OS failures.
    fn thumbnail(&self, source_id: &str, target: ThumbnailSize)
    -> Result<Thumbnail, CaptureError>;
}

/// Size gate and encoder settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureLimits {
    /// Thumbnail request box.
    pub request: ThumbnailSize,
    /// JPEG quality (1-100).
    pub quality: u8,
    /// Inclusive lower bound on encoded bytes.
    pub min_bytes: usize,
    /// Inclusive upper bound on encoded bytes.
    pub max_bytes: usize,
}

impl Default for CaptureLimits {
    fn default() -> Self {
        Self {
            request: CAPTURE_REQUEST_SIZE,
            quality: JPEG_QUALITY,
            min_bytes: MIN_ENCODED_BYTES,
            max_bytes: MAX_ENCODED_BYTES,
        }
    }
}

/// Why a capture produced no image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoImageReason {
    /// Capture is switched off by configuration.
    Disabled,
    /// The OS reports capture as denied.
    PermissionDenied,
    /// No screen sources were enumerated.
    NoSources,
    /// The first source returned an empty thumbnail.
    EmptyThumbnail,
    /// Encoded image is below the plausibility floor.
    TooSmall {
        /// Encoded size in bytes.
        encoded_len: usize,
    },
    /// Encoded image exceeds the size ceiling.
    TooLarge {
        /// Encoded size in bytes.
        encoded_len: usize,
    },
    /// Backend or encoder failure.
    Failed(String),
}

/// Result of one capture attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// A frame that passed every gate.
    Image(CapturedFrame),
    /// Explicit absence of a frame.
    NoImage(NoImageReason),
}

impl CaptureOutcome {
    /// Returns the frame, discarding the reason for its absence.
    pub fn into_frame(self) -> Option<CapturedFrame> {
        match self {
            Self::Image(frame) => Some(frame),
            Self::NoImage(_) => None,
        }
    }
}

/// Permission-gated, size-bounded screenshot pipeline.
#[derive(Clone)]
pub struct ScreenshotCapturer {
    permission: Arc<dyn PermissionProbe>,
    sources: Arc<dyn SourceProvider>,
    limits: CaptureLimits,
    enabled: bool,
}

impl ScreenshotCapturer {
    /// Creates a capturer with default limits.
    pub fn new(permission: Arc<dyn PermissionProbe>, sources: Arc<dyn SourceProvider>) -> Self {
        Self {
            permission,
            sources,
            limits: CaptureLimits::default(),
            enabled: true,
        }
    }

    /// Overrides size and encoder limits.
    pub fn with_limits(mut self, limits: CaptureLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Applies the capture kill switch.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Active limits.
    pub fn limits(&self) -> CaptureLimits {
        self.limits
    }

    /// Captures the primary display.
    ///
    /// Never fails: every error becomes [`CaptureOutcome::NoImage`].
    pub fn capture(&self) -> CaptureOutcome {
        if !self.enabled {
            return CaptureOutcome::NoImage(NoImageReason::Disabled);
        }
        if !self.permission.query().allows_capture() {
            return CaptureOutcome::NoImage(NoImageReason::PermissionDenied);
        }

        match self.capture_first_source() {
            Ok(outcome) => outcome,
            Err(error) => CaptureOutcome::NoImage(NoImageReason::Failed(error.to_string())),
        }
    }

    fn capture_first_source(&self) -> Result<CaptureOutcome, CaptureError> {
        let sources = self.sources.list_sources()?;
        let Some(source) = sources.first() else {
            return Ok(CaptureOutcome::NoImage(NoImageReason::NoSources));
        };

        let thumbnail = self.sources.thumbnail(&source.id, self.limits.request)?;
        if thumbnail.is_empty() {
            return Ok(CaptureOutcome::NoImage(NoImageReason::EmptyThumbnail));
        }

        let jpeg = encode_jpeg(&thumbnail, self.limits.quality)?;
        let encoded_len = jpeg.len();
        debug!(
            event = "capture.encoded",
            source = %source.id,
            width = thumbnail.width,
            height = thumbnail.height,
            encoded_len,
            "thumbnail encoded"
        );

        if encoded_len < self.limits.min_bytes {
            return Ok(CaptureOutcome::NoImage(NoImageReason::TooSmall {
                encoded_len,
            }));
        }
        if encoded_len > self.limits.max_bytes {
            return Ok(CaptureOutcome::NoImage(NoImageReason::TooLarge {
                encoded_len,
            }));
        }

        Ok(CaptureOutcome::Image(CapturedFrame {
            jpeg_base64: base64::engine::general_purpose::STANDARD.encode(&jpeg),
            encoded_len,
            width: thumbnail.width,
            height: thumbnail.height,
        }))
    }
}

/// Encodes an RGBA thumbnail as JPEG.
///
/// # Errors
/// Returns [`CaptureError::Encode`] for malformed buffers or encoder failures.
pub fn encode_jpeg(thumbnail: &Thumbnail, quality: u8) -> Result<Vec<u8>, CaptureError> {
    let expected = (thumbnail.width as usize) * (thumbnail.height as usize) * 4;
    if thumbnail.rgba.len() != expected {
        return Err(CaptureError::Encode(format!(
            "rgba buffer is {} bytes; expected {expected}",
            thumbnail.rgba.len()
        )));
    }

    let rgb = rgba_to_rgb(&thumbnail.rgba);
    let mut jpeg = Vec::new();
    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut jpeg, quality)
        .encode(
            &rgb,
            thumbnail.width,
            thumbnail.height,
            image::ColorType::Rgb8.into(),
        )
        .map_err(|error| CaptureError::Encode(format!("jpeg encoding failed: {error}")))?;
    Ok(jpeg)
}

fn rgba_to_rgb(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity((rgba.len() / 4) * 3);
    for px in rgba.chunks_exact(4) {
        rgb.extend_from_slice(&px[..3]);
    }
    rgb
}

/// Largest size with the source aspect ratio that fits inside `target`.
///
/// Sources already inside the box keep their size.
pub fn fit_within(width: u32, height: u32, target: ThumbnailSize) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }
    if width <= target.width && height <= target.height {
        return (width, height);
    }

    let x_scale = target.width as f64 / width as f64;
    let y_scale = target.height as f64 / height as f64;
    let scale = x_scale.min(y_scale);
    let fitted_width = ((width as f64 * scale).round() as u32).clamp(1, target.width);
    let fitted_height = ((height as f64 * scale).round() as u32).clamp(1, target.height);
    (fitted_width, fitted_height)
}

fn scale_into(
    width: u32,
    height: u32,
    rgba: Vec<u8>,
    target: ThumbnailSize,
) -> Result<Thumbnail, CaptureError> {
    let (fitted_width, fitted_height) = fit_within(width, height, target);
    if (fitted_width, fitted_height) == (width, height) {
        return Ok(Thumbnail {
            width,
            height,
            rgba,
        });
    }

    let source = image::RgbaImage::from_raw(width, height, rgba).ok_or_else(|| {
        CaptureError::Backend(format!("failed to wrap {width}x{height} rgba buffer"))
    })?;
    let scaled = image::imageops::resize(
        &source,
        fitted_width,
        fitted_height,
        image::imageops::FilterType::Triangle,
    );
    Ok(Thumbnail {
        width: fitted_width,
        height: fitted_height,
        rgba: scaled.into_raw(),
    })
}

/// Real screen sources for supported desktop targets.
///
/// # Notes
/// Screens are re-enumerated for every call; display layout can change while
/// the overlay sits hidden.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealSourceProvider;

impl RealSourceProvider {
    /// Creates the real provider.
    pub fn new() -> Self {
        Self
    }
}

impl SourceProvider for RealSourceProvider {
    fn list_sources(&self) -> Result<Vec<SourceInfo>, CaptureError> {
        #[cfg(any(windows, target_os = "macos"))]
        {
            use screenshots::Screen;

            let screens = Screen::all().map_err(|error| {
                CaptureError::Backend(format!("screen enumeration failed: {error}"))
            })?;

            let mut sources: Vec<SourceInfo> = screens
                .iter()
                .enumerate()
                .map(|(index, screen)| SourceInfo {
                    id: format!("screen-{index}"),
                    name: format!("Screen {}", index + 1),
                    width: screen.display_info.width.max(1) as u32,
                    height: screen.display_info.height.max(1) as u32,
                    is_primary: screen.display_info.is_primary,
                })
                .collect();
            // Stable sort keeps OS order among non-primary screens.
            sources.sort_by_key(|source| !source.is_primary);
            Ok(sources)
        }

        #[cfg(not(any(windows, target_os = "macos")))]
        {
            Err(CaptureError::Backend(
                "screen capture is implemented for Windows and macOS only".to_string(),
            ))
        }
    }

    fn thumbnail(
        &self,
        source_id: &str,
        target: ThumbnailSize,
    ) -> Result<Thumbnail, CaptureError> {
        #[cfg(any(windows, target_os = "macos"))]
        {
            use screenshots::Screen;

            let index = source_id
                .strip_prefix("screen-")
                .and_then(|raw| raw.parse::<usize>().ok())
                .ok_or_else(|| CaptureError::UnknownSource(source_id.to_string()))?;
            let screens = Screen::all().map_err(|error| {
                CaptureError::Backend(format!("screen refresh failed: {error}"))
            })?;
            let screen = screens
                .get(index)
                .ok_or_else(|| CaptureError::UnknownSource(source_id.to_string()))?;

            let captured = screen
                .capture()
                .map_err(|error| CaptureError::Backend(format!("screen capture failed: {error}")))?;
            let width = captured.width();
            let height = captured.height();
            scale_into(width, height, captured.into_raw(), target)
        }

        #[cfg(not(any(windows, target_os = "macos")))]
        {
            let _ = target;
            Err(CaptureError::UnknownSource(source_id.to_string()))
        }
    }
}

/// Pixel content produced by [`SyntheticSourceProvider`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticPattern {
    /// Every channel set to one value; compresses to almost nothing.
    Solid(u8),
    /// Deterministic pseudo-random pixels; compresses poorly.
    Noise(u32),
    /// Zero-sized thumbnail.
    Empty,
}

/// Deterministic source provider for test and CI usage.
#[derive(Debug)]
pub struct SyntheticSourceProvider {
    sources: Vec<SourceInfo>,
    pattern: SyntheticPattern,
    list_calls: AtomicUsize,
    thumbnail_calls: AtomicUsize,
}

impl SyntheticSourceProvider {
    /// One 640x360 primary screen filled with noise.
    pub fn new() -> Self {
        Self::with_sources(
            vec![SourceInfo {
                id: "synthetic-0".to_string(),
                name: "Synthetic Screen".to_string(),
                width: 640,
                height: 360,
                is_primary: true,
            }],
            SyntheticPattern::Noise(7),
        )
    }

    /// Provider with caller-provided sources and pattern.
    pub fn with_sources(sources: Vec<SourceInfo>, pattern: SyntheticPattern) -> Self {
        Self {
            sources,
            pattern,
            list_calls: AtomicUsize::new(0),
            thumbnail_calls: AtomicUsize::new(0),
        }
    }

    /// Number of enumeration calls so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Number of thumbnail calls so far.
    pub fn thumbnail_calls(&self) -> usize {
        self.thumbnail_calls.load(Ordering::SeqCst)
    }
}

impl Default for SyntheticSourceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceProvider for SyntheticSourceProvider {
    fn list_sources(&self) -> Result<Vec<SourceInfo>, CaptureError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.sources.clone())
    }

    fn thumbnail(
        &self,
        source_id: &str,
        target: ThumbnailSize,
    ) -> Result<Thumbnail, CaptureError> {
        self.thumbnail_calls.fetch_add(1, Ordering::SeqCst);
        let source = self
            .sources
            .iter()
            .find(|source| source.id == source_id)
            .ok_or_else(|| CaptureError::UnknownSource(source_id.to_string()))?;

        let rgba_len = (source.width as usize) * (source.height as usize) * 4;
        let rgba = match self.pattern {
            SyntheticPattern::Empty => {
                return Ok(Thumbnail {
                    width: 0,
                    height: 0,
                    rgba: Vec::new(),
                });
            }
            SyntheticPattern::Solid(value) => vec![value; rgba_len],
            SyntheticPattern::Noise(seed) => {
                let mut state = seed.max(1);
                (0..rgba_len)
                    .map(|_| {
                        // xorshift32
                        state ^= state << 13;
                        state ^= state >> 17;
                        state ^= state << 5;
                        (state >> 24) as u8
                    })
                    .collect()
            }
        };

        scale_into(source.width, source.height, rgba, target)
    }
}

/// Capture layer error type.
#[derive(Debug, Error)]
pub enum CaptureError {
    /// Requested source is unknown to the provider.
    #[error("unknown source: {0}")]
    UnknownSource(String),
    /// Backend runtime failure.
    #[error("capture backend failure: {0}")]
    Backend(String),
    /// JPEG encoding failure.
    #[error("encode failure: {0}")]
    Encode(String),
    /// Worker thread could not be started or reached.
    #[error("capture worker failure: {0}")]
    Worker(String),
}

#[cfg(test)]
mod tests {
    //! Unit tests for the capture pipeline gates.

    use leonel_quick_permission::{ScreenCaptureAuthorization, StaticPermissionProbe};

    use super::*;

    fn capturer_with(
        answer: ScreenCaptureAuthorization,
        provider: Arc<SyntheticSourceProvider>,
    ) -> ScreenshotCapturer {
        ScreenshotCapturer::new(Arc::new(StaticPermissionProbe::new(answer)), provider)
    }

    fn solid_provider(width: u32, height: u32) -> Arc<SyntheticSourceProvider> {
        Arc::new(SyntheticSourceProvider::with_sources(
            vec![SourceInfo {
                id: "solid".to_string(),
                name: "Solid".to_string(),
                width,
                height,
                is_primary: true,
            }],
            SyntheticPattern::Solid(200),
        ))
    }

    #[test]
    fn noise_capture_passes_default_gates() {
        let provider = Arc::new(SyntheticSourceProvider::new());
        let outcome = capturer_with(ScreenCaptureAuthorization::Granted, provider).capture();
        let frame = outcome.into_frame().expect("noise frame should pass");
        assert_eq!((frame.width, frame.height), (640, 360));
        assert!(frame.encoded_len >= MIN_ENCODED_BYTES);
        assert!(frame.encoded_len <= MAX_ENCODED_BYTES);

        let decoded = base64::engine::general_purpose::STANDARD
            .decode(frame.jpeg_base64.as_bytes())
            .expect("frame should be valid base64");
        assert_eq!(decoded.len(), frame.encoded_len);
        assert_eq!(&decoded[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn denied_permission_skips_enumeration() {
        let provider = Arc::new(SyntheticSourceProvider::new());
        let outcome =
            capturer_with(ScreenCaptureAuthorization::Denied, provider.clone()).capture();
        assert_eq!(
            outcome,
            CaptureOutcome::NoImage(NoImageReason::PermissionDenied)
        );
        assert_eq!(provider.list_calls(), 0);
        assert_eq!(provider.thumbnail_calls(), 0);
    }

    #[test]
    fn not_determined_permission_still_attempts_capture() {
        let provider = Arc::new(SyntheticSourceProvider::new());
        let outcome =
            capturer_with(ScreenCaptureAuthorization::NotDetermined, provider.clone()).capture();
        assert!(matches!(outcome, CaptureOutcome::Image(_)));
        assert_eq!(provider.list_calls(), 1);
    }

    #[test]
    fn no_sources_yields_no_image() {
        let provider = Arc::new(SyntheticSourceProvider::with_sources(
            Vec::new(),
            SyntheticPattern::Noise(1),
        ));
        let outcome = capturer_with(ScreenCaptureAuthorization::Granted, provider).capture();
        assert_eq!(outcome, CaptureOutcome::NoImage(NoImageReason::NoSources));
    }

    #[test]
    fn empty_thumbnail_yields_no_image() {
        let provider = Arc::new(SyntheticSourceProvider::with_sources(
            SyntheticSourceProvider::new().sources,
            SyntheticPattern::Empty,
        ));
        let outcome = capturer_with(ScreenCaptureAuthorization::Granted, provider).capture();
        assert_eq!(
            outcome,
            CaptureOutcome::NoImage(NoImageReason::EmptyThumbnail)
        );
    }

    #[test]
    fn blank_capture_is_rejected_as_too_small() {
        let outcome =
            capturer_with(ScreenCaptureAuthorization::Granted, solid_provider(64, 64)).capture();
        assert!(matches!(
            outcome,
            CaptureOutcome::NoImage(NoImageReason::TooSmall { encoded_len }) if encoded_len < MIN_ENCODED_BYTES
        ));
    }

    #[test]
    fn oversized_capture_is_rejected() {
        let provider = Arc::new(SyntheticSourceProvider::new());
        let outcome = capturer_with(ScreenCaptureAuthorization::Granted, provider)
            .with_limits(CaptureLimits {
                max_bytes: 10_000,
                ..CaptureLimits::default()
            })
            .capture();
        assert!(matches!(
            outcome,
            CaptureOutcome::NoImage(NoImageReason::TooLarge { encoded_len }) if encoded_len > 10_000
        ));
    }

    #[test]
    fn kill_switch_short_circuits_everything() {
        let provider = Arc::new(SyntheticSourceProvider::new());
        let probe = Arc::new(StaticPermissionProbe::new(ScreenCaptureAuthorization::Granted));
        let outcome = ScreenshotCapturer::new(probe.clone(), provider.clone())
            .with_enabled(false)
            .capture();
        assert_eq!(outcome, CaptureOutcome::NoImage(NoImageReason::Disabled));
        assert_eq!(probe.query_count(), 0);
        assert_eq!(provider.list_calls(), 0);
    }

    #[test]
    fn large_sources_are_scaled_into_request_box() {
        let provider = Arc::new(SyntheticSourceProvider::with_sources(
            vec![SourceInfo {
                id: "wide".to_string(),
                name: "Wide".to_string(),
                width: 400,
                height: 100,
                is_primary: true,
            }],
            SyntheticPattern::Noise(3),
        ));
        let thumbnail = provider
            .thumbnail(
                "wide",
                ThumbnailSize {
                    width: 200,
                    height: 200,
                },
            )
            .expect("thumbnail should scale");
        assert_eq!((thumbnail.width, thumbnail.height), (200, 50));
        assert_eq!(thumbnail.rgba.len(), 200 * 50 * 4);
    }

    #[test]
    fn fit_within_preserves_aspect_ratio() {
        assert_eq!(fit_within(3840, 2160, CAPTURE_REQUEST_SIZE), (1920, 1080));
        assert_eq!(fit_within(2560, 1600, CAPTURE_REQUEST_SIZE), (1728, 1080));
        assert_eq!(fit_within(1280, 720, CAPTURE_REQUEST_SIZE), (1280, 720));
        assert_eq!(fit_within(0, 720, CAPTURE_REQUEST_SIZE), (0, 0));
    }

    #[test]
    fn encode_rejects_malformed_buffers() {
        let thumbnail = Thumbnail {
            width: 2,
            height: 2,
            rgba: vec![0; 3],
        };
        assert!(matches!(
            encode_jpeg(&thumbnail, JPEG_QUALITY),
            Err(CaptureError::Encode(_))
        ));
    }
}
