//! Platform seams for the overlay window.
//!
//! [`WindowHost`] creates windows and answers display questions;
//! [`OverlaySurface`] is one live window with its embedded page. The desktop
//! shell implements both on top of the native toolkit; tests use in-memory
//! fakes.

use leonel_quick_core::{Bounds, MAX_SIZE, MIN_SIZE, Size, WorkArea};
use url::Url;

use crate::WindowError;
use crate::bridge::{self, BridgeEvent};

/// Construction parameters for the overlay window.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowSpec {
    /// Initial position and size.
    pub bounds: Bounds,
    /// Smallest user-resizable size.
    pub min_size: Size,
    /// Largest user-resizable size.
    pub max_size: Size,
    /// Keep above other windows.
    pub always_on_top: bool,
    /// Draw native title bar and borders.
    pub decorations: bool,
    /// Hide from the taskbar / app switcher.
    pub skip_taskbar: bool,
    /// Page loaded right after creation.
    pub initial_url: Url,
    /// Script injected before any page script on every load.
    pub init_script: &'static str,
}

impl WindowSpec {
    /// Frameless, always-on-top, hidden-from-taskbar overlay.
    pub fn overlay(bounds: Bounds, initial_url: Url) -> Self {
        Self {
            bounds,
            min_size: MIN_SIZE,
            max_size: MAX_SIZE,
            always_on_top: true,
            decorations: false,
            skip_taskbar: true,
            initial_url,
            init_script: bridge::BRIDGE_SCRIPT,
        }
    }
}

/// One live overlay window with its embedded page.
///
/// Every method must be safe to call on a destroyed window; the controller
/// checks [`OverlaySurface::is_alive`] first but the native side may still
/// race with OS teardown.
pub trait OverlaySurface {
    /// Returns `false` once the native window is gone.
    fn is_alive(&self) -> bool;
    /// Returns `true` while shown.
    fn is_visible(&self) -> bool;
    /// Moves and resizes the window.
    fn set_bounds(&mut self, bounds: Bounds);
    /// Shows the window.
    fn show(&mut self);
    /// Hides the window without destroying it.
    fn hide(&mut self);
    /// Gives the window keyboard focus.
    fn focus(&mut self);
    /// Re-asserts taskbar hiding.
    fn set_skip_taskbar(&mut self, skip: bool);
    /// Starts loading `url` in the page.
    fn load_url(&mut self, url: &Url);
    /// URL currently loaded, if known.
    fn current_url(&self) -> Option<Url>;
    /// Sets the page zoom factor.
    fn set_zoom(&mut self, factor: f64);
    /// Begins a native window drag (frameless windows have no title bar).
    fn start_drag(&mut self);
    /// Evaluates a script in the page without waiting for a result.
    fn run_script(&mut self, script: &str);
    /// Evaluates the session probe; the answer comes back later through
    /// [`crate::OverlayController::on_session_probe`].
    fn request_session_probe(&mut self);

    /// Delivers a bridge event to the page.
    fn send_bridge_event(&mut self, event: &BridgeEvent) {
        if let Some(script) = bridge::dispatch_script(event) {
            self.run_script(&script);
        }
    }
}

/// Factory and environment for overlay windows.
pub trait WindowHost {
    /// Concrete window type.
    type Surface: OverlaySurface;

    /// Creates a hidden window and starts loading `spec.initial_url`.
    ///
    /// # Errors
    /// Returns [`WindowError::Create`] when the toolkit refuses.
    fn create_surface(&mut self, spec: &WindowSpec) -> Result<Self::Surface, WindowError>;

    /// Usable area of the primary display.
    fn primary_work_area(&self) -> WorkArea;

    /// Opens `url` with the platform's default handler.
    fn open_external(&mut self, url: &Url);

    /// Whether bounds must be applied again right after `show` (DPI scaling
    /// can defer the first application on Windows).
    fn reapplies_bounds_after_show(&self) -> bool {
        cfg!(windows)
    }
}
