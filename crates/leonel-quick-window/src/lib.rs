#![warn(missing_docs)]
//! # leonel-quick-window
//!
//! ## Purpose
//! Owns the single overlay window: its lifecycle, placement, navigation and
//! the page bridge.
//!
//! ## Responsibilities
//! - Lazily create the overlay and recreate it after it is destroyed.
//! - Toggle visibility, re-applying canonical bounds on every reveal.
//! - Schedule one capture per reveal and drop results from older reveals.
//! - Redirect sessions that are already signed in to the landing route.
//! - Keep first-party popups in the window and send the rest to the browser.
//! - Serve the page bridge (`window.leonel`).
//!
//! ## Data flow
//! The shell turns native events into calls on [`OverlayController`]: toggle
//! requests, page loads, IPC messages, probe answers and capture completions.
//! The controller drives the window through the [`WindowHost`] /
//! [`OverlaySurface`] seams and hands capture requests to a
//! [`CaptureScheduler`].
//!
//! ## Ownership and lifetimes
//! The controller owns the surface outright and lives on the event-loop
//! thread. The host is borrowed per call so the shell keeps ownership of its
//! event-loop target.
//!
//! ## Error model
//! Operations are total. Window creation failures are logged and leave the
//! controller windowless until the next request. A destroyed window turns
//! every operation into a no-op.
//!
//! ## Security and privacy notes
//! The page only reaches the shell through [`BridgeRequest`]. Frame contents
//! never appear in logs; only sizes do.

mod bridge;
mod surface;

use std::sync::Arc;

use leonel_quick_auth::HandoffSink;
use leonel_quick_capture::{CaptureCompleted, CaptureOutcome, CaptureWorker};
use leonel_quick_core::{
    CapturedFrame, FrameSlot, PAGE_ZOOM, Routes, SlotUpdate, Visibility, default_bounds,
};
use leonel_quick_permission::PermissionProbe;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

pub use bridge::{
    BRIDGE_SCRIPT, BridgeEvent, BridgeRequest, PAGE_CHROME_SCRIPT, dispatch_script, parse_request,
};
pub use surface::{OverlaySurface, WindowHost, WindowSpec};

/// Accepts capture requests for a reveal cycle.
pub trait CaptureScheduler {
    /// Queues a capture tagged with `cycle`. Must not block.
    fn schedule(&mut self, cycle: u64);
}

impl CaptureScheduler for CaptureWorker {
    fn schedule(&mut self, cycle: u64) {
        if let Err(error) = self.request(cycle) {
            warn!(event = "capture.schedule_failed", cycle, %error, "capture not scheduled");
        }
    }
}

/// Observable window state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// No window yet, or the window is hidden.
    Hidden,
    /// The window is shown.
    Visible,
    /// The controller was shut down; nothing will be created again.
    Destroyed,
}

/// Where a navigation request should open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkTarget {
    /// Load inside the overlay.
    InWindow,
    /// Hand to the default browser.
    External,
}

/// Classifies a new-window request against the first-party origin.
pub fn classify_link(routes: &Routes, url: &Url) -> LinkTarget {
    if routes.is_first_party(url) {
        LinkTarget::InWindow
    } else {
        LinkTarget::External
    }
}

/// State machine for the single overlay window.
pub struct OverlayController<S> {
    routes: Routes,
    permission: Arc<dyn PermissionProbe>,
    scheduler: Box<dyn CaptureScheduler>,
    frames: FrameSlot,
    surface: Option<S>,
    shut_down: bool,
}

impl<S: OverlaySurface> OverlayController<S> {
    /// Creates a windowless controller.
    pub fn new(
        routes: Routes,
        permission: Arc<dyn PermissionProbe>,
        scheduler: Box<dyn CaptureScheduler>,
    ) -> Self {
        Self {
            routes,
            permission,
            scheduler,
            frames: FrameSlot::new(),
            surface: None,
            shut_down: false,
        }
    }

    /// First-party routes this controller navigates to.
    pub fn routes(&self) -> &Routes {
        &self.routes
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        if self.shut_down {
            return Lifecycle::Destroyed;
        }
        match self.visibility() {
            Visibility::Visible => Lifecycle::Visible,
            Visibility::Hidden => Lifecycle::Hidden,
        }
    }

    /// Visibility of the live window; a missing window counts as hidden.
    pub fn visibility(&self) -> Visibility {
        match &self.surface {
            Some(surface) if surface.is_alive() && surface.is_visible() => Visibility::Visible,
            _ => Visibility::Hidden,
        }
    }

    /// Live window, if any.
    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref().filter(|surface| surface.is_alive())
    }

    /// Frame captured for the current reveal.
    pub fn current_frame(&self) -> Option<&CapturedFrame> {
        self.frames.current()
    }

    /// Current reveal cycle.
    pub fn cycle(&self) -> u64 {
        self.frames.cycle()
    }

    /// Creates the window if needed. Returns `false` when none is available.
    pub fn ensure_window<H>(&mut self, host: &mut H) -> bool
    where
        H: WindowHost<Surface = S>,
    {
        if self.shut_down {
            return false;
        }
        if self.live_surface().is_some() {
            return true;
        }

        let spec = WindowSpec::overlay(
            default_bounds(host.primary_work_area()),
            self.routes.login().clone(),
        );
        match host.create_surface(&spec) {
            Ok(surface) => {
                info!(
                    event = "window.created",
                    x = spec.bounds.x,
                    y = spec.bounds.y,
                    "overlay window created"
                );
                self.surface = Some(surface);
                true
            }
            Err(error) => {
                warn!(event = "window.create_failed", %error, "overlay window not created");
                false
            }
        }
    }

    /// Hides a visible overlay, otherwise reveals it and starts a capture.
    pub fn toggle<H>(&mut self, host: &mut H)
    where
        H: WindowHost<Surface = S>,
    {
        if !self.ensure_window(host) {
            return;
        }
        match self.visibility() {
            Visibility::Visible => self.hide(),
            Visibility::Hidden => self.reveal(host),
        }
    }

    /// Reveals the overlay; a visible overlay only regains focus.
    pub fn show<H>(&mut self, host: &mut H)
    where
        H: WindowHost<Surface = S>,
    {
        if !self.ensure_window(host) {
            return;
        }
        match self.visibility() {
            Visibility::Visible => {
                if let Some(surface) = self.live_surface() {
                    surface.focus();
                }
            }
            Visibility::Hidden => self.reveal(host),
        }
    }

    /// Hides the overlay. No-op when hidden or destroyed.
    pub fn hide(&mut self) {
        let Some(surface) = self.live_surface() else {
            return;
        };
        if surface.is_visible() {
            surface.hide();
            info!(event = "window.hidden", "overlay hidden");
        }
    }

    fn reveal<H>(&mut self, host: &mut H)
    where
        H: WindowHost<Surface = S>,
    {
        let bounds = default_bounds(host.primary_work_area());
        let reapply = host.reapplies_bounds_after_show();
        let Some(surface) = self.live_surface() else {
            return;
        };

        surface.set_bounds(bounds);
        surface.show();
        surface.focus();
        if reapply {
            surface.set_bounds(bounds);
            surface.set_skip_taskbar(true);
        }

        let cycle = self.frames.begin_cycle();
        info!(event = "window.shown", cycle, "overlay revealed");
        self.scheduler.schedule(cycle);
    }

    /// Loads `url` in the live window.
    pub fn navigate(&mut self, url: &Url) {
        if let Some(surface) = self.live_surface() {
            debug!(event = "window.navigate", path = url.path(), "loading url");
            surface.load_url(url);
        }
    }

    /// Loads the login route; used by the tray "Reload" entry.
    pub fn reload(&mut self) {
        let login = self.routes.login().clone();
        self.navigate(&login);
    }

    /// Navigates to a validated handoff URL and reveals the overlay.
    pub fn open_handoff<H>(&mut self, host: &mut H, landing: &Url)
    where
        H: WindowHost<Surface = S>,
    {
        if !self.ensure_window(host) {
            return;
        }
        self.navigate(landing);
        self.show(host);
    }

    /// Routes a popup request. The popup itself is always refused.
    pub fn on_new_window_request<H>(&mut self, host: &mut H, raw: &str)
    where
        H: WindowHost<Surface = S>,
    {
        let Ok(url) = Url::parse(raw) else {
            warn!(event = "window.popup_unparseable", "ignoring unparseable popup url");
            return;
        };
        match classify_link(&self.routes, &url) {
            LinkTarget::InWindow => self.navigate(&url),
            LinkTarget::External => {
                info!(
                    event = "window.open_external",
                    host = url.host_str().unwrap_or(""),
                    "opening in default browser"
                );
                host.open_external(&url);
            }
        }
    }

    /// Full page load finished: apply zoom and chrome, then check the session.
    pub fn on_page_loaded(&mut self) {
        let Some(surface) = self.live_surface() else {
            return;
        };
        surface.set_zoom(PAGE_ZOOM);
        surface.run_script(PAGE_CHROME_SCRIPT);
        self.check_session_redirect();
    }

    /// Same-document navigation happened: re-check the session.
    pub fn on_in_page_navigation(&mut self) {
        self.check_session_redirect();
    }

    fn check_session_redirect(&mut self) {
        let routes = self.routes.clone();
        let Some(surface) = self.live_surface() else {
            return;
        };
        if surface
            .current_url()
            .is_some_and(|current| routes.is_landing(&current))
        {
            return;
        }
        surface.request_session_probe();
    }

    /// Answer of the session probe; redirects to the landing route on `true`.
    pub fn on_session_probe(&mut self, has_session: bool) {
        if !has_session {
            return;
        }
        let landing = self.routes.landing().clone();
        let routes = self.routes.clone();
        let Some(surface) = self.live_surface() else {
            return;
        };
        if surface
            .current_url()
            .is_some_and(|current| routes.is_landing(&current))
        {
            return;
        }
        info!(event = "window.session_redirect", "session found; opening landing route");
        surface.load_url(&landing);
    }

    /// Applies a capture completion and pushes it to the page when current.
    pub fn on_capture_complete(&mut self, completed: CaptureCompleted) {
        let CaptureCompleted { cycle, outcome } = completed;
        if let CaptureOutcome::NoImage(reason) = &outcome {
            debug!(event = "capture.no_image", cycle, ?reason, "reveal without image");
        }
        let frame = outcome.into_frame();

        if self.frames.resolve(cycle, frame) == SlotUpdate::Stale {
            debug!(
                event = "capture.stale",
                cycle,
                current = self.frames.cycle(),
                "dropping capture from an older reveal"
            );
            return;
        }

        let image = self.frames.current().map(|frame| frame.jpeg_base64.clone());
        if let Some(surface) = self.live_surface() {
            surface.send_bridge_event(&BridgeEvent::ScreenshotCaptured { image });
        }
    }

    /// Handles one page bridge request.
    pub fn on_bridge_request(&mut self, request: BridgeRequest) {
        match request {
            BridgeRequest::Hide => self.hide(),
            BridgeRequest::CheckScreenPermission { id } => {
                let value = Value::String(self.permission.query().as_bridge_str().to_string());
                self.reply(id, value);
            }
            BridgeRequest::GetScreenshot { id } => {
                let value = self
                    .frames
                    .current()
                    .map(|frame| Value::String(frame.jpeg_base64.clone()))
                    .unwrap_or(Value::Null);
                self.reply(id, value);
            }
            BridgeRequest::StartDrag => {
                if let Some(surface) = self.live_surface() {
                    surface.start_drag();
                }
            }
            BridgeRequest::InPageNavigation => self.on_in_page_navigation(),
        }
    }

    fn reply(&mut self, id: u64, value: Value) {
        if let Some(surface) = self.live_surface() {
            surface.send_bridge_event(&BridgeEvent::Reply { id, value });
        }
    }

    /// The user asked to close the window: hide it instead.
    pub fn on_close_requested(&mut self) {
        debug!(event = "window.close_intercepted", "close turned into hide");
        self.hide();
    }

    /// The native window is gone; the next request recreates it.
    pub fn on_destroyed(&mut self) {
        if self.surface.take().is_some() {
            info!(event = "window.destroyed", "overlay window destroyed");
        }
    }

    /// Releases the window for good. Every later call is a no-op.
    pub fn shutdown(&mut self) {
        self.shut_down = true;
        self.surface = None;
        info!(event = "window.shutdown", "overlay controller shut down");
    }

    fn live_surface(&mut self) -> Option<&mut S> {
        if self.shut_down {
            return None;
        }
        if self.surface.as_ref().is_some_and(|surface| !surface.is_alive()) {
            self.surface = None;
        }
        self.surface.as_mut()
    }
}

/// Adapts a controller and its host into the deep-link handoff receiver.
pub struct HandoffTarget<'a, S, H> {
    controller: &'a mut OverlayController<S>,
    host: &'a mut H,
}

impl<'a, S, H> HandoffTarget<'a, S, H> {
    /// Pairs a controller with the host it creates windows on.
    pub fn new(controller: &'a mut OverlayController<S>, host: &'a mut H) -> Self {
        Self { controller, host }
    }
}

impl<S, H> HandoffSink for HandoffTarget<'_, S, H>
where
    S: OverlaySurface,
    H: WindowHost<Surface = S>,
{
    fn open_handoff(&mut self, landing: Url) {
        self.controller.open_handoff(self.host, &landing);
    }
}

/// Window layer error type.
#[derive(Debug, Error)]
pub enum WindowError {
    /// The toolkit refused to create the window or its web view.
    #[error("window creation failed: {0}")]
    Create(String),
    /// A bridge message could not be decoded.
    #[error("bridge message rejected: {0}")]
    Bridge(String),
}
