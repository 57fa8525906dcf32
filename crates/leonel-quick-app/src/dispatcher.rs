//! Routes process-level events to the window controller and auth handler.

use std::sync::Arc;

use leonel_quick_auth::{HandoffDisposition, ProtocolAuthHandler, find_deep_link};
use leonel_quick_capture::CaptureCompleted;
use leonel_quick_core::Routes;
use leonel_quick_permission::{PermissionProbe, prime_once};
use leonel_quick_window::{
    BridgeRequest, CaptureScheduler, HandoffTarget, OverlayController, OverlaySurface, WindowHost,
};
use tracing::{debug, info};

use crate::logging::redact_args;

/// What asked for a toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleSource {
    /// Global shortcut.
    Hotkey,
    /// Left click on the tray icon.
    TrayClick,
    /// Tray menu "Open".
    TrayMenu,
    /// Another launch without a deep link.
    SecondInstance,
}

/// Event delivered to the control thread.
#[derive(Debug)]
pub enum LaunchEvent {
    /// Show or hide the overlay.
    Toggle(ToggleSource),
    /// Tray menu "Reload": load the login route.
    Reload,
    /// Tray menu "Quit".
    Quit,
    /// Deep link delivered by the OS.
    DeepLink(String),
    /// Argument vector forwarded by a second launch.
    SecondInstance(Vec<String>),
    /// A full page load finished.
    PageLoaded,
    /// Answer of the session probe.
    SessionProbe(bool),
    /// Message from the page bridge.
    Bridge(BridgeRequest),
    /// The page asked to open a new window.
    NewWindow(String),
    /// A capture finished on the worker.
    CaptureCompleted(CaptureCompleted),
    /// The user asked to close the overlay.
    CloseRequested,
    /// The native overlay window is gone.
    WindowDestroyed,
}

/// Whether the event loop keeps running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep running.
    Continue,
    /// Exit the process with status 0.
    Exit,
}

/// Process-wide owner of the controller and the auth handler.
pub struct Dispatcher<S> {
    controller: OverlayController<S>,
    auth: ProtocolAuthHandler,
    permission: Arc<dyn PermissionProbe>,
}

impl<S: OverlaySurface> Dispatcher<S> {
    /// Creates a dispatcher that has not finished startup.
    pub fn new(
        routes: Routes,
        permission: Arc<dyn PermissionProbe>,
        scheduler: Box<dyn CaptureScheduler>,
    ) -> Self {
        Self {
            controller: OverlayController::new(routes.clone(), Arc::clone(&permission), scheduler),
            auth: ProtocolAuthHandler::new(routes),
            permission,
        }
    }

    /// Window controller.
    pub fn controller(&self) -> &OverlayController<S> {
        &self.controller
    }

    /// Deep-link handler.
    pub fn auth(&self) -> &ProtocolAuthHandler {
        &self.auth
    }

    /// Finishes startup once tray and shortcut are in place: creates the
    /// window, primes the permission prompt, replays a deferred deep link and
    /// then handles a deep link passed on the command line.
    pub fn on_ready<H>(&mut self, host: &mut H, argv: &[String])
    where
        H: WindowHost<Surface = S>,
    {
        self.controller.ensure_window(host);
        prime_once(self.permission.as_ref());

        let mut sink = HandoffTarget::new(&mut self.controller, host);
        if let Some(disposition) = self.auth.mark_ready(&mut sink) {
            debug!(event = "launch.pending_replayed", ?disposition, "pending deep link replayed");
        }

        if let Some(link) = find_deep_link(argv) {
            let mut sink = HandoffTarget::new(&mut self.controller, host);
            self.auth.handle(link, &mut sink);
        }
        info!(event = "launch.ready", "startup complete");
    }

    /// Handles one event on the control thread.
    pub fn dispatch<H>(&mut self, host: &mut H, event: LaunchEvent) -> Flow
    where
        H: WindowHost<Surface = S>,
    {
        match event {
            LaunchEvent::Toggle(source) => {
                debug!(event = "launch.toggle", ?source, "toggle requested");
                self.controller.toggle(host);
            }
            LaunchEvent::Reload => self.controller.reload(),
            LaunchEvent::Quit => {
                info!(event = "launch.quit", "quit requested");
                self.shutdown();
                return Flow::Exit;
            }
            LaunchEvent::DeepLink(raw) => {
                self.handle_deep_link(host, &raw);
            }
            LaunchEvent::SecondInstance(args) => self.route_second_instance(host, &args),
            LaunchEvent::PageLoaded => self.controller.on_page_loaded(),
            LaunchEvent::SessionProbe(has_session) => self.controller.on_session_probe(has_session),
            LaunchEvent::Bridge(request) => self.controller.on_bridge_request(request),
            LaunchEvent::NewWindow(url) => self.controller.on_new_window_request(host, &url),
            LaunchEvent::CaptureCompleted(completed) => {
                self.controller.on_capture_complete(completed)
            }
            LaunchEvent::CloseRequested => self.controller.on_close_requested(),
            LaunchEvent::WindowDestroyed => self.controller.on_destroyed(),
        }
        Flow::Continue
    }

    /// Handles a deep link exactly like a live protocol event.
    pub fn handle_deep_link<H>(&mut self, host: &mut H, raw: &str) -> HandoffDisposition
    where
        H: WindowHost<Surface = S>,
    {
        let mut sink = HandoffTarget::new(&mut self.controller, host);
        self.auth.handle(raw, &mut sink)
    }

    fn route_second_instance<H>(&mut self, host: &mut H, args: &[String])
    where
        H: WindowHost<Surface = S>,
    {
        info!(
            event = "launch.second_instance",
            args = ?redact_args(args),
            "second launch forwarded"
        );
        match find_deep_link(args) {
            Some(link) => {
                self.handle_deep_link(host, link);
            }
            None => self.controller.toggle(host),
        }
    }

    /// Releases the window; later events are no-ops.
    pub fn shutdown(&mut self) {
        self.controller.shutdown();
    }
}
