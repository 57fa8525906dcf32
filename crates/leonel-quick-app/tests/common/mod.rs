//! Shared fakes for app integration tests.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use leonel_quick_app::Dispatcher;
use leonel_quick_capture::CaptureOutcome;
use leonel_quick_core::{Bounds, CapturedFrame, DEFAULT_BASE_URL, Routes, WorkArea};
use leonel_quick_permission::{ScreenCaptureAuthorization, StaticPermissionProbe};
use leonel_quick_window::{CaptureScheduler, OverlaySurface, WindowError, WindowHost, WindowSpec};
use url::Url;

/// Everything a fake window was asked to do.
#[derive(Debug, Default)]
pub struct SurfaceLog {
    pub alive: bool,
    pub visible: bool,
    pub bounds: Vec<Bounds>,
    pub loads: Vec<Url>,
    pub url: Option<Url>,
    pub scripts: Vec<String>,
    pub probes: usize,
    pub focus_count: usize,
}

/// In-memory overlay window.
pub struct FakeSurface(pub Rc<RefCell<SurfaceLog>>);

impl OverlaySurface for FakeSurface {
    fn is_alive(&self) -> bool {
        self.0.borrow().alive
    }
    fn is_visible(&self) -> bool {
        self.0.borrow().visible
    }
    fn set_bounds(&mut self, bounds: Bounds) {
        self.0.borrow_mut().bounds.push(bounds);
    }
    fn show(&mut self) {
        self.0.borrow_mut().visible = true;
    }
    fn hide(&mut self) {
        self.0.borrow_mut().visible = false;
    }
    fn focus(&mut self) {
        self.0.borrow_mut().focus_count += 1;
    }
    fn set_skip_taskbar(&mut self, _skip: bool) {}
    fn load_url(&mut self, url: &Url) {
        let mut log = self.0.borrow_mut();
        log.loads.push(url.clone());
        log.url = Some(url.clone());
    }
    fn current_url(&self) -> Option<Url> {
        self.0.borrow().url.clone()
    }
    fn set_zoom(&mut self, _factor: f64) {}
    fn start_drag(&mut self) {}
    fn run_script(&mut self, script: &str) {
        self.0.borrow_mut().scripts.push(script.to_string());
    }
    fn request_session_probe(&mut self) {
        self.0.borrow_mut().probes += 1;
    }
}

/// In-memory window factory on a 1920x1080 primary display.
#[derive(Default)]
pub struct FakeHost {
    pub windows: Vec<Rc<RefCell<SurfaceLog>>>,
    pub external: Vec<Url>,
}

#[allow(dead_code)]
impl FakeHost {
    /// Log of the most recently created window.
    pub fn window(&self) -> Rc<RefCell<SurfaceLog>> {
        Rc::clone(self.windows.last().expect("a window should have been created"))
    }

    /// Loads issued to the most recent window, as strings.
    pub fn loads(&self) -> Vec<String> {
        self.windows
            .last()
            .map(|log| log.borrow().loads.iter().map(|url| url.to_string()).collect())
            .unwrap_or_default()
    }

    /// Whether the most recent window is shown.
    pub fn is_visible(&self) -> bool {
        self.windows
            .last()
            .is_some_and(|log| log.borrow().visible)
    }
}

impl WindowHost for FakeHost {
    type Surface = FakeSurface;

    fn create_surface(&mut self, spec: &WindowSpec) -> Result<FakeSurface, WindowError> {
        let log = Rc::new(RefCell::new(SurfaceLog {
            alive: true,
            url: Some(spec.initial_url.clone()),
            ..SurfaceLog::default()
        }));
        self.windows.push(Rc::clone(&log));
        Ok(FakeSurface(log))
    }

    fn primary_work_area(&self) -> WorkArea {
        WorkArea {
            x: 0,
            y: 0,
            width: 1920,
            height: 1080,
        }
    }

    fn open_external(&mut self, url: &Url) {
        self.external.push(url.clone());
    }

    fn reapplies_bounds_after_show(&self) -> bool {
        false
    }
}

/// Scheduler that records requested cycles.
#[derive(Clone, Default)]
pub struct RecordingScheduler(pub Rc<RefCell<Vec<u64>>>);

impl CaptureScheduler for RecordingScheduler {
    fn schedule(&mut self, cycle: u64) {
        self.0.borrow_mut().push(cycle);
    }
}

/// Default first-party routes.
#[allow(dead_code)]
pub fn routes() -> Routes {
    Routes::new(DEFAULT_BASE_URL).expect("default base url is valid")
}

/// Dispatcher with a granted permission probe and a recording scheduler.
#[allow(dead_code)]
pub fn dispatcher() -> (Dispatcher<FakeSurface>, RecordingScheduler) {
    let scheduler = RecordingScheduler::default();
    let dispatcher = Dispatcher::new(
        routes(),
        Arc::new(StaticPermissionProbe::new(ScreenCaptureAuthorization::Granted)),
        Box::new(scheduler.clone()),
    );
    (dispatcher, scheduler)
}

/// Successful capture outcome carrying `tag` as its payload.
#[allow(dead_code)]
pub fn frame(tag: &str) -> CaptureOutcome {
    CaptureOutcome::Image(CapturedFrame {
        jpeg_base64: tag.to_string(),
        encoded_len: 6_000,
        width: 16,
        height: 9,
    })
}
