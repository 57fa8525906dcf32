//! Primary display work area: the screen minus taskbar, dock and menu bar.
//!
//! Windows reads `rcWork` of the primary monitor; macOS reads
//! `NSScreen.visibleFrame`. Other platforms have no lookup and callers fall
//! back to the monitor bounds.

use leonel_quick_core::WorkArea;

/// Converts a physical-pixel rectangle to a logical work area.
///
/// Returns `None` for an empty rectangle or an unusable scale factor.
pub fn logical_from_physical(
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    scale_factor: f64,
) -> Option<WorkArea> {
    if !(scale_factor.is_finite() && scale_factor > 0.0) || right <= left || bottom <= top {
        return None;
    }
    let scale = |value: i32| f64::from(value) / scale_factor;
    Some(WorkArea {
        x: scale(left).round() as i32,
        y: scale(top).round() as i32,
        width: scale(right.saturating_sub(left)).round() as u32,
        height: scale(bottom.saturating_sub(top)).round() as u32,
    })
}

/// Converts a rectangle in bottom-left-origin points (AppKit) to a top-left
/// logical work area, given the height of the screen the origin refers to.
pub fn from_bottom_left_origin(
    screen_height: f64,
    x: f64,
    y: f64,
    width: f64,
    height: f64,
) -> Option<WorkArea> {
    if !(width > 0.0 && height > 0.0 && screen_height.is_finite()) {
        return None;
    }
    Some(WorkArea {
        x: x.round() as i32,
        y: (screen_height - (y + height)).round() as i32,
        width: width.round() as u32,
        height: height.round() as u32,
    })
}

/// Work area of the primary display in logical pixels, when the platform
/// exposes one. `scale_factor` converts physical pixels where needed.
pub fn system_work_area(scale_factor: f64) -> Option<WorkArea> {
    #[cfg(windows)]
    {
        windows::primary_work_area(scale_factor)
    }

    #[cfg(target_os = "macos")]
    {
        let _ = scale_factor;
        macos::main_screen_work_area()
    }

    #[cfg(not(any(windows, target_os = "macos")))]
    {
        let _ = scale_factor;
        None
    }
}

#[cfg(windows)]
mod windows {
    use leonel_quick_core::WorkArea;
    use windows_sys::Win32::Foundation::{POINT, RECT};
    use windows_sys::Win32::Graphics::Gdi::{
        GetMonitorInfoW, MONITOR_DEFAULTTOPRIMARY, MONITORINFO, MonitorFromPoint,
    };

    pub(super) fn primary_work_area(scale_factor: f64) -> Option<WorkArea> {
        let empty = RECT {
            left: 0,
            top: 0,
            right: 0,
            bottom: 0,
        };
        let mut info = MONITORINFO {
            cbSize: u32::try_from(std::mem::size_of::<MONITORINFO>()).ok()?,
            rcMonitor: empty,
            rcWork: empty,
            dwFlags: 0,
        };

        let found = unsafe {
            // Safety:
            // - The origin always lies on the primary monitor.
            // - `info` is a properly sized MONITORINFO alive for the call.
            let monitor = MonitorFromPoint(POINT { x: 0, y: 0 }, MONITOR_DEFAULTTOPRIMARY);
            !monitor.is_null() && GetMonitorInfoW(monitor, &mut info) != 0
        };
        if !found {
            return None;
        }

        let work = info.rcWork;
        super::logical_from_physical(work.left, work.top, work.right, work.bottom, scale_factor)
    }
}

#[cfg(target_os = "macos")]
mod macos {
    use leonel_quick_core::WorkArea;
    use objc2::MainThreadMarker;
    use objc2_app_kit::NSScreen;

    pub(super) fn main_screen_work_area() -> Option<WorkArea> {
        let mtm = MainThreadMarker::new()?;
        let screen = NSScreen::mainScreen(mtm)?;
        let frame = screen.frame();
        let visible = screen.visibleFrame();
        super::from_bottom_left_origin(
            frame.origin.y + frame.size.height,
            visible.origin.x,
            visible.origin.y,
            visible.size.width,
            visible.size.height,
        )
    }
}
