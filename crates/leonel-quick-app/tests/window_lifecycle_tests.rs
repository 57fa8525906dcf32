//! Integration tests for the overlay lifecycle driven through the dispatcher.

mod common;

use leonel_quick_app::{Flow, LaunchEvent, ToggleSource};
use leonel_quick_capture::CaptureCompleted;
use leonel_quick_core::Bounds;
use leonel_quick_window::{BridgeRequest, Lifecycle};

const CANONICAL: Bounds = Bounds {
    x: 20,
    y: 780,
    width: 340,
    height: 280,
};

#[test]
fn window_lifecycle_tests_hotkey_reveals_at_canonical_bounds_and_captures() {
    let (mut dispatcher, scheduler) = common::dispatcher();
    let mut host = common::FakeHost::default();
    dispatcher.on_ready(&mut host, &[]);

    dispatcher.dispatch(&mut host, LaunchEvent::Toggle(ToggleSource::Hotkey));

    assert_eq!(dispatcher.controller().lifecycle(), Lifecycle::Visible);
    assert_eq!(host.window().borrow().bounds.last(), Some(&CANONICAL));
    assert_eq!(*scheduler.0.borrow(), vec![1]);
}

#[test]
fn window_lifecycle_tests_toggle_twice_returns_to_hidden() {
    let (mut dispatcher, _) = common::dispatcher();
    let mut host = common::FakeHost::default();
    dispatcher.on_ready(&mut host, &[]);

    dispatcher.dispatch(&mut host, LaunchEvent::Toggle(ToggleSource::Hotkey));
    dispatcher.dispatch(&mut host, LaunchEvent::Toggle(ToggleSource::TrayClick));

    assert_eq!(dispatcher.controller().lifecycle(), Lifecycle::Hidden);
    assert_eq!(host.windows.len(), 1);
}

#[test]
fn window_lifecycle_tests_late_capture_after_hide_is_harmless() {
    let (mut dispatcher, _) = common::dispatcher();
    let mut host = common::FakeHost::default();
    dispatcher.on_ready(&mut host, &[]);
    dispatcher.dispatch(&mut host, LaunchEvent::Toggle(ToggleSource::Hotkey));
    dispatcher.dispatch(&mut host, LaunchEvent::Toggle(ToggleSource::Hotkey));

    let flow = dispatcher.dispatch(
        &mut host,
        LaunchEvent::CaptureCompleted(CaptureCompleted {
            cycle: 1,
            outcome: common::frame("late"),
        }),
    );

    assert_eq!(flow, Flow::Continue);
    assert_eq!(dispatcher.controller().lifecycle(), Lifecycle::Hidden);
}

#[test]
fn window_lifecycle_tests_capture_from_older_reveal_is_never_served() {
    let (mut dispatcher, _) = common::dispatcher();
    let mut host = common::FakeHost::default();
    dispatcher.on_ready(&mut host, &[]);
    for _ in 0..3 {
        dispatcher.dispatch(&mut host, LaunchEvent::Toggle(ToggleSource::Hotkey));
    }

    dispatcher.dispatch(
        &mut host,
        LaunchEvent::CaptureCompleted(CaptureCompleted {
            cycle: 1,
            outcome: common::frame("old"),
        }),
    );
    dispatcher.dispatch(&mut host, LaunchEvent::Bridge(BridgeRequest::GetScreenshot { id: 1 }));

    let window = host.window();
    let log = window.borrow();
    assert!(dispatcher.controller().current_frame().is_none());
    assert!(log.scripts.iter().all(|script| !script.contains("old")));
    assert!(log.scripts[0].contains(r#""id":1,"value":null"#));
}

#[test]
fn window_lifecycle_tests_close_request_hides() {
    let (mut dispatcher, _) = common::dispatcher();
    let mut host = common::FakeHost::default();
    dispatcher.on_ready(&mut host, &[]);
    dispatcher.dispatch(&mut host, LaunchEvent::Toggle(ToggleSource::Hotkey));

    dispatcher.dispatch(&mut host, LaunchEvent::CloseRequested);

    assert_eq!(dispatcher.controller().lifecycle(), Lifecycle::Hidden);
    assert!(dispatcher.controller().surface().is_some());
}

#[test]
fn window_lifecycle_tests_destroyed_window_is_recreated() {
    let (mut dispatcher, _) = common::dispatcher();
    let mut host = common::FakeHost::default();
    dispatcher.on_ready(&mut host, &[]);

    dispatcher.dispatch(&mut host, LaunchEvent::WindowDestroyed);
    dispatcher.dispatch(&mut host, LaunchEvent::Toggle(ToggleSource::TrayMenu));

    assert_eq!(host.windows.len(), 2);
    assert!(host.is_visible());
}

#[test]
fn window_lifecycle_tests_reload_loads_login_route() {
    let (mut dispatcher, _) = common::dispatcher();
    let mut host = common::FakeHost::default();
    dispatcher.on_ready(&mut host, &[]);

    dispatcher.dispatch(&mut host, LaunchEvent::Reload);

    assert_eq!(host.loads(), vec!["https://leonel.app/".to_string()]);
}

#[test]
fn window_lifecycle_tests_quit_is_terminal() {
    let (mut dispatcher, scheduler) = common::dispatcher();
    let mut host = common::FakeHost::default();
    dispatcher.on_ready(&mut host, &[]);

    let flow = dispatcher.dispatch(&mut host, LaunchEvent::Quit);
    dispatcher.dispatch(&mut host, LaunchEvent::Toggle(ToggleSource::Hotkey));
    dispatcher.dispatch(&mut host, LaunchEvent::Reload);

    assert_eq!(flow, Flow::Exit);
    assert_eq!(dispatcher.controller().lifecycle(), Lifecycle::Destroyed);
    assert_eq!(host.windows.len(), 1);
    assert!(host.loads().is_empty());
    assert!(scheduler.0.borrow().is_empty());
}

#[test]
fn window_lifecycle_tests_session_probe_redirects_after_spa_navigation() {
    let (mut dispatcher, _) = common::dispatcher();
    let mut host = common::FakeHost::default();
    dispatcher.on_ready(&mut host, &[]);

    dispatcher.dispatch(&mut host, LaunchEvent::PageLoaded);
    dispatcher.dispatch(&mut host, LaunchEvent::SessionProbe(false));
    dispatcher.dispatch(&mut host, LaunchEvent::Bridge(BridgeRequest::InPageNavigation));
    dispatcher.dispatch(&mut host, LaunchEvent::SessionProbe(true));

    assert_eq!(host.window().borrow().probes, 2);
    assert_eq!(host.loads(), vec!["https://leonel.app/exam".to_string()]);
}

#[test]
fn window_lifecycle_tests_external_links_leave_the_overlay() {
    let (mut dispatcher, _) = common::dispatcher();
    let mut host = common::FakeHost::default();
    dispatcher.on_ready(&mut host, &[]);

    dispatcher.dispatch(
        &mut host,
        LaunchEvent::NewWindow("https://example.com/terms".to_string()),
    );
    dispatcher.dispatch(
        &mut host,
        LaunchEvent::NewWindow("https://app.leonel.app/help".to_string()),
    );

    assert_eq!(host.external.len(), 1);
    assert_eq!(host.loads(), vec!["https://app.leonel.app/help".to_string()]);
}
