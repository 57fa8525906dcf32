//! Integration tests for runtime kill-switch behavior.

use std::sync::Arc;

use leonel_quick_app::{ENV_CAPTURE_ENABLED, capture_enabled_from_env};
use leonel_quick_capture::{
    CaptureOutcome, NoImageReason, ScreenshotCapturer, SyntheticSourceProvider,
};
use leonel_quick_permission::{ScreenCaptureAuthorization, StaticPermissionProbe};

#[test]
fn kill_switch_behavior_tests_env_value_controls_capture() {
    // Safety:
    // - Integration tests mutate process env in a single-threaded test body.
    // - We reset the variable before returning.
    unsafe { std::env::set_var(ENV_CAPTURE_ENABLED, "OFF") };
    assert!(!capture_enabled_from_env());

    // Safety: see rationale above.
    unsafe { std::env::set_var(ENV_CAPTURE_ENABLED, "0") };
    assert!(!capture_enabled_from_env());

    // Safety: see rationale above.
    unsafe { std::env::set_var(ENV_CAPTURE_ENABLED, "true") };
    assert!(capture_enabled_from_env());

    // Safety: see rationale above.
    unsafe { std::env::remove_var(ENV_CAPTURE_ENABLED) };
    assert!(capture_enabled_from_env());
}

#[test]
fn kill_switch_behavior_tests_disabled_capturer_never_touches_sources() {
    let sources = Arc::new(SyntheticSourceProvider::new());
    let capturer = ScreenshotCapturer::new(
        Arc::new(StaticPermissionProbe::new(ScreenCaptureAuthorization::Granted)),
        sources.clone(),
    )
    .with_enabled(false);

    assert_eq!(
        capturer.capture(),
        CaptureOutcome::NoImage(NoImageReason::Disabled)
    );
    assert_eq!(sources.list_calls(), 0);
}
