//! Integration tests for deep-link handoff into the overlay.

mod common;

use leonel_quick_app::LaunchEvent;
use leonel_quick_auth::{DeepLinkError, HandoffDisposition};
use leonel_quick_window::Lifecycle;

#[test]
fn protocol_handoff_tests_sanitizes_and_opens_landing() {
    let (mut dispatcher, _) = common::dispatcher();
    let mut host = common::FakeHost::default();
    dispatcher.on_ready(&mut host, &[]);

    dispatcher.dispatch(
        &mut host,
        LaunchEvent::DeepLink("leonel-quick://auth?rt=abcDEF1234!!!".to_string()),
    );

    assert_eq!(
        host.loads(),
        vec!["https://leonel.app/exam?quick_auth=abcDEF1234".to_string()]
    );
    assert_eq!(dispatcher.controller().lifecycle(), Lifecycle::Visible);
}

#[test]
fn protocol_handoff_tests_short_token_navigates_nowhere() {
    let (mut dispatcher, scheduler) = common::dispatcher();
    let mut host = common::FakeHost::default();
    dispatcher.on_ready(&mut host, &[]);

    let disposition =
        dispatcher.handle_deep_link(&mut host, "leonel-quick://auth?rt=short");

    assert!(matches!(
        disposition,
        HandoffDisposition::Rejected(DeepLinkError::TokenLength { len: 5 })
    ));
    assert!(host.loads().is_empty());
    assert_eq!(dispatcher.controller().lifecycle(), Lifecycle::Hidden);
    assert!(scheduler.0.borrow().is_empty());
}

#[test]
fn protocol_handoff_tests_sanitization_below_minimum_is_rejected() {
    let (mut dispatcher, _) = common::dispatcher();
    let mut host = common::FakeHost::default();
    dispatcher.on_ready(&mut host, &[]);

    let disposition =
        dispatcher.handle_deep_link(&mut host, "leonel-quick://auth?rt=ab%21%21%21%21%21%21cd");

    assert!(matches!(
        disposition,
        HandoffDisposition::Rejected(DeepLinkError::SanitizedTooShort { len: 4 })
    ));
    assert!(host.loads().is_empty());
}

#[test]
fn protocol_handoff_tests_oversized_token_is_rejected() {
    let (mut dispatcher, _) = common::dispatcher();
    let mut host = common::FakeHost::default();
    dispatcher.on_ready(&mut host, &[]);
    let link = format!("leonel-quick://auth?rt={}", "a".repeat(4097));

    let disposition = dispatcher.handle_deep_link(&mut host, &link);

    assert!(matches!(disposition, HandoffDisposition::Rejected(_)));
    assert!(host.loads().is_empty());
    assert_eq!(dispatcher.controller().lifecycle(), Lifecycle::Hidden);
}

#[test]
fn protocol_handoff_tests_foreign_scheme_is_ignored() {
    let (mut dispatcher, _) = common::dispatcher();
    let mut host = common::FakeHost::default();
    dispatcher.on_ready(&mut host, &[]);

    let disposition =
        dispatcher.handle_deep_link(&mut host, "https://leonel.app/?rt=abcDEF1234");

    assert!(matches!(
        disposition,
        HandoffDisposition::Rejected(DeepLinkError::NotDeepLink)
    ));
    assert!(host.loads().is_empty());
}
