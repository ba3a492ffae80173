//! Polling scenarios run against the in-memory gateway.

use super::{FakeWallet, TestHarness};
use std::time::Duration;
use tokio::time::Instant;
use truthguard::session::{CONNECTIVITY_MESSAGE, SUBMISSION_FAILED_MESSAGE, TIMEOUT_MESSAGE};
use truthguard::{ClaimSubmission, Error, PollEvent, PollStatus, RequestId, Verdict};

const RESULT_PAYLOAD: &str = r#"{
    "verdict": "false",
    "confidence": 92,
    "analysis": "Satellite imagery and physics contradict the claim.",
    "sources": [
        { "title": "NASA Earth Observatory", "url": "https://ar.io/tx1", "verified": true },
        { "title": "Forum post", "url": "https://ar.io/tx2" }
    ]
}"#;

#[tokio::test(start_paused = true)]
async fn test_result_found_on_sixth_tick() {
    let mut harness = TestHarness::setup();
    harness.gateway.publish("R1", "T1", 6, RESULT_PAYLOAD);

    let start = Instant::now();
    harness.checker.watch(RequestId::new("R1").unwrap());
    let events = harness.events_until_terminal().await;

    assert_eq!(start.elapsed(), Duration::from_secs(30));
    assert!(matches!(events[0], PollEvent::SessionStarted { .. }));
    let no_result = events
        .iter()
        .filter(|e| matches!(e, PollEvent::NoResultYet { .. }))
        .count();
    assert_eq!(no_result, 5);

    match events.last().unwrap() {
        PollEvent::Succeeded {
            attempt, record, ..
        } => {
            assert_eq!(*attempt, 6);
            assert_eq!(record.verdict, Verdict::False);
            assert_eq!(record.confidence, 92);
            assert_eq!(record.sources.len(), 2);
            assert_eq!(record.verified_sources(), 1);
        }
        other => panic!("expected success, got {other:?}"),
    }

    assert_eq!(harness.checker.status(), Some(PollStatus::Succeeded));
    assert_eq!(harness.gateway.queries(), 6);
    assert_eq!(harness.gateway.fetches(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_times_out_after_twelve_ticks() {
    let mut harness = TestHarness::setup();

    let start = Instant::now();
    harness.checker.watch(RequestId::new("R2").unwrap());
    let events = harness.events_until_terminal().await;

    assert_eq!(start.elapsed(), Duration::from_secs(60));
    match events.last().unwrap() {
        PollEvent::TimedOut {
            attempts, message, ..
        } => {
            assert_eq!(*attempts, 12);
            assert_eq!(message, TIMEOUT_MESSAGE);
        }
        other => panic!("expected timeout, got {other:?}"),
    }

    // No ticks after the terminal state.
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(harness.gateway.queries(), 12);
    assert_eq!(harness.checker.status(), Some(PollStatus::TimedOut));
}

#[tokio::test(start_paused = true)]
async fn test_rejected_wallet_never_polls() {
    let mut harness = TestHarness::setup();
    let claim = ClaimSubmission::text("Vaccines contain microchips.").unwrap();

    let err = harness
        .checker
        .verify(&FakeWallet { reject: true }, &claim)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::WalletUnavailable(_)));

    match harness.events.recv().await.unwrap() {
        PollEvent::SubmissionFailed { message } => assert_eq!(message, SUBMISSION_FAILED_MESSAGE),
        other => panic!("expected submission failure, got {other:?}"),
    }
    assert!(harness.checker.status().is_none());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(harness.gateway.uploads().is_empty());
    assert_eq!(harness.gateway.queries(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_submitted_claim_is_polled_to_completion() {
    let mut harness = TestHarness::setup();
    let content = "The Great Wall of China is visible from space.";
    let request_id = FakeWallet::id_for(content);
    harness.gateway.publish(&request_id, "T3", 2, RESULT_PAYLOAD);

    let claim = ClaimSubmission::text(content).unwrap();
    let session = harness
        .checker
        .verify(&FakeWallet { reject: false }, &claim)
        .await
        .unwrap();
    assert_eq!(session.request_id().as_str(), request_id);

    let uploads = harness.gateway.uploads();
    assert_eq!(uploads.len(), 1);
    let tags = uploads[0]["tags"].as_array().unwrap();
    assert!(tags
        .iter()
        .any(|t| t["name"] == "Type" && t["value"] == "FactCheckRequest"));
    assert!(tags
        .iter()
        .any(|t| t["name"] == "App-Name" && t["value"] == "TruthGuard"));

    let events = harness.events_until_terminal().await;
    assert!(matches!(
        events.last().unwrap(),
        PollEvent::Succeeded { attempt: 2, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_malformed_payload_keeps_polling() {
    let mut config = TestHarness::config();
    config.polling.max_attempts = 3;
    let mut harness = TestHarness::setup_with_config(config);
    harness.gateway.publish("R4", "T4", 1, "<html>not a result</html>");

    harness.checker.watch(RequestId::new("R4").unwrap());
    let events = harness.events_until_terminal().await;

    let no_result = events
        .iter()
        .filter(|e| matches!(e, PollEvent::NoResultYet { .. }))
        .count();
    assert_eq!(no_result, 2);
    assert!(matches!(
        events.last().unwrap(),
        PollEvent::TimedOut { attempts: 3, .. }
    ));
    assert_eq!(harness.checker.gateway().stats().malformed, 3);
}

#[tokio::test(start_paused = true)]
async fn test_recovers_after_gateway_outage() {
    let mut harness = TestHarness::setup();
    harness.gateway.publish("R5", "T5", 1, RESULT_PAYLOAD);
    harness.gateway.set_offline(true);

    harness.checker.watch(RequestId::new("R5").unwrap());
    assert!(matches!(
        harness.events.recv().await.unwrap(),
        PollEvent::SessionStarted { .. }
    ));
    match harness.events.recv().await.unwrap() {
        PollEvent::TransientError {
            attempt, message, ..
        } => {
            assert_eq!(attempt, 1);
            assert_eq!(message, CONNECTIVITY_MESSAGE);
        }
        other => panic!("expected transient error, got {other:?}"),
    }
    assert_eq!(harness.checker.status(), Some(PollStatus::Pending));

    harness.gateway.set_offline(false);
    let events = harness.events_until_terminal().await;
    assert!(matches!(
        events.last().unwrap(),
        PollEvent::Succeeded { attempt: 2, .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_new_request_replaces_running_session() {
    let mut harness = TestHarness::setup();
    harness.gateway.publish("R7", "T7", 1, RESULT_PAYLOAD);

    harness.checker.watch(RequestId::new("R6").unwrap());
    harness.checker.watch(RequestId::new("R7").unwrap());

    let events = harness.events_until_terminal().await;
    assert!(events
        .iter()
        .any(|e| matches!(e, PollEvent::Cancelled { request_id } if request_id.as_str() == "R6")));

    let events = harness.events_until_terminal().await;
    match events.last().unwrap() {
        PollEvent::Succeeded { request_id, .. } => assert_eq!(request_id.as_str(), "R7"),
        other => panic!("expected success for R7, got {other:?}"),
    }
}
