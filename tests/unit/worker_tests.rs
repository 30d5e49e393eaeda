//! Unit tests for the interval worker.
//!
//! Validates phase alternation timing, exactly-once transition
//! notifications, cancellation behavior, and that mid-interval
//! reconfiguration only affects intervals that have not yet begun.

use std::sync::Arc;
use std::time::Duration;

use slack_morphism::prelude::{SlackChannelId, SlackUserId};
use tokio::sync::mpsc;

use pomodoro_intercom::slack::client::SlackMessage;
use pomodoro_intercom::timer::worker::{FOCUS_MESSAGE, REST_MESSAGE};
use pomodoro_intercom::timer::{Durations, IntervalWorker, Phase, Session};

/// Helper to spawn a worker with millisecond intervals for testing.
fn spawn_worker(
    focus_ms: u64,
    rest_ms: u64,
) -> (Arc<Session>, mpsc::Receiver<SlackMessage>) {
    let session = Arc::new(Session::new(
        SlackUserId("U_WORKER".into()),
        SlackChannelId("C_WORKER".into()),
        Durations {
            focus: Duration::from_millis(focus_ms),
            rest: Duration::from_millis(rest_ms),
        },
    ));
    let (tx, rx) = mpsc::channel(32);
    let _handle = IntervalWorker::new(Arc::clone(&session), tx).spawn();
    (session, rx)
}

async fn next_message(rx: &mut mpsc::Receiver<SlackMessage>) -> SlackMessage {
    tokio::time::timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("should receive notification before timeout")
        .expect("channel should not be closed")
}

#[tokio::test]
async fn focus_interval_ends_with_rest_notification() {
    let (session, mut rx) = spawn_worker(50, 60_000);

    let message = next_message(&mut rx).await;
    assert_eq!(message.text.as_deref(), Some(REST_MESSAGE));
    assert_eq!(message.channel.to_string(), "C_WORKER");
    assert_eq!(session.phase().await, Phase::Rest);

    session.stop();
}

#[tokio::test]
async fn phases_alternate_with_one_notification_each() {
    let (session, mut rx) = spawn_worker(50, 40);

    let first = next_message(&mut rx).await;
    assert_eq!(first.text.as_deref(), Some(REST_MESSAGE));

    let second = next_message(&mut rx).await;
    assert_eq!(second.text.as_deref(), Some(FOCUS_MESSAGE));

    let third = next_message(&mut rx).await;
    assert_eq!(third.text.as_deref(), Some(REST_MESSAGE));

    session.stop();
}

#[tokio::test]
async fn notifications_are_not_threaded() {
    let (session, mut rx) = spawn_worker(50, 40);

    let message = next_message(&mut rx).await;
    assert!(message.thread_ts.is_none());

    session.stop();
}

#[tokio::test]
async fn immediate_stop_emits_nothing() {
    let (session, mut rx) = spawn_worker(50, 50);

    session.stop();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(rx.try_recv().is_err(), "no notifications after stop");
}

#[tokio::test]
async fn no_notification_after_stop_is_acknowledged() {
    let (session, mut rx) = spawn_worker(40, 40);

    // Let a couple of transitions happen, then stop.
    let _ = next_message(&mut rx).await;
    let _ = next_message(&mut rx).await;
    session.stop();

    // Drain anything committed before the stop landed, then verify silence.
    tokio::time::sleep(Duration::from_millis(200)).await;
    while rx.try_recv().is_ok() {}
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(
        rx.try_recv().is_err(),
        "worker kept notifying after cancellation"
    );
}

#[tokio::test]
async fn reconfigured_rest_applies_to_the_interval_not_yet_begun() {
    // Long rest so the test would time out if the update were ignored.
    let (session, mut rx) = spawn_worker(50, 60_000);

    // Reconfigure the rest interval while the focus interval is running.
    session
        .set_duration(Phase::Rest, Duration::from_millis(40))
        .await;

    let first = next_message(&mut rx).await;
    assert_eq!(first.text.as_deref(), Some(REST_MESSAGE));

    // The rest interval begins after the first notification; the worker
    // must observe the updated value through the shared record.
    let second = next_message(&mut rx).await;
    assert_eq!(second.text.as_deref(), Some(FOCUS_MESSAGE));

    session.stop();
}

#[tokio::test]
async fn reconfiguration_mid_interval_leaves_current_interval_alone() {
    let (session, mut rx) = spawn_worker(200, 60_000);

    // Shrinking the focus interval mid-flight must not shorten the sleep
    // already in progress.
    session
        .set_duration(Phase::Focus, Duration::from_millis(10))
        .await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(
        rx.try_recv().is_err(),
        "in-flight interval must not be interrupted"
    );

    // It still completes on the original schedule.
    let message = next_message(&mut rx).await;
    assert_eq!(message.text.as_deref(), Some(REST_MESSAGE));

    session.stop();
}

#[tokio::test]
async fn worker_survives_a_closed_outbound_queue() {
    let session = Arc::new(Session::new(
        SlackUserId("U_DROPPED".into()),
        SlackChannelId("C_DROPPED".into()),
        Durations {
            focus: Duration::from_millis(30),
            rest: Duration::from_millis(60_000),
        },
    ));
    let (tx, rx) = mpsc::channel(1);
    drop(rx);
    let _handle = IntervalWorker::new(Arc::clone(&session), tx).spawn();

    // Delivery fails at the transition; the timer itself keeps going.
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(session.phase().await, Phase::Rest);

    session.stop();
}
