//! End-to-end lifecycle tests: timer notifications flowing through the
//! dispatch loop, reconfiguration visibility, and orderly shutdown.

use std::time::Duration;

use pomodoro_intercom::timer::worker::{FOCUS_MESSAGE, REST_MESSAGE};

use super::test_helpers::{command, next_outbound, send, short_defaults, spawn_dispatcher};

#[tokio::test]
async fn started_timer_notifies_at_each_transition() {
    let mut harness = spawn_dispatcher(short_defaults());

    let event = command("U1", "start");
    send(&harness, event.clone()).await;

    let reply = next_outbound(&mut harness.outbound_rx).await;
    assert_eq!(
        reply.text.as_deref(),
        Some("Your Pomodoro timer has started! Now go to work")
    );

    // First transition: focus ends, rest begins.
    let first = next_outbound(&mut harness.outbound_rx).await;
    assert_eq!(first.text.as_deref(), Some(REST_MESSAGE));
    assert_eq!(first.channel, event.channel);
    assert!(first.thread_ts.is_none(), "notifications are not threaded");

    // Second transition: rest ends, focus begins.
    let second = next_outbound(&mut harness.outbound_rx).await;
    assert_eq!(second.text.as_deref(), Some(FOCUS_MESSAGE));
}

#[tokio::test]
async fn finish_silences_the_timer_for_good() {
    let mut harness = spawn_dispatcher(short_defaults());

    send(&harness, command("U1", "start")).await;
    let _ = next_outbound(&mut harness.outbound_rx).await;
    let _ = next_outbound(&mut harness.outbound_rx).await;

    send(&harness, command("U1", "finish")).await;

    // Everything after the stop reply must be silence.
    let mut saw_stop_reply = false;
    tokio::time::sleep(Duration::from_millis(200)).await;
    while let Ok(message) = harness.outbound_rx.try_recv() {
        if message.text.as_deref() == Some("Your Pomodoro timer has stopped. See you next time!") {
            saw_stop_reply = true;
        }
    }
    assert!(saw_stop_reply, "stop reply should have been sent");

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(
        harness.outbound_rx.try_recv().is_err(),
        "no notifications may arrive after the timer is finished"
    );
}

#[tokio::test]
async fn reconfigured_rest_is_observed_by_the_running_task() {
    let mut harness = spawn_dispatcher(short_defaults());

    send(&harness, command("U1", "start")).await;
    let _ = next_outbound(&mut harness.outbound_rx).await;

    // Stretch the rest interval to a minute while the first focus interval
    // is still in flight. The update lands in the shared record, so the
    // rest interval that has not yet begun must honor it.
    send(&harness, command("U1", "set_rest_time 1")).await;
    let reply = next_outbound(&mut harness.outbound_rx).await;
    assert_eq!(
        reply.text.as_deref(),
        Some("Your rest time is updated to 1 minutes")
    );

    // Focus still ends on the original short schedule.
    let first = next_outbound(&mut harness.outbound_rx).await;
    assert_eq!(first.text.as_deref(), Some(REST_MESSAGE));

    // With the old 40 ms rest the focus notification would arrive almost
    // immediately; with the new 1-minute rest it must not.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(
        harness.outbound_rx.try_recv().is_err(),
        "running task used a stale rest duration"
    );
}

#[tokio::test]
async fn cancellation_stops_the_loop_and_every_session() {
    let mut harness = spawn_dispatcher(short_defaults());

    send(&harness, command("U1", "start")).await;
    send(&harness, command("U2", "start")).await;
    let _ = next_outbound(&mut harness.outbound_rx).await;
    let _ = next_outbound(&mut harness.outbound_rx).await;

    harness.cancel.cancel();
    tokio::time::timeout(Duration::from_secs(3), harness.handle)
        .await
        .expect("dispatch loop should stop before timeout")
        .expect("dispatch task should not panic");

    assert_eq!(harness.registry.active_count().await, 0);

    // Workers were joined during shutdown; the queue stays quiet.
    while harness.outbound_rx.try_recv().is_ok() {}
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(
        harness.outbound_rx.try_recv().is_err(),
        "a timer task outlived shutdown"
    );
}

#[tokio::test]
async fn closing_the_command_channel_also_shuts_down() {
    let harness = spawn_dispatcher(short_defaults());

    send(&harness, command("U1", "start")).await;
    drop(harness.commands_tx);

    tokio::time::timeout(Duration::from_secs(3), harness.handle)
        .await
        .expect("dispatch loop should stop before timeout")
        .expect("dispatch task should not panic");

    assert_eq!(harness.registry.active_count().await, 0);
}
