mod common;

use std::sync::atomic::Ordering;

use chrono::Duration;
use common::{fixed_time, Harness};
use punchcard_lib::{
    models::SessionStatus,
    reminder::{ReminderOutcome, ReminderResponse},
    tracker::{CheckInOptions, TrackerEvent},
};

fn two_hour_reminder() -> CheckInOptions {
    CheckInOptions {
        break_after: Some(Duration::hours(2)),
        break_duration_minutes: Some(15),
    }
}

fn reminders_in(events: &[TrackerEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, TrackerEvent::ReminderFired(_)))
        .count()
}

#[tokio::test]
async fn reminder_fires_exactly_once_inside_the_window() {
    let mut h = Harness::new("2026-03-02T09:00:00Z");
    h.controller
        .check_in(two_hour_reminder())
        .await
        .expect("check in");
    let due = fixed_time("2026-03-02T11:00:00Z");

    let mut fired = Vec::new();
    for offset in [-2, 0, 3, 10] {
        h.clock.set(due + Duration::seconds(offset));
        if let Some(reminder) = h.controller.tick().await.reminder {
            fired.push((offset, reminder));
        }
    }

    assert_eq!(fired.len(), 1);
    assert_eq!(fired[0].0, 0);
    assert_eq!(fired[0].1.due_at, due);
    assert_eq!(fired[0].1.break_duration_minutes, Some(15));
    assert_eq!(h.alert.plays.load(Ordering::SeqCst), 1);
    assert_eq!(h.notifier.titles(), vec!["Break reminder".to_string()]);
    assert_eq!(reminders_in(&h.drain()), 1);
}

#[tokio::test]
async fn missed_window_never_fires() {
    let h = Harness::new("2026-03-02T09:00:00Z");
    h.controller
        .check_in(two_hour_reminder())
        .await
        .expect("check in");

    h.clock.set(fixed_time("2026-03-02T11:00:06Z"));
    assert!(h.controller.tick().await.reminder.is_none());
    assert_eq!(h.alert.plays.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn paused_session_does_not_fire() {
    let h = Harness::new("2026-03-02T09:00:00Z");
    h.controller
        .check_in(two_hour_reminder())
        .await
        .expect("check in");
    h.clock.set(fixed_time("2026-03-02T10:59:00Z"));
    h.controller.pause().await.expect("pause");

    h.clock.set(fixed_time("2026-03-02T11:00:00Z"));
    assert!(h.controller.tick().await.reminder.is_none());
}

#[tokio::test]
async fn broken_alert_still_shows_the_reminder() {
    let mut h = Harness::new("2026-03-02T09:00:00Z");
    h.alert.broken.store(true, Ordering::SeqCst);
    h.controller
        .check_in(two_hour_reminder())
        .await
        .expect("check in");

    h.clock.set(fixed_time("2026-03-02T11:00:01Z"));
    assert!(h.controller.tick().await.reminder.is_some());
    assert_eq!(reminders_in(&h.drain()), 1);
}

#[tokio::test]
async fn snooze_keeps_working_and_rearms() {
    let mut h = Harness::new("2026-03-02T09:00:00Z");
    h.controller
        .check_in(two_hour_reminder())
        .await
        .expect("check in");
    h.clock.set(fixed_time("2026-03-02T11:00:00Z"));
    assert!(h.controller.tick().await.reminder.is_some());

    h.clock.set(fixed_time("2026-03-02T11:00:02Z"));
    let outcome = h
        .controller
        .respond(ReminderResponse::Snooze(None))
        .await
        .expect("snooze");
    let until = fixed_time("2026-03-02T11:15:02Z");
    assert_eq!(outcome, ReminderOutcome::Snoozed { until });
    assert_eq!(h.alert.stops.load(Ordering::SeqCst), 1);

    let session = h.controller.snapshot().await.session.expect("session");
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(session.break_scheduled_time, Some(until));
    assert!(h
        .drain()
        .iter()
        .any(|e| matches!(e, TrackerEvent::ReminderCleared { .. })));

    h.clock.set(until);
    let again = h.controller.tick().await.reminder.expect("fires again");
    assert_eq!(again.due_at, until);
}

#[tokio::test]
async fn skip_clears_the_schedule_for_good() {
    let h = Harness::new("2026-03-02T09:00:00Z");
    h.controller
        .check_in(two_hour_reminder())
        .await
        .expect("check in");
    h.clock.set(fixed_time("2026-03-02T11:00:00Z"));
    assert!(h.controller.tick().await.reminder.is_some());

    let outcome = h
        .controller
        .respond(ReminderResponse::Skip)
        .await
        .expect("skip");
    assert_eq!(outcome, ReminderOutcome::Skipped);

    let session = h.controller.snapshot().await.session.expect("session");
    assert_eq!(session.break_scheduled_time, None);
    assert_eq!(session.status, SessionStatus::Active);

    for minutes in [1, 15, 120] {
        h.clock.advance(Duration::minutes(minutes));
        assert!(h.controller.tick().await.reminder.is_none());
    }
    assert_eq!(h.alert.plays.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn start_break_then_break_over_notice() {
    let mut h = Harness::new("2026-03-02T09:00:00Z");
    h.controller
        .check_in(two_hour_reminder())
        .await
        .expect("check in");
    h.clock.set(fixed_time("2026-03-02T11:00:00Z"));
    h.controller.tick().await;

    let outcome = h
        .controller
        .respond(ReminderResponse::StartBreak)
        .await
        .expect("start break");
    assert_eq!(outcome, ReminderOutcome::BreakStarted);

    let snapshot = h.controller.snapshot().await;
    assert_eq!(
        snapshot.session.as_ref().map(|s| s.status),
        Some(SessionStatus::OnBreak)
    );
    assert_eq!(
        snapshot.break_ends_at,
        Some(fixed_time("2026-03-02T11:15:00Z"))
    );
    h.drain();

    h.clock.set(fixed_time("2026-03-02T11:14:59Z"));
    assert!(h.controller.tick().await.break_over.is_none());
    h.clock.set(fixed_time("2026-03-02T11:15:00Z"));
    assert!(h.controller.tick().await.break_over.is_some());
    h.clock.set(fixed_time("2026-03-02T11:16:00Z"));
    assert!(h.controller.tick().await.break_over.is_none());

    let resumed = h.controller.resume().await.expect("resume");
    assert_eq!(resumed.break_scheduled_time, None);
    assert_eq!(resumed.total_paused_seconds, 16 * 60);
}

#[tokio::test]
async fn responses_that_no_longer_apply_are_ignored() {
    let h = Harness::new("2026-03-02T09:00:00Z");
    let outcome = h
        .controller
        .respond(ReminderResponse::StartBreak)
        .await
        .expect("no session");
    assert_eq!(outcome, ReminderOutcome::Ignored);

    h.controller
        .check_in(CheckInOptions::default())
        .await
        .expect("check in");
    let outcome = h
        .controller
        .respond(ReminderResponse::Snooze(None))
        .await
        .expect("nothing scheduled");
    assert_eq!(outcome, ReminderOutcome::Ignored);

    h.controller.check_out().await.expect("check out");
    let outcome = h
        .controller
        .respond(ReminderResponse::Skip)
        .await
        .expect("completed");
    assert_eq!(outcome, ReminderOutcome::Ignored);
}

#[tokio::test]
async fn checkout_silences_a_ringing_reminder() {
    let h = Harness::new("2026-03-02T09:00:00Z");
    h.controller
        .check_in(two_hour_reminder())
        .await
        .expect("check in");
    h.clock.set(fixed_time("2026-03-02T11:00:00Z"));
    assert!(h.controller.tick().await.reminder.is_some());

    let done = h.controller.check_out().await.expect("check out");
    assert_eq!(done.break_scheduled_time, None);
    assert_eq!(h.alert.stops.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_checkout_leaves_the_reminder_armed() {
    let h = Harness::new("2026-03-02T09:00:00Z");
    h.controller
        .check_in(two_hour_reminder())
        .await
        .expect("check in");

    h.store.set_failing(true);
    h.clock.set(fixed_time("2026-03-02T10:00:00Z"));
    assert!(h.controller.check_out().await.is_err());
    h.store.set_failing(false);

    let snapshot = h.controller.snapshot().await;
    assert_eq!(
        snapshot.session.as_ref().map(|s| s.status),
        Some(SessionStatus::Active)
    );

    h.clock.set(fixed_time("2026-03-02T11:00:00Z"));
    assert!(h.controller.tick().await.reminder.is_some());
    assert_eq!(h.alert.plays.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn failed_skip_leaves_the_reminder_armed() {
    let h = Harness::new("2026-03-02T09:00:00Z");
    h.controller
        .check_in(two_hour_reminder())
        .await
        .expect("check in");

    h.store.set_failing(true);
    h.clock.set(fixed_time("2026-03-02T10:30:00Z"));
    assert!(h.controller.respond(ReminderResponse::Skip).await.is_err());
    h.store.set_failing(false);

    h.clock.set(fixed_time("2026-03-02T11:00:00Z"));
    let fired = h.controller.tick().await.reminder.expect("still due");
    assert_eq!(fired.due_at, fixed_time("2026-03-02T11:00:00Z"));
}

#[tokio::test]
async fn failed_snooze_keeps_the_original_schedule() {
    let h = Harness::new("2026-03-02T09:00:00Z");
    h.controller
        .check_in(two_hour_reminder())
        .await
        .expect("check in");
    h.clock.set(fixed_time("2026-03-02T11:00:00Z"));
    assert!(h.controller.tick().await.reminder.is_some());

    h.store.set_failing(true);
    assert!(h
        .controller
        .respond(ReminderResponse::Snooze(None))
        .await
        .is_err());
    h.store.set_failing(false);

    let snapshot = h.controller.snapshot().await;
    let session = snapshot.session.expect("still open");
    assert_eq!(session.status, SessionStatus::Active);
    assert_eq!(
        session.break_scheduled_time,
        Some(fixed_time("2026-03-02T11:00:00Z"))
    );

    // A retry goes through once the store recovers.
    let outcome = h
        .controller
        .respond(ReminderResponse::Snooze(None))
        .await
        .expect("snooze");
    assert!(matches!(outcome, ReminderOutcome::Snoozed { .. }));
}

#[tokio::test]
async fn refresh_of_unchanged_state_does_not_refire() {
    let h = Harness::new("2026-03-02T09:00:00Z");
    h.controller
        .check_in(two_hour_reminder())
        .await
        .expect("check in");
    h.clock.set(fixed_time("2026-03-02T11:00:00Z"));
    assert!(h.controller.tick().await.reminder.is_some());

    h.controller.refresh().await.expect("refresh");

    h.clock.set(fixed_time("2026-03-02T11:00:03Z"));
    assert!(h.controller.tick().await.reminder.is_none());
    assert_eq!(h.alert.plays.load(Ordering::SeqCst), 1);
    assert_eq!(h.alert.stops.load(Ordering::SeqCst), 0);
}
