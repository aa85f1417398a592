mod common;

use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use common::{fixed_time, test_settings};
use punchcard_lib::{
    clock::ManualClock,
    db::Database,
    models::{NewSession, PauseKind, SessionPatch, SessionStatus},
    store::{SessionStore, StoreError},
    tracker::{CheckInOptions, TrackerController, TrackerDeps},
};

fn new_session(owner: &str, at: &str) -> NewSession {
    let check_in_time = fixed_time(at);
    NewSession {
        owner_id: owner.to_string(),
        check_in_time,
        work_date: check_in_time.date_naive(),
        break_scheduled_time: Some(check_in_time + Duration::hours(2)),
        break_duration_minutes: Some(15),
    }
}

#[tokio::test]
async fn round_trips_sessions_and_enforces_one_open_per_owner() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Database::new(dir.path().join("punchcard.sqlite3")).expect("open db");

    let created = db
        .create_session(new_session("ana", "2026-03-02T09:00:00Z"))
        .await
        .expect("create");
    let found = db
        .find_open_session("ana")
        .await
        .expect("find")
        .expect("open session");
    assert_eq!(found, created);

    let err = db
        .create_session(new_session("ana", "2026-03-02T10:00:00Z"))
        .await
        .expect_err("second open session");
    assert!(matches!(err, StoreError::Conflict(_)));

    db.create_session(new_session("ben", "2026-03-02T10:00:00Z"))
        .await
        .expect("other owner");
}

#[tokio::test]
async fn patch_updates_and_clears_fields() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Database::new(dir.path().join("punchcard.sqlite3")).expect("open db");
    let created = db
        .create_session(new_session("ana", "2026-03-02T09:00:00Z"))
        .await
        .expect("create");

    let check_out = fixed_time("2026-03-02T12:00:00Z");
    let updated = db
        .update_session(
            &created.id,
            SessionPatch {
                status: Some(SessionStatus::Completed),
                check_out_time: Some(check_out),
                duration_hours: Some(3.0),
                break_scheduled_time: Some(None),
                updated_at: Some(check_out),
                ..SessionPatch::default()
            },
        )
        .await
        .expect("update");

    assert_eq!(updated.status, SessionStatus::Completed);
    assert_eq!(updated.break_scheduled_time, None);
    assert_eq!(updated.break_duration_minutes, Some(15));
    assert!(db.find_open_session("ana").await.expect("find").is_none());

    let day = NaiveDate::from_ymd_opt(2026, 3, 2).expect("date");
    let listed = db.list_sessions_for_day("ana", day).await.expect("list");
    assert_eq!(listed, vec![updated]);

    let missing = db
        .update_session("nope", SessionPatch::default())
        .await
        .expect_err("unknown id");
    assert!(matches!(missing, StoreError::NotFound(_)));
}

#[tokio::test]
async fn data_survives_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("punchcard.sqlite3");
    let id = {
        let db = Database::new(path.clone()).expect("open db");
        db.create_session(new_session("ana", "2026-03-02T09:00:00Z"))
            .await
            .expect("create")
            .id
    };

    let db = Database::new(path).expect("reopen");
    let session = db.get_session(&id).await.expect("get").expect("exists");
    assert_eq!(session.status, SessionStatus::Active);
}

#[tokio::test]
async fn controller_over_sqlite_records_pause_history() {
    let dir = tempfile::tempdir().expect("tempdir");
    let db = Database::new(dir.path().join("punchcard.sqlite3")).expect("open db");
    let clock = ManualClock::new(fixed_time("2026-03-02T09:00:00Z"));
    let deps = TrackerDeps::new(Arc::new(db.clone())).with_clock(Arc::new(clock.clone()));
    let controller = TrackerController::new("ana", deps, test_settings());

    controller
        .check_in(CheckInOptions::default())
        .await
        .expect("check in");
    clock.advance(Duration::minutes(30));
    controller.pause().await.expect("pause");
    clock.advance(Duration::minutes(5));
    controller.resume().await.expect("resume");
    clock.advance(Duration::minutes(25));
    controller.take_break().await.expect("break");
    clock.advance(Duration::minutes(10));
    let done = controller.check_out().await.expect("check out");

    assert_eq!(done.total_paused_seconds, 15 * 60);
    assert_eq!(done.duration_hours, Some(0.92));

    let pauses = db.list_pauses(&done.id).await.expect("pauses");
    let kinds: Vec<PauseKind> = pauses.iter().map(|p| p.kind).collect();
    assert_eq!(kinds, vec![PauseKind::Pause, PauseKind::Break]);

    let summary = controller.daily_summary(None).await.expect("summary");
    assert_eq!(summary.completed_hours, 0.92);
}
