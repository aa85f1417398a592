#![allow(dead_code)]

use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
};

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::mpsc::{self, UnboundedReceiver};

use punchcard_lib::{
    clock::ManualClock,
    models::{NewSession, PauseRecord, Session, SessionPatch},
    notify::{AlertPlayer, Notifier},
    settings::TrackerSettings,
    store::{MemoryStore, SessionStore, StoreError, StoreResult},
    tracker::{ChannelEventSink, TrackerController, TrackerDeps, TrackerEvent},
};

pub fn fixed_time(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .expect("valid datetime")
        .with_timezone(&Utc)
}

/// Settings that keep the background ticker and periodic refresh out of the
/// way so tests drive `tick()` by hand.
pub fn test_settings() -> TrackerSettings {
    TrackerSettings {
        tick_interval_secs: 3600,
        refresh_interval_secs: 3600 * 1000,
        heartbeat_every_ticks: 1000,
        utc_offset_minutes: Some(0),
        ..TrackerSettings::default()
    }
}

#[derive(Default)]
pub struct RecordingAlert {
    pub plays: AtomicUsize,
    pub stops: AtomicUsize,
    pub broken: AtomicBool,
}

impl AlertPlayer for RecordingAlert {
    fn play(&self) -> anyhow::Result<()> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        if self.broken.load(Ordering::SeqCst) {
            return Err(anyhow!("no output device"));
        }
        Ok(())
    }

    fn stop(&self) -> anyhow::Result<()> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn titles(&self) -> Vec<String> {
        self.sent.lock().expect("notifier lock").clone()
    }
}

impl Notifier for RecordingNotifier {
    fn request_permission(&self) -> anyhow::Result<bool> {
        Err(anyhow!("permission prompt unavailable"))
    }

    fn notify(&self, title: &str, _body: &str) -> anyhow::Result<()> {
        self.sent.lock().expect("notifier lock").push(title.to_string());
        Ok(())
    }
}

/// Memory store whose writes can be switched to fail.
#[derive(Clone, Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    pub fail_writes: Arc<AtomicBool>,
}

impl FlakyStore {
    pub fn set_failing(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Backend(anyhow!("disk I/O error")));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FlakyStore {
    async fn create_session(&self, fields: NewSession) -> StoreResult<Session> {
        self.check()?;
        self.inner.create_session(fields).await
    }

    async fn update_session(&self, id: &str, patch: SessionPatch) -> StoreResult<Session> {
        self.check()?;
        self.inner.update_session(id, patch).await
    }

    async fn find_open_session(&self, owner_id: &str) -> StoreResult<Option<Session>> {
        self.inner.find_open_session(owner_id).await
    }

    async fn list_sessions_for_day(
        &self,
        owner_id: &str,
        date: NaiveDate,
    ) -> StoreResult<Vec<Session>> {
        self.inner.list_sessions_for_day(owner_id, date).await
    }

    async fn get_session(&self, id: &str) -> StoreResult<Option<Session>> {
        self.inner.get_session(id).await
    }

    async fn record_pause(&self, record: PauseRecord) -> StoreResult<()> {
        self.check()?;
        self.inner.record_pause(record).await
    }

    async fn list_pauses(&self, session_id: &str) -> StoreResult<Vec<PauseRecord>> {
        self.inner.list_pauses(session_id).await
    }
}

pub struct Harness {
    pub controller: TrackerController,
    pub store: FlakyStore,
    pub clock: ManualClock,
    pub alert: Arc<RecordingAlert>,
    pub notifier: Arc<RecordingNotifier>,
    pub events: UnboundedReceiver<TrackerEvent>,
}

impl Harness {
    pub fn new(start: &str) -> Self {
        Self::with_settings(start, test_settings())
    }

    pub fn with_settings(start: &str, settings: TrackerSettings) -> Self {
        Self::with_store(start, settings, FlakyStore::default())
    }

    pub fn with_store(start: &str, settings: TrackerSettings, store: FlakyStore) -> Self {
        let clock = ManualClock::new(fixed_time(start));
        let alert = Arc::new(RecordingAlert::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let (tx, events) = mpsc::unbounded_channel();

        let deps = TrackerDeps::new(Arc::new(store.clone()))
            .with_clock(Arc::new(clock.clone()))
            .with_events(Arc::new(ChannelEventSink::new(tx)))
            .with_alert(alert.clone())
            .with_notifier(notifier.clone());

        Self {
            controller: TrackerController::new("owner-1", deps, settings),
            store,
            clock,
            alert,
            notifier,
            events,
        }
    }

    /// Everything emitted since the last drain.
    pub fn drain(&mut self) -> Vec<TrackerEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            out.push(event);
        }
        out
    }
}
