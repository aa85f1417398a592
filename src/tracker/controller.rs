use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    aggregate::{summarize_day, summarize_range, DailySummary},
    clock::{Clock, SystemClock},
    error::TrackerError,
    models::{PauseRecord, Session, SessionPatch, SessionStatus},
    notify::{AlertPlayer, LogNotifier, Notifier, SilentAlert},
    reminder::{
        plan_response, BreakOver, BreakScheduler, ReminderFired, ReminderOutcome,
        ReminderResponse, ResponsePlan,
    },
    settings::TrackerSettings,
    store::SessionStore,
};

use super::{
    events::{EventSink, LogEventSink, TrackerEvent, TrackerSnapshot},
    state::{self, CheckInOptions, SessionEvent},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

/// Collaborators the controller talks to.
pub struct TrackerDeps {
    pub store: Arc<dyn SessionStore>,
    pub clock: Arc<dyn Clock>,
    pub events: Arc<dyn EventSink>,
    pub notifier: Arc<dyn Notifier>,
    pub alert: Arc<dyn AlertPlayer>,
}

impl TrackerDeps {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            events: Arc::new(LogEventSink),
            notifier: Arc::new(LogNotifier),
            alert: Arc::new(SilentAlert),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_events(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_alert(mut self, alert: Arc<dyn AlertPlayer>) -> Self {
        self.alert = alert;
        self
    }
}

/// Local view of the session: the last store-confirmed record plus the
/// optimistic record of a write still in flight.
#[derive(Debug, Default)]
struct SessionView {
    confirmed: Option<Session>,
    pending: Option<Session>,
}

impl SessionView {
    fn current(&self) -> Option<&Session> {
        self.pending.as_ref().or(self.confirmed.as_ref())
    }

    fn open_id(&self) -> Option<String> {
        self.confirmed
            .as_ref()
            .filter(|s| s.is_open())
            .map(|s| s.id.clone())
    }
}

struct EngineState {
    view: SessionView,
    scheduler: BreakScheduler,
    /// Due-time of the reminder currently on screen.
    shown: Option<DateTime<Utc>>,
    ticks: u32,
}

struct Ticker {
    handle: JoinHandle<()>,
    cancel: CancellationToken,
}

#[derive(Debug, Clone)]
pub struct TickReport {
    pub snapshot: TrackerSnapshot,
    pub reminder: Option<ReminderFired>,
    pub break_over: Option<BreakOver>,
}

/// Owns one owner's session: validates events, writes through the store,
/// and runs the polling task while a session is open.
#[derive(Clone)]
pub struct TrackerController {
    owner_id: Arc<String>,
    settings: Arc<TrackerSettings>,
    state: Arc<Mutex<EngineState>>,
    /// Serializes mutations so only one write is in flight.
    ops: Arc<Mutex<()>>,
    ticker: Arc<Mutex<Option<Ticker>>>,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink>,
    notifier: Arc<dyn Notifier>,
    alert: Arc<dyn AlertPlayer>,
}

impl TrackerController {
    pub fn new(owner_id: impl Into<String>, deps: TrackerDeps, settings: TrackerSettings) -> Self {
        let scheduler = BreakScheduler::new(settings.reminder_window());
        Self {
            owner_id: Arc::new(owner_id.into()),
            settings: Arc::new(settings),
            state: Arc::new(Mutex::new(EngineState {
                view: SessionView::default(),
                scheduler,
                shown: None,
                ticks: 0,
            })),
            ops: Arc::new(Mutex::new(())),
            ticker: Arc::new(Mutex::new(None)),
            store: deps.store,
            clock: deps.clock,
            events: deps.events,
            notifier: deps.notifier,
            alert: deps.alert,
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn settings(&self) -> &TrackerSettings {
        &self.settings
    }

    /// Current instant from the injected clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Loads the owner's open session, if any, and resumes tracking it.
    pub async fn attach(&self) -> Result<TrackerSnapshot, TrackerError> {
        if self.settings.notifications_enabled {
            if let Err(err) = self.notifier.request_permission() {
                log_warn!("notification permission request failed: {err:#}");
            }
        }
        self.refresh().await
    }

    pub async fn snapshot(&self) -> TrackerSnapshot {
        let st = self.state.lock().await;
        TrackerSnapshot::project(
            st.view.current().cloned(),
            st.view.pending.is_some(),
            self.clock.now(),
        )
    }

    pub async fn check_in(&self, options: CheckInOptions) -> Result<Session, TrackerError> {
        let op = self.ops.lock().await;
        let result = self.check_in_locked(options).await;
        drop(op);
        self.after_mutation(result.as_ref().err()).await;
        result
    }

    pub async fn pause(&self) -> Result<Session, TrackerError> {
        self.apply(SessionEvent::Pause).await
    }

    pub async fn take_break(&self) -> Result<Session, TrackerError> {
        self.apply(SessionEvent::TakeBreak).await
    }

    pub async fn resume(&self) -> Result<Session, TrackerError> {
        self.apply(SessionEvent::Resume).await
    }

    pub async fn check_out(&self) -> Result<Session, TrackerError> {
        self.apply(SessionEvent::CheckOut).await
    }

    /// Answers a fired break reminder. Responses that no longer apply are
    /// `Ignored` without touching the store.
    pub async fn respond(
        &self,
        response: ReminderResponse,
    ) -> Result<ReminderOutcome, TrackerError> {
        let op = self.ops.lock().await;
        let result = self.respond_locked(response).await;
        drop(op);
        if !matches!(result, Ok(ReminderOutcome::Ignored)) {
            self.after_mutation(result.as_ref().err()).await;
        }
        result
    }

    /// Re-fetches the canonical session from the store.
    pub async fn refresh(&self) -> Result<TrackerSnapshot, TrackerError> {
        {
            let _op = self.ops.lock().await;
            self.refresh_locked().await?;
        }
        self.sync_ticker().await;
        Ok(self.snapshot().await)
    }

    pub async fn daily_summary(&self, date: Option<NaiveDate>) -> Result<DailySummary, TrackerError> {
        let now = self.clock.now();
        let day = date.unwrap_or_else(|| self.settings.day_boundary().date_of(now));
        let completed = self.store.list_sessions_for_day(&self.owner_id, day).await?;
        let open = self.open_session().await;
        Ok(summarize_day(&completed, open.as_ref(), day, now))
    }

    pub async fn range_summary(
        &self,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<DailySummary>, TrackerError> {
        let now = self.clock.now();
        let mut completed = Vec::new();
        for day in from.iter_days().take_while(|day| *day <= to) {
            completed.extend(self.store.list_sessions_for_day(&self.owner_id, day).await?);
        }
        let open = self.open_session().await;
        Ok(summarize_range(&completed, open.as_ref(), from, to, now))
    }

    /// Completed sessions counted on `date`, plus the open one if it belongs there.
    pub async fn sessions_for_day(&self, date: NaiveDate) -> Result<Vec<Session>, TrackerError> {
        let mut sessions = self.store.list_sessions_for_day(&self.owner_id, date).await?;
        if let Some(open) = self.open_session().await.filter(|s| s.work_date == date) {
            sessions.push(open);
        }
        Ok(sessions)
    }

    pub async fn pauses(&self, session_id: &str) -> Result<Vec<PauseRecord>, TrackerError> {
        Ok(self.store.list_pauses(session_id).await?)
    }

    /// One polling step: derive elapsed time, fire due reminders, emit a
    /// heartbeat and periodically re-fetch. Never fails.
    pub async fn tick(&self) -> TickReport {
        let now = self.clock.now();
        let (report, refresh_due) = {
            let mut st = self.state.lock().await;
            st.ticks = st.ticks.wrapping_add(1);
            let ticks = st.ticks;
            let current = st.view.current().cloned();
            let pending = st.view.pending.is_some();

            let mut reminder = None;
            let mut break_over = None;
            if let Some(session) = &current {
                reminder = st.scheduler.poll(session, now);
                if let Some(fired) = &reminder {
                    // Side effects run under the state lock so a concurrent
                    // check-out or skip cannot interleave with them.
                    st.shown = Some(fired.due_at);
                    self.announce_reminder(fired);
                }
                break_over = st.scheduler.poll_break_over(session, now);
                if let Some(notice) = &break_over {
                    self.announce_break_over(notice);
                }
            }

            let snapshot = TrackerSnapshot::project(current, pending, now);
            if snapshot.session.is_some() && ticks % self.settings.heartbeat_every_ticks.max(1) == 0
            {
                self.events.emit(TrackerEvent::Heartbeat(snapshot.clone()));
            }

            let refresh_due = ticks % self.settings.refresh_every_ticks() == 0;
            (
                TickReport {
                    snapshot,
                    reminder,
                    break_over,
                },
                refresh_due,
            )
        };

        if refresh_due {
            // A mutation in flight will re-sync on its own; never wait on it here.
            if let Ok(_op) = self.ops.try_lock() {
                if let Err(err) = self.refresh_locked().await {
                    log_warn!("session refresh failed: {err}");
                }
            }
        }

        report
    }

    pub async fn is_ticking(&self) -> bool {
        self.ticker
            .lock()
            .await
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
    }

    /// Stops the polling task and any alert; session state is untouched.
    pub async fn shutdown(&self) {
        self.cancel_ticker().await;
        let mut st = self.state.lock().await;
        self.silence(&mut st);
    }

    async fn open_session(&self) -> Option<Session> {
        let st = self.state.lock().await;
        st.view.current().filter(|s| s.is_open()).cloned()
    }

    fn with_defaults(&self, options: CheckInOptions) -> CheckInOptions {
        CheckInOptions {
            break_after: options.break_after.or_else(|| {
                self.settings
                    .default_break_after_minutes
                    .map(|minutes| Duration::minutes(i64::from(minutes)))
            }),
            break_duration_minutes: options
                .break_duration_minutes
                .or(Some(self.settings.break_duration_minutes)),
        }
    }

    async fn check_in_locked(&self, options: CheckInOptions) -> Result<Session, TrackerError> {
        if let Some(open) = self.store.find_open_session(&self.owner_id).await? {
            let from = open.status;
            self.state.lock().await.view.confirmed = Some(open);
            return Err(TrackerError::InvalidTransition {
                from,
                event: SessionEvent::CheckIn,
            });
        }

        let now = self.clock.now();
        let fields = state::check_in(
            &self.owner_id,
            now,
            self.settings.day_boundary().date_of(now),
            self.with_defaults(options),
        );
        let session = self.store.create_session(fields).await?;
        session.validate()?;

        let mut st = self.state.lock().await;
        st.scheduler.reset();
        self.silence(&mut st);
        st.view = SessionView {
            confirmed: Some(session.clone()),
            pending: None,
        };
        log_info!(
            "checked in session {} for {} (break due {:?})",
            session.id,
            self.owner_id,
            session.break_scheduled_time
        );
        Ok(session)
    }

    async fn apply(&self, event: SessionEvent) -> Result<Session, TrackerError> {
        let op = self.ops.lock().await;
        let result = self.apply_locked(event).await;
        drop(op);
        self.after_mutation(result.as_ref().err()).await;
        result
    }

    async fn apply_locked(&self, event: SessionEvent) -> Result<Session, TrackerError> {
        let now = self.clock.now();
        let (before, step) = {
            let mut st = self.state.lock().await;
            let current = st
                .view
                .current()
                .cloned()
                .ok_or_else(|| TrackerError::NoOpenSession {
                    owner_id: self.owner_id.to_string(),
                })?;
            let step = state::transition(&current, event, now)?;

            if matches!(event, SessionEvent::CheckOut | SessionEvent::TakeBreak) {
                self.silence(&mut st);
            }
            st.view.pending = Some(step.session.clone());
            (current, step)
        };

        // While the write is in flight `tick()` sees the pending session, so
        // the latch only moves once the store has accepted the change.
        let saved = self.write(&before, &step.session).await?;
        if event == SessionEvent::CheckOut {
            if let Some(due) = before.break_scheduled_time {
                self.state.lock().await.scheduler.cancel(due);
            }
        }

        if let Some(record) = step.folded {
            // History only; the session row already carries the folded total.
            if let Err(err) = self.store.record_pause(record).await {
                log_warn!("failed to record pause for session {}: {err}", saved.id);
            }
        }

        if saved.status == SessionStatus::Completed {
            log_info!(
                "session {} completed with {:?}h worked",
                saved.id,
                saved.duration_hours
            );
            self.events
                .emit(TrackerEvent::SessionCompleted(saved.clone()));
        }

        Ok(saved)
    }

    async fn respond_locked(
        &self,
        response: ReminderResponse,
    ) -> Result<ReminderOutcome, TrackerError> {
        let now = self.clock.now();
        let plan = {
            let mut st = self.state.lock().await;
            let plan = plan_response(st.view.current(), response, now, self.settings.snooze());
            if plan == ResponsePlan::Ignore {
                self.silence(&mut st);
            }
            plan
        };

        match plan {
            ResponsePlan::Ignore => Ok(ReminderOutcome::Ignored),
            ResponsePlan::Apply(event) => {
                self.apply_locked(event).await?;
                Ok(ReminderOutcome::BreakStarted)
            }
            ResponsePlan::Reschedule { current, next } => {
                let (before, after) = {
                    let mut st = self.state.lock().await;
                    self.silence(&mut st);
                    let Some(before) = st.view.current().cloned() else {
                        return Ok(ReminderOutcome::Ignored);
                    };
                    let Some(after) = state::reschedule_break(&before, next, now) else {
                        return Ok(ReminderOutcome::Ignored);
                    };
                    st.view.pending = Some(after.clone());
                    (before, after)
                };

                self.write(&before, &after).await?;
                self.state.lock().await.scheduler.cancel(current);
                Ok(match next {
                    Some(until) => ReminderOutcome::Snoozed { until },
                    None => ReminderOutcome::Skipped,
                })
            }
        }
    }

    /// Persists `after` and reconciles the local view with the store's
    /// answer. On failure the optimistic record is dropped, which restores
    /// the last confirmed state.
    async fn write(&self, before: &Session, after: &Session) -> Result<Session, TrackerError> {
        let patch = SessionPatch::between(before, after);
        let result = match self.store.update_session(&before.id, patch).await {
            Ok(saved) => saved.validate().map(|_| saved).map_err(TrackerError::from),
            Err(err) => Err(err.into()),
        };

        let mut st = self.state.lock().await;
        st.view.pending = None;
        match result {
            Ok(saved) => {
                st.view.confirmed = Some(saved.clone());
                Ok(saved)
            }
            Err(err) => {
                log_error!("write for session {} failed, rolled back: {err}", before.id);
                Err(err)
            }
        }
    }

    async fn refresh_locked(&self) -> Result<(), TrackerError> {
        let fetched = match self.store.find_open_session(&self.owner_id).await? {
            Some(open) => Some(open),
            None => {
                let tracked = self.state.lock().await.view.open_id();
                match tracked {
                    // Closed elsewhere: pick up its final state.
                    Some(id) => self.store.get_session(&id).await?,
                    None => return Ok(()),
                }
            }
        };
        if let Some(session) = &fetched {
            session.validate()?;
        }

        let mut st = self.state.lock().await;
        let previous = st.view.confirmed.take();
        let same_session = previous.as_ref().map(|s| &s.id) == fetched.as_ref().map(|s| &s.id);
        if !same_session {
            st.scheduler.reset();
        }

        let live_due = fetched
            .as_ref()
            .filter(|s| s.status == SessionStatus::Active)
            .and_then(|s| s.break_scheduled_time);
        if st.shown.is_some() && st.shown != live_due {
            self.silence(&mut st);
        }

        if let (Some(prev), Some(now_session)) = (&previous, &fetched) {
            if same_session && prev.is_open() && !now_session.is_open() {
                self.events
                    .emit(TrackerEvent::SessionCompleted(now_session.clone()));
            }
        }

        log_debug!(
            "refreshed session view: {:?}",
            fetched.as_ref().map(|s| (&s.id, s.status))
        );
        st.view.confirmed = fetched;
        Ok(())
    }

    async fn after_mutation(&self, failure: Option<&TrackerError>) {
        self.sync_ticker().await;
        match failure {
            None => {
                let snapshot = self.snapshot().await;
                self.events.emit(TrackerEvent::StateChanged(snapshot));
            }
            Some(err @ (TrackerError::Store(_) | TrackerError::Invariant(_))) => {
                self.events.emit(TrackerEvent::MutationFailed {
                    message: err.user_message(),
                });
            }
            Some(_) => {}
        }
    }

    fn announce_reminder(&self, fired: &ReminderFired) {
        log_info!(
            "break reminder due {} fired for session {}",
            fired.due_at,
            fired.session_id
        );
        if self.settings.alert_enabled {
            if let Err(err) = self.alert.play() {
                log_warn!("break alert could not start: {err:#}");
            }
        }
        if self.settings.notifications_enabled {
            let body = match fired.break_duration_minutes {
                Some(minutes) => format!("Time for a {minutes}-minute break."),
                None => "Time for a break.".to_string(),
            };
            if let Err(err) = self.notifier.notify("Break reminder", &body) {
                log_warn!("break notification failed: {err:#}");
            }
        }
        self.events.emit(TrackerEvent::ReminderFired(fired.clone()));
    }

    fn announce_break_over(&self, notice: &BreakOver) {
        if self.settings.notifications_enabled {
            if let Err(err) = self
                .notifier
                .notify("Break is over", "Resume when you're ready.")
            {
                log_warn!("break-over notification failed: {err:#}");
            }
        }
        self.events.emit(TrackerEvent::BreakOver(notice.clone()));
    }

    /// Stops the alert and hides the prompt of a shown reminder.
    fn silence(&self, st: &mut EngineState) {
        if st.shown.take().is_none() {
            return;
        }
        if let Err(err) = self.alert.stop() {
            log_warn!("break alert could not stop: {err:#}");
        }
        let session_id = st
            .view
            .current()
            .map(|s| s.id.clone())
            .unwrap_or_default();
        self.events
            .emit(TrackerEvent::ReminderCleared { session_id });
    }

    async fn sync_ticker(&self) {
        let open = self
            .state
            .lock()
            .await
            .view
            .current()
            .is_some_and(|s| s.is_open());
        if open {
            self.spawn_ticker().await;
        } else {
            self.cancel_ticker().await;
        }
    }

    async fn spawn_ticker(&self) {
        let mut ticker_guard = self.ticker.lock().await;
        if ticker_guard
            .as_ref()
            .is_some_and(|t| !t.handle.is_finished())
        {
            return;
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let controller = self.clone();
        let tick_interval = self.settings.tick_interval();

        let handle = tokio::spawn(async move {
            // The first tick waits a full period; callers already hold a fresh snapshot.
            let mut interval = time::interval_at(Instant::now() + tick_interval, tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = interval.tick() => {}
                    _ = token.cancelled() => {
                        log_info!("tracker ticker cancelled");
                        break;
                    }
                }

                let report = controller.tick().await;
                if !report.snapshot.session.as_ref().is_some_and(|s| s.is_open()) {
                    log_info!("no open session; tracker ticker stopping");
                    break;
                }
            }
        });

        *ticker_guard = Some(Ticker { handle, cancel });
    }

    async fn cancel_ticker(&self) {
        if let Some(ticker) = self.ticker.lock().await.take() {
            ticker.cancel.cancel();
        }
    }
}
