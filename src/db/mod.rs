//! SQLite-backed `SessionStore`. All statements run on one worker thread
//! that owns the connection; callers await replies over oneshot channels.
//!
//! `impl SessionStore for Database` at the bottom wraps each repository
//! call in `execute()`. A unique-index violation (a second open session for
//! one owner) comes back as `StoreError::Conflict`; any other failure is
//! `StoreError::Backend`.

use std::{
    path::{Path, PathBuf},
    sync::{mpsc, Arc, Mutex},
    thread::{self, JoinHandle},
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use rusqlite::{Connection, ErrorCode};
use tokio::sync::oneshot;

mod helpers;
mod migrations;
mod repositories;

use migrations::run_migrations;

use crate::{
    models::{NewSession, PauseRecord, Session, SessionPatch},
    store::{SessionStore, StoreError, StoreResult},
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info};

type DbTask = Box<dyn FnOnce(&mut Connection) + Send + 'static>;

enum DbCommand {
    Execute(DbTask),
    Shutdown,
}

struct DatabaseInner {
    sender: mpsc::Sender<DbCommand>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for DatabaseInner {
    fn drop(&mut self) {
        let mut guard = match self.worker.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some(handle) = guard.take() {
            if let Err(err) = self.sender.send(DbCommand::Shutdown) {
                log_error!("Failed to send shutdown to DB thread: {err}");
            }
            if let Err(join_err) = handle.join() {
                log_error!("Failed to join DB thread: {join_err:?}");
            }
        }
    }
}

#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
    db_path: Arc<PathBuf>,
}

impl Database {
    pub fn new(db_path: PathBuf) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }

        let (command_tx, command_rx) = mpsc::channel::<DbCommand>();
        let (ready_tx, ready_rx) = mpsc::channel();
        let path_for_thread = db_path.clone();

        let worker = thread::Builder::new()
            .name("punchcard-db".into())
            .spawn(move || {
                let mut conn = match Connection::open(&path_for_thread) {
                    Ok(connection) => connection,
                    Err(err) => {
                        let _ = ready_tx.send(Err(anyhow::Error::new(err)
                            .context("failed to open SQLite database")));
                        return;
                    }
                };

                if let Err(err) = conn.pragma_update(None, "journal_mode", "WAL") {
                    log_error!("Failed to enable WAL mode: {err}");
                }
                if let Err(err) = conn.pragma_update(None, "foreign_keys", "ON") {
                    log_error!("Failed to enable foreign keys: {err}");
                }

                let init_result =
                    run_migrations(&mut conn).context("failed to run database migrations");
                if ready_tx.send(init_result).is_err() {
                    log_error!("DB initialization receiver dropped before ready signal");
                    return;
                }

                while let Ok(command) = command_rx.recv() {
                    match command {
                        DbCommand::Execute(task) => task(&mut conn),
                        DbCommand::Shutdown => break,
                    }
                }

                log_info!("Database thread shutting down");
            })
            .context("failed to spawn database worker thread")?;

        ready_rx
            .recv()
            .context("database worker exited before signaling readiness")??;

        log_info!("Database initialized at {}", db_path.display());

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                sender: command_tx,
                worker: Mutex::new(Some(worker)),
            }),
            db_path: Arc::new(db_path),
        })
    }

    pub fn path(&self) -> &Path {
        self.db_path.as_path()
    }

    pub async fn execute<F, T>(&self, task: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let sender = self.inner.sender.clone();
        let (reply_tx, reply_rx) = oneshot::channel();

        let command = DbCommand::Execute(Box::new(move |conn| {
            let result = task(conn);
            if reply_tx.send(result).is_err() {
                log_error!("DB caller dropped before receiving result");
            }
        }));

        sender
            .send(command)
            .map_err(|err| anyhow!("failed to send command to DB thread: {err}"))?;

        reply_rx
            .await
            .map_err(|_| anyhow!("database thread terminated unexpectedly"))?
    }
}

/// Unique-index violations mean a second open session for the owner.
fn store_error(err: anyhow::Error) -> StoreError {
    let constraint = err
        .downcast_ref::<rusqlite::Error>()
        .and_then(|e| e.sqlite_error_code())
        .is_some_and(|code| code == ErrorCode::ConstraintViolation);
    if constraint {
        StoreError::Conflict(format!("{err:#}"))
    } else {
        StoreError::Backend(err)
    }
}

#[async_trait]
impl SessionStore for Database {
    async fn create_session(&self, fields: NewSession) -> StoreResult<Session> {
        self.insert_session(fields).await.map_err(store_error)
    }

    async fn update_session(&self, id: &str, patch: SessionPatch) -> StoreResult<Session> {
        self.patch_session(id, patch)
            .await
            .map_err(store_error)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    async fn find_open_session(&self, owner_id: &str) -> StoreResult<Option<Session>> {
        self.open_session_for(owner_id).await.map_err(store_error)
    }

    async fn list_sessions_for_day(
        &self,
        owner_id: &str,
        date: NaiveDate,
    ) -> StoreResult<Vec<Session>> {
        self.completed_sessions_on(owner_id, date)
            .await
            .map_err(store_error)
    }

    async fn get_session(&self, id: &str) -> StoreResult<Option<Session>> {
        self.session_by_id(id).await.map_err(store_error)
    }

    async fn record_pause(&self, record: PauseRecord) -> StoreResult<()> {
        self.insert_pause(record).await.map_err(store_error)
    }

    async fn list_pauses(&self, session_id: &str) -> StoreResult<Vec<PauseRecord>> {
        self.pauses_for(session_id).await.map_err(store_error)
    }
}
