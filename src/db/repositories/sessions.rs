use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Row};
use uuid::Uuid;

use crate::{
    db::{
        helpers::{format_date, parse_date, parse_datetime, parse_optional_datetime, parse_status, to_u32},
        Database,
    },
    models::{NewSession, Session, SessionPatch, SessionStatus},
};

const SESSION_COLUMNS: &str = "id, owner_id, check_in_time, work_date, status, total_paused_seconds, \
     pause_started_at, check_out_time, duration_hours, break_scheduled_time, \
     break_duration_minutes, created_at, updated_at";

fn row_to_session(row: &Row) -> Result<Session> {
    let check_in_time: String = row.get("check_in_time")?;
    let work_date: String = row.get("work_date")?;
    let status: String = row.get("status")?;
    let pause_started_at: Option<String> = row.get("pause_started_at")?;
    let check_out_time: Option<String> = row.get("check_out_time")?;
    let break_scheduled_time: Option<String> = row.get("break_scheduled_time")?;
    let break_duration_minutes: Option<i64> = row.get("break_duration_minutes")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;

    Ok(Session {
        id: row.get("id")?,
        owner_id: row.get("owner_id")?,
        check_in_time: parse_datetime(&check_in_time, "check_in_time")?,
        work_date: parse_date(&work_date, "work_date")?,
        status: parse_status(&status)?,
        total_paused_seconds: row.get("total_paused_seconds")?,
        pause_started_at: parse_optional_datetime(pause_started_at, "pause_started_at")?,
        check_out_time: parse_optional_datetime(check_out_time, "check_out_time")?,
        duration_hours: row.get("duration_hours")?,
        break_scheduled_time: parse_optional_datetime(break_scheduled_time, "break_scheduled_time")?,
        break_duration_minutes: break_duration_minutes
            .map(|minutes| to_u32(minutes, "break_duration_minutes"))
            .transpose()?,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn select_by_id(conn: &Connection, id: &str) -> Result<Option<Session>> {
    let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(params![id])?;
    match rows.next()? {
        Some(row) => Ok(Some(row_to_session(row)?)),
        None => Ok(None),
    }
}

impl Database {
    pub(crate) async fn insert_session(&self, fields: NewSession) -> Result<Session> {
        let record = fields.into_session(Uuid::new_v4().to_string());
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, owner_id, check_in_time, work_date, status, total_paused_seconds,
                                       pause_started_at, check_out_time, duration_hours, break_scheduled_time,
                                       break_duration_minutes, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    record.id,
                    record.owner_id,
                    record.check_in_time.to_rfc3339(),
                    format_date(record.work_date),
                    record.status.as_str(),
                    record.total_paused_seconds,
                    record.pause_started_at.map(|dt| dt.to_rfc3339()),
                    record.check_out_time.map(|dt| dt.to_rfc3339()),
                    record.duration_hours,
                    record.break_scheduled_time.map(|dt| dt.to_rfc3339()),
                    record.break_duration_minutes,
                    record.created_at.to_rfc3339(),
                    record.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(record)
        })
        .await
    }

    /// Applies `patch` inside one transaction and returns the stored row, or
    /// `None` when no such session exists.
    pub(crate) async fn patch_session(
        &self,
        session_id: &str,
        patch: SessionPatch,
    ) -> Result<Option<Session>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let Some(mut session) = select_by_id(&tx, &session_id)? else {
                return Ok(None);
            };
            patch.apply_to(&mut session);

            tx.execute(
                "UPDATE sessions
                 SET status = ?1,
                     total_paused_seconds = ?2,
                     pause_started_at = ?3,
                     check_out_time = ?4,
                     duration_hours = ?5,
                     break_scheduled_time = ?6,
                     break_duration_minutes = ?7,
                     updated_at = ?8
                 WHERE id = ?9",
                params![
                    session.status.as_str(),
                    session.total_paused_seconds,
                    session.pause_started_at.map(|dt| dt.to_rfc3339()),
                    session.check_out_time.map(|dt| dt.to_rfc3339()),
                    session.duration_hours,
                    session.break_scheduled_time.map(|dt| dt.to_rfc3339()),
                    session.break_duration_minutes,
                    session.updated_at.to_rfc3339(),
                    session.id,
                ],
            )?;
            tx.commit()?;
            Ok(Some(session))
        })
        .await
    }

    pub(crate) async fn session_by_id(&self, session_id: &str) -> Result<Option<Session>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| select_by_id(conn, &session_id))
            .await
    }

    pub(crate) async fn open_session_for(&self, owner_id: &str) -> Result<Option<Session>> {
        let owner_id = owner_id.to_string();
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE owner_id = ?1 AND status != ?2
                 ORDER BY check_in_time DESC
                 LIMIT 1"
            );
            let session = conn
                .query_row(
                    &sql,
                    params![owner_id, SessionStatus::Completed.as_str()],
                    |row| Ok(row_to_session(row)),
                )
                .optional()?
                .transpose()?;
            Ok(session)
        })
        .await
    }

    pub(crate) async fn completed_sessions_on(
        &self,
        owner_id: &str,
        date: NaiveDate,
    ) -> Result<Vec<Session>> {
        let owner_id = owner_id.to_string();
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE owner_id = ?1 AND work_date = ?2 AND status = ?3
                 ORDER BY check_in_time ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![
                owner_id,
                format_date(date),
                SessionStatus::Completed.as_str()
            ])?;

            let mut sessions = Vec::new();
            while let Some(row) = rows.next()? {
                sessions.push(row_to_session(row)?);
            }
            Ok(sessions)
        })
        .await
    }
}
