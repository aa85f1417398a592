use anyhow::Result;
use rusqlite::{params, Row};

use crate::{
    db::{
        helpers::{parse_datetime, parse_pause_kind},
        Database,
    },
    models::PauseRecord,
};

fn row_to_pause(row: &Row) -> Result<PauseRecord> {
    let kind: String = row.get("kind")?;
    let started_at: String = row.get("started_at")?;
    let ended_at: String = row.get("ended_at")?;

    Ok(PauseRecord {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        kind: parse_pause_kind(&kind)?,
        started_at: parse_datetime(&started_at, "started_at")?,
        ended_at: parse_datetime(&ended_at, "ended_at")?,
        duration_seconds: row.get("duration_seconds")?,
    })
}

impl Database {
    pub(crate) async fn insert_pause(&self, record: PauseRecord) -> Result<()> {
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO pauses (id, session_id, kind, started_at, ended_at, duration_seconds)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    record.id,
                    record.session_id,
                    record.kind.as_str(),
                    record.started_at.to_rfc3339(),
                    record.ended_at.to_rfc3339(),
                    record.duration_seconds,
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub(crate) async fn pauses_for(&self, session_id: &str) -> Result<Vec<PauseRecord>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, session_id, kind, started_at, ended_at, duration_seconds
                 FROM pauses
                 WHERE session_id = ?1
                 ORDER BY started_at ASC",
            )?;

            let mut rows = stmt.query(params![session_id])?;
            let mut pauses = Vec::new();
            while let Some(row) = rows.next()? {
                pauses.push(row_to_pause(row)?);
            }
            Ok(pauses)
        })
        .await
    }
}
