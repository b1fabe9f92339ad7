//! SQLite persistence layer for the record store.
//!
//! RULE: Only store/ talks to the database.
//! Stages never execute SQL; the engine moves rows in and out.

use crate::{
    checkpoint::StageCheckpoint,
    error::{PipelineError, PipelineResult},
    event::EventLogEntry,
};
use chrono::NaiveDate;
use rusqlite::{params, types::Type, Connection, OptionalExtension};

mod output;
mod records;

pub struct RecordStore {
    conn: Connection,
}

impl RecordStore {
    /// Open (or create) a file-backed store at `path`.
    pub fn open(path: &str) -> PipelineResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode only matters for real files.
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory store (the default for a single batch run).
    pub fn in_memory() -> PipelineResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> PipelineResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_foundation.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_records.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_output.sql"))?;
        Ok(())
    }

    // ── Run ────────────────────────────────────────────────────

    pub fn insert_run(&self, run_id: &str, version: &str) -> PipelineResult<()> {
        let started_at = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO run (run_id, version, started_at) VALUES (?1, ?2, ?3)",
            params![run_id, version, started_at],
        )?;
        Ok(())
    }

    pub fn run_exists(&self, run_id: &str) -> PipelineResult<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM run WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn finish_run(&self, run_id: &str) -> PipelineResult<()> {
        let updated = self.conn.execute(
            "UPDATE run SET finished_at = ?2 WHERE run_id = ?1",
            params![run_id, chrono::Utc::now().to_rfc3339()],
        )?;
        if updated == 0 {
            return Err(PipelineError::RunNotInitialized);
        }
        Ok(())
    }

    pub fn run_finished(&self, run_id: &str) -> PipelineResult<bool> {
        let finished: Option<Option<String>> = self
            .conn
            .query_row(
                "SELECT finished_at FROM run WHERE run_id = ?1",
                params![run_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(matches!(finished, Some(Some(_))))
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> PipelineResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (run_id, seq, stage, event_type, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.run_id,
                entry.seq as i64,
                entry.stage,
                entry.event_type,
                entry.payload,
            ],
        )?;
        Ok(())
    }

    /// Every event of a run in append order.
    pub fn events_for_run(&self, run_id: &str) -> PipelineResult<Vec<EventLogEntry>> {
        self.query_events(
            "SELECT id, run_id, seq, stage, event_type, payload
             FROM event_log WHERE run_id = ?1
             ORDER BY seq ASC",
            params![run_id],
        )
    }

    pub fn events_for_stage(&self, run_id: &str, stage: &str) -> PipelineResult<Vec<EventLogEntry>> {
        self.query_events(
            "SELECT id, run_id, seq, stage, event_type, payload
             FROM event_log WHERE run_id = ?1 AND stage = ?2
             ORDER BY seq ASC",
            params![run_id, stage],
        )
    }

    fn query_events(
        &self,
        sql: &str,
        args: impl rusqlite::Params,
    ) -> PipelineResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(sql)?;
        let entries = stmt
            .query_map(args, |row| {
                Ok(EventLogEntry {
                    id:         Some(row.get(0)?),
                    run_id:     row.get(1)?,
                    seq:        row.get::<_, i64>(2)? as u64,
                    stage:      row.get(3)?,
                    event_type: row.get(4)?,
                    payload:    row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn event_count(&self, run_id: &str, event_type: &str) -> PipelineResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE run_id = ?1 AND event_type = ?2",
            params![run_id, event_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    // ── Checkpoints ────────────────────────────────────────────

    pub fn save_checkpoint(&self, checkpoint: &StageCheckpoint) -> PipelineResult<()> {
        let json = serde_json::to_string(checkpoint)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO stage_checkpoint (run_id, position, stage, state_json)
             VALUES (?1, ?2, ?3, ?4)",
            params![checkpoint.run_id, checkpoint.position as i64, checkpoint.stage, json],
        )?;
        Ok(())
    }

    pub fn checkpoint_for_stage(
        &self,
        run_id: &str,
        stage: &str,
    ) -> PipelineResult<Option<StageCheckpoint>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT state_json FROM stage_checkpoint
                 WHERE run_id = ?1 AND stage = ?2",
                params![run_id, stage],
                |row| row.get(0),
            )
            .optional()?;
        match json {
            Some(j) => Ok(Some(serde_json::from_str(&j)?)),
            None => Ok(None),
        }
    }

    pub fn checkpoint_count(&self, run_id: &str) -> PipelineResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM stage_checkpoint WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

/// Decode an ISO date column.
fn date_column(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
