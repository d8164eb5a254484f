//! Database operations
//!
//! Single source of truth for blunder records. Review statistics change
//! only through [`Database::update_statistics`], which applies the
//! scheduler's rule under optimistic locking; no direct field writes are
//! exposed.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use super::models::{BlunderRecord, NewBlunder};
use crate::error::{Error, Result};
use crate::scheduler::{self, Outcome, ReviewSchedule, ReviewStats, Stage};

/// Attempts to win an optimistic-lock race before giving up.
const UPDATE_RETRIES: u32 = 3;

const RECORD_COLUMNS: &str = "id, fen, played_move, played_san, acceptable_moves, cp_loss, \
     source, frequency, attempts, correct_streak, misses, stage, due_at, last_outcome, \
     archived, version, created_at";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        // Bound waits on a locked database instead of failing immediately.
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS blunders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                fen TEXT NOT NULL,
                played_move TEXT NOT NULL,
                played_san TEXT NOT NULL,
                acceptable_moves TEXT NOT NULL,
                cp_loss INTEGER NOT NULL,
                source TEXT,
                frequency INTEGER NOT NULL DEFAULT 1,
                attempts INTEGER NOT NULL DEFAULT 0,
                correct_streak INTEGER NOT NULL DEFAULT 0,
                misses INTEGER NOT NULL DEFAULT 0,
                stage INTEGER NOT NULL DEFAULT 0,
                due_at INTEGER NOT NULL,
                last_outcome TEXT,
                archived INTEGER NOT NULL DEFAULT 0,
                version INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                UNIQUE (fen, played_move)
            );

            CREATE INDEX IF NOT EXISTS idx_blunders_due ON blunders(archived, stage, due_at);
            "#,
        )?;
        Ok(())
    }

    /// Records a blunder, or bumps the frequency of an existing record for
    /// the same (position, played move) pair. A repeat also refreshes the
    /// acceptable-move snapshot, since the set is always derived from
    /// current evaluations. Review statistics of an existing record are
    /// left alone.
    pub fn record_blunder(&self, blunder: &NewBlunder, now: u64) -> Result<BlunderRecord> {
        let acceptable = serde_json::to_string(&blunder.acceptable)?;

        self.conn.execute(
            r#"
            INSERT INTO blunders
            (fen, played_move, played_san, acceptable_moves, cp_loss, source, due_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT (fen, played_move) DO UPDATE SET
                frequency = frequency + 1,
                acceptable_moves = excluded.acceptable_moves,
                cp_loss = excluded.cp_loss
            "#,
            params![
                blunder.fen,
                blunder.played_uci,
                blunder.played_san,
                acceptable,
                blunder.cp_loss,
                blunder.source,
                now,
                now,
            ],
        )?;

        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM blunders WHERE fen = ?1 AND played_move = ?2",
            RECORD_COLUMNS
        ))?;
        let record = stmt.query_row(params![blunder.fen, blunder.played_uci], row_to_record)?;
        Ok(record)
    }

    /// Records eligible for review at `now`: not archived, not mastered,
    /// due time passed. Most overdue first; ties go to the earlier stage,
    /// then the older record. Deterministic so drilling is reproducible.
    pub fn fetch_due(&self, now: u64, limit: u32) -> Result<Vec<BlunderRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM blunders
            WHERE archived = 0 AND stage < ?1 AND due_at <= ?2
            ORDER BY due_at ASC, stage ASC, created_at ASC, id ASC
            LIMIT ?3
            "#,
            RECORD_COLUMNS
        ))?;

        let records = stmt
            .query_map(params![Stage::Mastered.as_i64(), now, limit], row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    pub fn fetch_record(&self, id: i64) -> Result<BlunderRecord> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM blunders WHERE id = ?1",
            RECORD_COLUMNS
        ))?;

        stmt.query_row(params![id], row_to_record)
            .optional()?
            .ok_or(Error::RecordNotFound(id))
    }

    /// History query: every record, mastered ones included, newest first.
    pub fn list_records(&self, include_archived: bool) -> Result<Vec<BlunderRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            r#"
            SELECT {} FROM blunders
            WHERE archived <= ?1
            ORDER BY created_at DESC, id DESC
            "#,
            RECORD_COLUMNS
        ))?;

        let records = stmt
            .query_map(params![include_archived as i64], row_to_record)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(records)
    }

    /// Applies the scheduler's statistics-update rule for one attempt and
    /// persists the result atomically. Concurrent reporters for the same
    /// record are serialized through the version column: a lost race is
    /// reloaded and reapplied, so no transition is ever computed from stale
    /// statistics.
    pub fn update_statistics(
        &self,
        id: i64,
        outcome: Outcome,
        schedule: &ReviewSchedule,
        now: u64,
    ) -> Result<BlunderRecord> {
        for _ in 0..UPDATE_RETRIES {
            let record = self.fetch_record(id)?;
            let next = scheduler::apply_outcome(&record.stats, outcome, schedule, now);

            let updated = self.conn.execute(
                r#"
                UPDATE blunders
                SET attempts = ?1, correct_streak = ?2, misses = ?3, stage = ?4,
                    due_at = ?5, last_outcome = ?6, version = version + 1
                WHERE id = ?7 AND version = ?8
                "#,
                params![
                    next.attempts,
                    next.correct_streak,
                    next.misses,
                    next.stage.as_i64(),
                    next.due_at,
                    next.last_outcome.map(|o| o.as_str()),
                    id,
                    record.version,
                ],
            )?;

            if updated == 1 {
                return self.fetch_record(id);
            }
        }

        Err(Error::UpdateConflict(id))
    }

    /// Marks a record inactive. It disappears from [`Database::fetch_due`]
    /// but stays available to history queries.
    pub fn archive(&self, id: i64) -> Result<()> {
        self.set_archived(id, true)
    }

    pub fn unarchive(&self, id: i64) -> Result<()> {
        self.set_archived(id, false)
    }

    fn set_archived(&self, id: i64, archived: bool) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE blunders SET archived = ?1 WHERE id = ?2",
            params![archived as i64, id],
        )?;
        if updated == 0 {
            return Err(Error::RecordNotFound(id));
        }
        Ok(())
    }

    pub fn count_records(&self) -> Result<u32> {
        let count: u32 =
            self.conn
                .query_row("SELECT COUNT(*) FROM blunders", [], |row| row.get(0))?;
        Ok(count)
    }
}

fn row_to_record(row: &rusqlite::Row) -> rusqlite::Result<BlunderRecord> {
    let acceptable_json: String = row.get(4)?;
    let acceptable: Vec<String> = serde_json::from_str(&acceptable_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let stage_value: i64 = row.get(11)?;
    let stage = Stage::from_i64(stage_value)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(11, stage_value))?;

    let last_outcome: Option<String> = row.get(13)?;

    Ok(BlunderRecord {
        id: row.get(0)?,
        fen: row.get(1)?,
        played_uci: row.get(2)?,
        played_san: row.get(3)?,
        acceptable,
        cp_loss: row.get(5)?,
        source: row.get(6)?,
        frequency: row.get(7)?,
        stats: ReviewStats {
            attempts: row.get(8)?,
            correct_streak: row.get(9)?,
            misses: row.get(10)?,
            stage,
            due_at: row.get(12)?,
            last_outcome: last_outcome.as_deref().and_then(Outcome::from_str),
        },
        archived: row.get(14)?,
        version: row.get(15)?,
        created_at: row.get(16)?,
    })
}
