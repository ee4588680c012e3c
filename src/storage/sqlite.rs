//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::crawler::CounterSnapshot;
use crate::extract::ExtractedRecord;
use crate::state::{CrawlLevel, PageState};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{PageRecord, PageVisit, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(CascadeError)` - Failed to open database
    pub fn new(path: &Path) -> crate::Result<Self> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> crate::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

const RUN_COLUMNS: &str =
    "id, started_at, finished_at, config_hash, start_url, status, counters_json";

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<(RunRecord, Option<String>)> {
    let record = RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        start_url: row.get(4)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(5)?).unwrap_or(RunStatus::Running),
        counters: None,
    };
    Ok((record, row.get(6)?))
}

/// Decodes the stored counters JSON into the run record
fn attach_counters(
    (mut record, counters_json): (RunRecord, Option<String>),
) -> StorageResult<RunRecord> {
    record.counters = counters_json
        .as_deref()
        .map(serde_json::from_str::<CounterSnapshot>)
        .transpose()?;
    Ok(record)
}

fn page_from_row(row: &Row<'_>) -> rusqlite::Result<PageRecord> {
    Ok(PageRecord {
        id: row.get(0)?,
        run_id: row.get(1)?,
        url: row.get(2)?,
        level: CrawlLevel::from_db_string(&row.get::<_, String>(3)?).unwrap_or(CrawlLevel::Detail),
        state: PageState::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(PageState::Unreachable),
        status_code: row.get(5)?,
        error_message: row.get(6)?,
        visited_at: row.get(7)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str, start_url: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, start_url, status) VALUES (?1, ?2, ?3, ?4)",
            params![now, config_hash, start_url, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs WHERE id = ?1", RUN_COLUMNS),
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))?;

        attach_counters(row)
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let row = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                run_from_row,
            )
            .optional()?;

        row.map(attach_counters).transpose()
    }

    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let finished_at = (status != RunStatus::Running).then_some(now);
        self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = COALESCE(?2, finished_at) WHERE id = ?3",
            params![status.to_db_string(), finished_at, run_id],
        )?;
        Ok(())
    }

    fn complete_run(&mut self, run_id: i64, counters: &CounterSnapshot) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let counters_json = serde_json::to_string(counters)?;
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, counters_json = ?3 WHERE id = ?4",
            params![RunStatus::Completed.to_db_string(), now, counters_json, run_id],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Page Visits =====

    fn record_page(&mut self, run_id: i64, visit: &PageVisit) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO pages (run_id, url, level, state, status_code, error_message, visited_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                run_id,
                visit.url,
                visit.level.to_db_string(),
                visit.state.to_db_string(),
                visit.status_code,
                visit.error,
                now
            ],
        )?;
        Ok(())
    }

    fn get_failed_pages(&self, run_id: i64) -> StorageResult<Vec<PageRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, run_id, url, level, state, status_code, error_message, visited_at
             FROM pages WHERE run_id = ?1 AND state != ?2 ORDER BY id",
        )?;

        let pages = stmt
            .query_map(
                params![run_id, PageState::Processed.to_db_string()],
                page_from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(pages)
    }

    // ===== Records =====

    fn insert_record(&mut self, run_id: i64, record: &ExtractedRecord) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        let payload = serde_json::to_string(record)?;
        self.conn.execute(
            "INSERT INTO records (run_id, source_url, payload, emitted_at) VALUES (?1, ?2, ?3, ?4)",
            params![run_id, record.url(), payload, now],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn load_records(&self, run_id: i64) -> StorageResult<Vec<ExtractedRecord>> {
        let mut stmt = self
            .conn
            .prepare("SELECT payload FROM records WHERE run_id = ?1 ORDER BY id")?;

        let payloads = stmt
            .query_map(params![run_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        payloads
            .iter()
            .map(|payload| serde_json::from_str(payload).map_err(StorageError::from))
            .collect()
    }

    // ===== Statistics =====

    fn count_records(&self, run_id: i64) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM records WHERE run_id = ?1",
            params![run_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_pages_by_state(&self, run_id: i64, state: PageState) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE run_id = ?1 AND state = ?2",
            params![run_id, state.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn count_pages_by_level(&self, run_id: i64, level: CrawlLevel) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM pages WHERE run_id = ?1 AND level = ?2",
            params![run_id, level.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn get_error_summary(&self, run_id: i64) -> StorageResult<HashMap<PageState, u64>> {
        let mut stmt = self.conn.prepare(
            "SELECT state, COUNT(*) FROM pages WHERE run_id = ?1 AND state != ?2 GROUP BY state",
        )?;

        let rows = stmt
            .query_map(
                params![run_id, PageState::Processed.to_db_string()],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)),
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows
            .into_iter()
            .filter_map(|(state, count)| {
                PageState::from_db_string(&state).map(|state| (state, count as u64))
            })
            .collect())
    }
}
