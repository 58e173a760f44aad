//! SQLite-based outcome storage and key-value state.
//!
//! Provides persistent storage for:
//! - Intervention outcome records (append-only)
//! - Key-value store for bandit posteriors and cooldown clocks

use async_trait::async_trait;
use rusqlite::{params, Connection, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::{data_dir, migrations, KeyValueStore, OutcomeStore};
use crate::error::{DatabaseError, Result};
use crate::model::{ContentType, InterventionOutcomeRecord, InterventionType, UserChoice, UserFeedback};

const OUTCOME_COLUMNS: &str = "session_id, target_app, intervention_type, content_type,
    hour_of_day, day_of_week, is_weekend, is_late_night, session_count_this_bout,
    quick_reopen_flag, session_duration_at_show_ms, user_choice, time_to_decision_ms,
    user_feedback, was_snoozed, timestamp, session_ended_normally, final_session_duration_ms";

/// SQLite database for outcome storage.
///
/// The connection sits behind a mutex so the handle can be shared across
/// tasks; every statement is a single short critical section.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open the database at `~/.config/jitai/jitai.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self> {
        Self::open_at(&data_dir()?.join("jitai.db"))
    }

    /// Open (or create) a database file at an explicit path.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        migrations::migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DatabaseError::Poisoned.into())
    }

    /// Insert one outcome row.
    ///
    /// # Errors
    /// Returns an error if the insert fails.
    pub fn insert_outcome(&self, record: &InterventionOutcomeRecord) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            &format!(
                "INSERT INTO intervention_outcomes ({OUTCOME_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)"
            ),
            params![
                record.session_id,
                record.target_app,
                record.intervention_type.as_str(),
                record.content_type.as_str(),
                record.hour_of_day,
                record.day_of_week,
                record.is_weekend,
                record.is_late_night,
                record.session_count_this_bout,
                record.quick_reopen_flag,
                record.session_duration_at_show_ms,
                record.user_choice.as_str(),
                record.time_to_decision_ms,
                record.user_feedback.as_str(),
                record.was_snoozed,
                record.timestamp,
                record.session_ended_normally,
                record.final_session_duration_ms,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Outcomes in `[start_ms, end_ms]`, oldest first, with offset/limit paging.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn outcomes_in_range(
        &self,
        start_ms: i64,
        end_ms: i64,
        offset: usize,
        limit: Option<usize>,
    ) -> Result<Vec<InterventionOutcomeRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {OUTCOME_COLUMNS}
             FROM intervention_outcomes
             WHERE timestamp >= ?1 AND timestamp <= ?2
             ORDER BY timestamp ASC, id ASC
             LIMIT ?3 OFFSET ?4"
        ))?;
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let rows = stmt.query_map(params![start_ms, end_ms, limit, offset as i64], row_to_outcome)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Count of stored outcomes.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn outcome_count(&self) -> Result<u64> {
        let conn = self.conn()?;
        let count = conn.query_row("SELECT COUNT(*) FROM intervention_outcomes", [], |row| {
            row.get::<_, i64>(0)
        })?;
        Ok(count.max(0) as u64)
    }

    /// Get a value from the kv store.
    ///
    /// # Errors
    /// Returns an error if the query fails.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    ///
    /// # Errors
    /// Returns an error if the write fails.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

fn row_to_outcome(row: &Row<'_>) -> rusqlite::Result<InterventionOutcomeRecord> {
    let intervention_type: String = row.get(2)?;
    let content_type: String = row.get(3)?;
    let user_choice: String = row.get(11)?;
    let user_feedback: String = row.get(13)?;

    let content_type = ContentType::parse(&content_type).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let intervention_type = InterventionType::parse(&intervention_type).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(InterventionOutcomeRecord {
        session_id: row.get(0)?,
        target_app: row.get(1)?,
        intervention_type,
        content_type,
        hour_of_day: row.get(4)?,
        day_of_week: row.get(5)?,
        is_weekend: row.get(6)?,
        is_late_night: row.get(7)?,
        session_count_this_bout: row.get(8)?,
        quick_reopen_flag: row.get(9)?,
        session_duration_at_show_ms: row.get(10)?,
        user_choice: UserChoice::parse(&user_choice),
        time_to_decision_ms: row.get(12)?,
        user_feedback: UserFeedback::parse(&user_feedback),
        was_snoozed: row.get(14)?,
        timestamp: row.get(15)?,
        session_ended_normally: row.get(16)?,
        final_session_duration_ms: row.get(17)?,
    })
}

#[async_trait]
impl OutcomeStore for Database {
    async fn append(&self, record: &InterventionOutcomeRecord) -> Result<i64> {
        self.insert_outcome(record)
    }

    async fn results_in_range(
        &self,
        start_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<InterventionOutcomeRecord>> {
        self.outcomes_in_range(start_ms, end_ms, 0, None)
    }

    async fn results_page(
        &self,
        start_ms: i64,
        end_ms: i64,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<InterventionOutcomeRecord>> {
        self.outcomes_in_range(start_ms, end_ms, offset, Some(limit))
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.kv_get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.kv_set(key, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(ts: i64, choice: UserChoice) -> InterventionOutcomeRecord {
        let mut record =
            InterventionOutcomeRecord::new("session-1", "com.example.feed", ContentType::UsageStats, choice, ts)
                .at_local_time(23, 5);
        record.user_feedback = UserFeedback::Helpful;
        record.final_session_duration_ms = Some(120_000);
        record
    }

    #[test]
    fn record_and_query() {
        let db = Database::open_memory().unwrap();
        db.insert_outcome(&sample(1_000, UserChoice::GoBack)).unwrap();
        db.insert_outcome(&sample(2_000, UserChoice::Timeout)).unwrap();

        let all = db.outcomes_in_range(0, 10_000, 0, None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], sample(1_000, UserChoice::GoBack));
        assert_eq!(all[1].user_choice, UserChoice::Timeout);
        assert!(all[1].is_late_night);
        assert_eq!(db.outcome_count().unwrap(), 2);
    }

    #[test]
    fn paging_respects_offset_and_limit() {
        let db = Database::open_memory().unwrap();
        for ts in 0..7 {
            db.insert_outcome(&sample(ts, UserChoice::Dismiss)).unwrap();
        }
        let page = db.outcomes_in_range(0, 100, 5, Some(5)).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].timestamp, 5);
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_set("test", "again").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "again");
    }

    #[test]
    fn file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jitai.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.kv_set("k", "v").unwrap();
            db.insert_outcome(&sample(5, UserChoice::GoBack)).unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.kv_get("k").unwrap().as_deref(), Some("v"));
        assert_eq!(db.outcome_count().unwrap(), 1);
    }
}
