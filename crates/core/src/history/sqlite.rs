//! SQLite-backed job store implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use super::store::{JobFilter, JobStore, JobStoreError};
use super::types::{
    HistoryEntry, HistoryEvent, JobInput, JobRecord, JobResult, OrchestrationState, RuntimeStatus,
};

const JOB_COLUMNS: &str =
    "id, input, runtime_status, state, output, error, created_at, updated_at";

/// SQLite-backed job store.
pub struct SqliteJobStore {
    conn: Mutex<Connection>,
}

impl SqliteJobStore {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, JobStoreError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite job store (useful for testing).
    pub fn in_memory() -> Result<Self, JobStoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), JobStoreError> {
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS jobs (
                id TEXT PRIMARY KEY,
                input TEXT NOT NULL,
                runtime_status TEXT NOT NULL,
                state TEXT NOT NULL,
                output TEXT,
                error TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_jobs_runtime_status ON jobs(runtime_status);
            CREATE INDEX IF NOT EXISTS idx_jobs_created_at ON jobs(created_at DESC);

            CREATE TABLE IF NOT EXISTS job_history (
                job_id TEXT NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
                sequence INTEGER NOT NULL,
                event_type TEXT NOT NULL,
                event TEXT NOT NULL,
                recorded_at TEXT NOT NULL,
                PRIMARY KEY (job_id, sequence)
            );
            "#,
        )?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, JobStoreError> {
        self.conn
            .lock()
            .map_err(|_| JobStoreError::Database("connection lock poisoned".to_string()))
    }

    fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<JobRecord> {
        let id: String = row.get(0)?;
        let input_json: String = row.get(1)?;
        let status_str: String = row.get(2)?;
        let state_json: String = row.get(3)?;
        let output_json: Option<String> = row.get(4)?;
        let error: Option<String> = row.get(5)?;
        let created_at_str: String = row.get(6)?;
        let updated_at_str: String = row.get(7)?;

        let input: JobInput = from_json_column(1, &input_json)?;
        let runtime_status = RuntimeStatus::parse(&status_str).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                rusqlite::types::Type::Text,
                format!("unknown runtime status: {}", status_str).into(),
            )
        })?;
        let state: OrchestrationState = from_json_column(3, &state_json)?;
        let output: Option<JobResult> = output_json
            .map(|json| from_json_column(4, &json))
            .transpose()?;

        Ok(JobRecord {
            id,
            input,
            runtime_status,
            state,
            output,
            error,
            created_at: parse_timestamp(6, &created_at_str)?,
            updated_at: parse_timestamp(7, &updated_at_str)?,
        })
    }

    fn load_job(conn: &Connection, id: &str) -> Result<Option<JobRecord>, JobStoreError> {
        let job = conn
            .query_row(
                &format!("SELECT {} FROM jobs WHERE id = ?", JOB_COLUMNS),
                params![id],
                Self::row_to_job,
            )
            .optional()?;
        Ok(job)
    }
}

fn from_json_column<T: serde::de::DeserializeOwned>(idx: usize, json: &str) -> rusqlite::Result<T> {
    serde_json::from_str(json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn parse_timestamp(idx: usize, s: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

impl JobStore for SqliteJobStore {
    fn create(&self, input: &JobInput) -> Result<JobRecord, JobStoreError> {
        let conn = self.lock()?;

        let record = JobRecord::new(uuid::Uuid::new_v4().to_string(), input.clone(), Utc::now());

        conn.execute(
            "INSERT INTO jobs (id, input, runtime_status, state, output, error, created_at, updated_at) VALUES (?, ?, ?, ?, NULL, NULL, ?, ?)",
            params![
                record.id,
                serde_json::to_string(&record.input)?,
                record.runtime_status.as_str(),
                serde_json::to_string(&record.state)?,
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )?;

        Ok(record)
    }

    fn get(&self, id: &str) -> Result<Option<JobRecord>, JobStoreError> {
        let conn = self.lock()?;
        Self::load_job(&conn, id)
    }

    fn list(&self, filter: &JobFilter) -> Result<Vec<JobRecord>, JobStoreError> {
        let conn = self.lock()?;

        let mut sql = format!("SELECT {} FROM jobs", JOB_COLUMNS);
        let mut values: Vec<String> = Vec::new();
        if !filter.statuses.is_empty() {
            let placeholders = vec!["?"; filter.statuses.len()].join(", ");
            sql.push_str(&format!(" WHERE runtime_status IN ({})", placeholders));
            values.extend(filter.statuses.iter().map(|s| s.as_str().to_string()));
        }
        sql.push_str(&format!(
            " ORDER BY created_at DESC, id LIMIT {} OFFSET {}",
            filter.limit.max(0),
            filter.offset.max(0)
        ));

        let mut stmt = conn.prepare(&sql)?;
        let jobs = stmt
            .query_map(params_from_iter(values.iter()), Self::row_to_job)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(jobs)
    }

    fn append(&self, id: &str, event: &HistoryEvent) -> Result<JobRecord, JobStoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let mut job =
            Self::load_job(&tx, id)?.ok_or_else(|| JobStoreError::NotFound(id.to_string()))?;

        if job.is_terminal() && !matches!(event, HistoryEvent::EventRaised { .. }) {
            return Err(JobStoreError::AlreadyTerminal {
                id: id.to_string(),
                status: job.runtime_status,
            });
        }

        if matches!(event, HistoryEvent::ActivityScheduled { .. }) {
            let termination_pending: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM job_history WHERE job_id = ? AND event_type = ?)",
                params![id, "termination_requested"],
                |row| row.get(0),
            )?;
            if termination_pending {
                return Err(JobStoreError::TerminationPending(id.to_string()));
            }
        }

        let sequence: i64 = tx.query_row(
            "SELECT COALESCE(MAX(sequence), 0) + 1 FROM job_history WHERE job_id = ?",
            params![id],
            |row| row.get(0),
        )?;
        let now = Utc::now();

        tx.execute(
            "INSERT INTO job_history (job_id, sequence, event_type, event, recorded_at) VALUES (?, ?, ?, ?, ?)",
            params![
                id,
                sequence,
                event.event_type(),
                serde_json::to_string(event)?,
                now.to_rfc3339(),
            ],
        )?;

        job.apply(event, now);

        let output_json = job.output.as_ref().map(serde_json::to_string).transpose()?;
        tx.execute(
            "UPDATE jobs SET runtime_status = ?, state = ?, output = ?, error = ?, updated_at = ? WHERE id = ?",
            params![
                job.runtime_status.as_str(),
                serde_json::to_string(&job.state)?,
                output_json,
                job.error,
                job.updated_at.to_rfc3339(),
                id,
            ],
        )?;

        tx.commit()?;
        Ok(job)
    }

    fn history(&self, id: &str) -> Result<Vec<HistoryEntry>, JobStoreError> {
        let conn = self.lock()?;

        if Self::load_job(&conn, id)?.is_none() {
            return Err(JobStoreError::NotFound(id.to_string()));
        }

        let mut stmt = conn.prepare(
            "SELECT sequence, event, recorded_at FROM job_history WHERE job_id = ? ORDER BY sequence",
        )?;
        let entries = stmt
            .query_map(params![id], |row| {
                let sequence: i64 = row.get(0)?;
                let event_json: String = row.get(1)?;
                let recorded_at_str: String = row.get(2)?;
                Ok(HistoryEntry {
                    sequence,
                    event: from_json_column(1, &event_json)?,
                    recorded_at: parse_timestamp(2, &recorded_at_str)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn purge(&self, id: &str) -> Result<bool, JobStoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM job_history WHERE job_id = ?", params![id])?;
        let deleted = tx.execute("DELETE FROM jobs WHERE id = ?", params![id])?;
        tx.commit()?;
        Ok(deleted > 0)
    }
}
