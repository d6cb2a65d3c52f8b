//! SQLite-backed store.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, params};
use tracing::debug;

use crate::error::StoreError;
use crate::models::form::FormKind;
use crate::models::iteration::{AttemptRecord, DocumentRef, IterationRun};

use super::Store;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS documents (
        id TEXT PRIMARY KEY,
        form_kind TEXT NOT NULL,
        registered_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS parse_attempts (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        document_id TEXT NOT NULL,
        form_kind TEXT NOT NULL,
        iteration INTEGER NOT NULL,
        parser_version TEXT NOT NULL,
        success INTEGER NOT NULL,
        error_kind TEXT,
        input_fingerprint TEXT,
        result TEXT NOT NULL,
        recorded_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS iteration_runs (
        form_kind TEXT NOT NULL,
        iteration INTEGER NOT NULL,
        parser_version TEXT NOT NULL,
        mode TEXT NOT NULL,
        total_docs INTEGER NOT NULL,
        success_count INTEGER NOT NULL,
        failure_count INTEGER NOT NULL,
        success_rate TEXT NOT NULL,
        cancelled INTEGER NOT NULL,
        snapshot TEXT NOT NULL,
        created_at TEXT NOT NULL,
        PRIMARY KEY (form_kind, iteration)
    )",
    "CREATE INDEX IF NOT EXISTS idx_documents_kind ON documents (form_kind, id)",
    "CREATE INDEX IF NOT EXISTS idx_attempts_document ON parse_attempts (form_kind, document_id, seq)",
    "CREATE INDEX IF NOT EXISTS idx_attempts_iteration ON parse_attempts (form_kind, iteration)",
];

const ATTEMPT_COLUMNS: &str = "a.document_id, a.form_kind, a.iteration, a.input_fingerprint, a.result, a.recorded_at";

/// A [`Store`] in a single SQLite database file.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        debug!(path = %path.display(), "opening sqlite store");
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        create_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }
}

fn create_tables(conn: &Connection) -> Result<(), StoreError> {
    for sql in SCHEMA {
        conn.execute(sql, [])?;
    }
    Ok(())
}

fn insert_attempt(conn: &Connection, record: &AttemptRecord) -> Result<(), StoreError> {
    let result = serde_json::to_string(&record.result)?;
    conn.execute(
        "INSERT INTO parse_attempts
            (document_id, form_kind, iteration, parser_version, success, error_kind,
             input_fingerprint, result, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            record.document_id,
            record.form_kind.code(),
            record.iteration,
            record.result.parser_version(),
            record.result.success(),
            record.result.error_kind().map(|k| k.code()),
            record.input_fingerprint,
            result,
            record.recorded_at.to_rfc3339(),
        ],
    )?;
    Ok(())
}

/// Raw columns of an attempt row, decoded outside the rusqlite closure.
struct AttemptRow {
    document_id: String,
    form_kind: String,
    iteration: u32,
    input_fingerprint: Option<String>,
    result: String,
    recorded_at: String,
}

impl AttemptRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            document_id: row.get(0)?,
            form_kind: row.get(1)?,
            iteration: row.get(2)?,
            input_fingerprint: row.get(3)?,
            result: row.get(4)?,
            recorded_at: row.get(5)?,
        })
    }

    fn decode(self) -> Result<AttemptRecord, StoreError> {
        Ok(AttemptRecord {
            form_kind: parse_kind("parse_attempts", &self.form_kind)?,
            result: serde_json::from_str(&self.result)?,
            recorded_at: parse_timestamp("parse_attempts", &self.recorded_at)?,
            document_id: self.document_id,
            iteration: self.iteration,
            input_fingerprint: self.input_fingerprint,
        })
    }
}

fn parse_kind(table: &'static str, code: &str) -> Result<FormKind, StoreError> {
    code.parse().map_err(|reason| StoreError::Corrupt { table, reason })
}

fn parse_timestamp(table: &'static str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt {
            table,
            reason: format!("bad timestamp '{}': {}", value, e),
        })
}

fn query_attempts(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<AttemptRecord>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params, AttemptRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    rows.into_iter().map(AttemptRow::decode).collect()
}

impl Store for SqliteStore {
    fn register_document(&self, document: &DocumentRef) -> Result<bool, StoreError> {
        let inserted = self.conn()?.execute(
            "INSERT OR IGNORE INTO documents (id, form_kind, registered_at) VALUES (?1, ?2, ?3)",
            params![document.id, document.form_kind, Utc::now().to_rfc3339()],
        )?;
        Ok(inserted == 1)
    }

    fn documents(&self, kind: FormKind) -> Result<Vec<DocumentRef>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, form_kind FROM documents WHERE form_kind = ?1 ORDER BY id")?;
        let documents = stmt
            .query_map(params![kind.code()], |row| {
                Ok(DocumentRef {
                    id: row.get(0)?,
                    form_kind: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(documents)
    }

    fn append_attempt(&self, record: &AttemptRecord) -> Result<(), StoreError> {
        insert_attempt(&*self.conn()?, record)
    }

    fn append_attempts(&self, records: &[AttemptRecord]) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        for record in records {
            insert_attempt(&tx, record)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn latest_attempts(&self, kind: FormKind) -> Result<HashMap<String, AttemptRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM parse_attempts a
             JOIN (SELECT MAX(seq) AS seq FROM parse_attempts WHERE form_kind = ?1 GROUP BY document_id) l
               ON a.seq = l.seq",
            ATTEMPT_COLUMNS
        );
        let attempts = query_attempts(&*self.conn()?, &sql, params![kind.code()])?;
        Ok(attempts
            .into_iter()
            .map(|a| (a.document_id.clone(), a))
            .collect())
    }

    fn iteration_attempts(&self, kind: FormKind, iteration: u32) -> Result<Vec<AttemptRecord>, StoreError> {
        let sql = format!(
            "SELECT {} FROM parse_attempts a
             JOIN (SELECT MAX(seq) AS seq FROM parse_attempts
                   WHERE form_kind = ?1 AND iteration = ?2 GROUP BY document_id) l
               ON a.seq = l.seq
             ORDER BY a.document_id",
            ATTEMPT_COLUMNS
        );
        query_attempts(&*self.conn()?, &sql, params![kind.code(), iteration])
    }

    fn insert_run(&self, run: &IterationRun) -> Result<(), StoreError> {
        let snapshot = serde_json::to_string(run)?;
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        let exists: Option<u32> = tx
            .query_row(
                "SELECT iteration FROM iteration_runs WHERE form_kind = ?1 AND iteration = ?2",
                params![run.form_kind.code(), run.iteration],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(StoreError::Duplicate {
                form_kind: run.form_kind.to_string(),
                iteration: run.iteration,
            });
        }

        tx.execute(
            "INSERT INTO iteration_runs
                (form_kind, iteration, parser_version, mode, total_docs, success_count,
                 failure_count, success_rate, cancelled, snapshot, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                run.form_kind.code(),
                run.iteration,
                run.parser_version,
                run.mode.code(),
                run.total_docs as i64,
                run.success_count as i64,
                run.failure_count as i64,
                run.success_rate.to_string(),
                run.cancelled,
                snapshot,
                run.created_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        debug!(form_kind = %run.form_kind, iteration = run.iteration, "iteration run stored");
        Ok(())
    }

    fn run(&self, kind: FormKind, iteration: u32) -> Result<Option<IterationRun>, StoreError> {
        let snapshot: Option<String> = self
            .conn()?
            .query_row(
                "SELECT snapshot FROM iteration_runs WHERE form_kind = ?1 AND iteration = ?2",
                params![kind.code(), iteration],
                |row| row.get(0),
            )
            .optional()?;
        Ok(snapshot.map(|s| serde_json::from_str(&s)).transpose()?)
    }

    fn runs(&self, kind: FormKind) -> Result<Vec<IterationRun>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT snapshot FROM iteration_runs WHERE form_kind = ?1 ORDER BY iteration")?;
        let snapshots = stmt
            .query_map(params![kind.code()], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        snapshots
            .iter()
            .map(|s| serde_json::from_str(s).map_err(StoreError::from))
            .collect()
    }

    fn latest_iteration(&self, kind: FormKind) -> Result<Option<u32>, StoreError> {
        let latest: Option<u32> = self.conn()?.query_row(
            "SELECT MAX(iteration) FROM iteration_runs WHERE form_kind = ?1",
            params![kind.code()],
            |row| row.get(0),
        )?;
        Ok(latest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures::{exercise_store, run};

    #[test]
    fn test_sqlite_store() {
        exercise_store(&SqliteStore::open_in_memory().unwrap());
    }

    #[test]
    fn test_sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("regform.sqlite");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.register_document(&DocumentRef::new("a", "dividend")).unwrap();
            store.insert_run(&run(1, 2, 4)).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.documents(FormKind::Dividend).unwrap().len(), 1);
        let stored = store.run(FormKind::Dividend, 1).unwrap().unwrap();
        assert_eq!(stored.total_docs, 4);
        assert_eq!(stored.recomputed_rate(), stored.success_rate);
    }
}
