//! SQLite persistence for recorded test cases

use crate::types::{NewTestCase, TestCase, TestStatus};
use crate::{Error, Result};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Storage for test cases handed over by the recorder
///
/// Implementations must be cheap to share across tasks; every call is short
/// and synchronous.
pub trait TestCaseStore: Send + Sync {
    /// Persist a new test case and return the stored record
    fn create(&self, new: NewTestCase) -> Result<TestCase>;

    /// Fetch a test case by id
    fn get(&self, id: &str) -> Result<Option<TestCase>>;

    /// List test cases, newest first, optionally filtered by free text
    /// matched against name, url and code
    fn search(&self, query: Option<&str>) -> Result<Vec<TestCase>>;

    /// Delete a test case, returning whether it existed
    fn delete(&self, id: &str) -> Result<bool>;

    /// Record the outcome of a replay of a stored test case
    fn record_run(&self, id: &str, status: TestStatus) -> Result<TestCase>;
}

/// SQLite-backed test-case store
#[derive(Clone)]
pub struct SqliteTestStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteTestStore {
    /// Open or create database at path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.init_schema()?;

        info!("Opened test store at {:?}", path.as_ref());
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS test_cases (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT NOT NULL,
                code TEXT NOT NULL DEFAULT '',
                steps TEXT NOT NULL DEFAULT '[]',
                status TEXT NOT NULL DEFAULT '"not run"',
                metadata TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                last_run_at INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_test_cases_name ON test_cases(name);
            CREATE INDEX IF NOT EXISTS idx_test_cases_created ON test_cases(created_at);
            "#,
        )?;

        debug!("Database schema initialized");
        Ok(())
    }

    fn insert(&self, record: &TestCase) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "INSERT INTO test_cases (id, name, url, code, steps, status, metadata, created_at, updated_at, last_run_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                record.id,
                record.name,
                record.url,
                record.code,
                serde_json::to_string(&record.steps)?,
                serde_json::to_string(&record.status)?,
                serde_json::to_string(&record.metadata)?,
                record.created_at,
                record.updated_at,
                record.last_run_at,
            ],
        )?;

        debug!("Inserted test case {} ({})", record.name, record.id);
        Ok(())
    }
}

const SELECT_COLUMNS: &str =
    "SELECT id, name, url, code, steps, status, metadata, created_at, updated_at, last_run_at FROM test_cases";

/// Escape `LIKE` wildcards so user queries match literally (paired with `ESCAPE '\'`)
fn escape_like(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len());
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn raw_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRow> {
    Ok(RawRow {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        code: row.get(3)?,
        steps: row.get(4)?,
        status: row.get(5)?,
        metadata: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        last_run_at: row.get(9)?,
    })
}

impl TestCaseStore for SqliteTestStore {
    fn create(&self, new: NewTestCase) -> Result<TestCase> {
        if new.name.trim().is_empty() {
            return Err(Error::InvalidRequest("test name must not be empty".to_string()));
        }
        let record = new.into_record();
        self.insert(&record)?;
        Ok(record)
    }

    fn get(&self, id: &str) -> Result<Option<TestCase>> {
        let conn = self.conn.lock();

        let row = conn
            .query_row(&format!("{} WHERE id = ?1", SELECT_COLUMNS), params![id], raw_row)
            .optional()?;

        match row {
            Some(raw) => Ok(Some(raw.parse()?)),
            None => Ok(None),
        }
    }

    fn search(&self, query: Option<&str>) -> Result<Vec<TestCase>> {
        let conn = self.conn.lock();

        let mut results = Vec::new();
        match query.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => {
                let pattern = format!("%{}%", escape_like(q));
                let mut stmt = conn.prepare(&format!(
                    "{} WHERE name LIKE ?1 ESCAPE '\\' OR url LIKE ?1 ESCAPE '\\' OR code LIKE ?1 ESCAPE '\\' \
                     ORDER BY created_at DESC, rowid DESC",
                    SELECT_COLUMNS
                ))?;
                let rows = stmt.query_map(params![pattern], raw_row)?;
                for row in rows {
                    results.push(row?.parse()?);
                }
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "{} ORDER BY created_at DESC, rowid DESC",
                    SELECT_COLUMNS
                ))?;
                let rows = stmt.query_map([], raw_row)?;
                for row in rows {
                    results.push(row?.parse()?);
                }
            }
        }

        Ok(results)
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute("DELETE FROM test_cases WHERE id = ?1", params![id])?;

        if rows > 0 {
            debug!("Deleted test case {}", id);
        }

        Ok(rows > 0)
    }

    fn record_run(&self, id: &str, status: TestStatus) -> Result<TestCase> {
        {
            let conn = self.conn.lock();
            let now = chrono::Utc::now().timestamp();
            let rows = conn.execute(
                "UPDATE test_cases SET status = ?1, last_run_at = ?2, updated_at = ?2 WHERE id = ?3",
                params![serde_json::to_string(&status)?, now, id],
            )?;
            if rows == 0 {
                return Err(Error::test_not_found(id));
            }
        }

        self.get(id)?.ok_or_else(|| Error::test_not_found(id))
    }
}

/// Raw database row before parsing
struct RawRow {
    id: String,
    name: String,
    url: String,
    code: String,
    steps: String,
    status: String,
    metadata: String,
    created_at: i64,
    updated_at: i64,
    last_run_at: Option<i64>,
}

impl RawRow {
    fn parse(self) -> Result<TestCase> {
        Ok(TestCase {
            id: self.id,
            name: self.name,
            url: self.url,
            code: self.code,
            steps: serde_json::from_str(&self.steps)?,
            status: serde_json::from_str(&self.status)?,
            metadata: serde_json::from_str(&self.metadata)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_run_at: self.last_run_at,
        })
    }
}
