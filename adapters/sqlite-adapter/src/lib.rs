//! sqlite-adapter — SQLite implementation of the `WorldState` port for local/dev.
//!
//! Purpose
//! - Provide a lightweight, file-based world state so the development host
//!   can run the contract without a ledger network.
//! - Implements the `WorldState` trait from the `domain` crate.
//!
//! Notes
//! - Uses `rusqlite` with the `bundled` feature for portability.
//! - Keys are TEXT with the default BINARY collation, so range scans come back
//!   in byte-wise key order like the ledger host's.
//! - Range iterators page through the table in batches and only hold the
//!   connection lock while fetching a batch.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use domain::{KeyValue, StateError, StateIterator, WorldState};
use rusqlite::{params, Connection};
use tracing::{debug, trace};

/// Rows fetched per round trip while scanning.
const SCAN_BATCH: i64 = 64;

/// SQLite-backed world state for local development.
pub struct SqliteWorldState {
    conn: Mutex<Connection>,
    open_iterators: AtomicUsize,
}

impl SqliteWorldState {
    /// Open (or create) a SQLite database at the given path and ensure schema.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StateError> {
        let conn = Connection::open(path.as_ref()).map_err(map_sqerr)?;
        init_schema(&conn)?;
        debug!(path = %path.as_ref().display(), "opened sqlite world state");
        Ok(Self {
            conn: Mutex::new(conn),
            open_iterators: AtomicUsize::new(0),
        })
    }

    /// In-memory database, mostly for tests.
    pub fn in_memory() -> Result<Self, StateError> {
        let conn = Connection::open_in_memory().map_err(map_sqerr)?;
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            open_iterators: AtomicUsize::new(0),
        })
    }

    /// Like `new`, creating the parent directory first if needed.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self, StateError> {
        if let Some(dir) = path.as_ref().parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).map_err(|e| StateError::new(format!("create {}: {e}", dir.display())))?;
        }
        Self::new(path)
    }

    /// Number of range iterators handed out and not yet closed.
    pub fn open_iterators(&self) -> usize {
        self.open_iterators.load(Ordering::SeqCst)
    }

    fn fetch_batch(&self, after: &Bound, end: &str) -> Result<Vec<KeyValue>, StateError> {
        let conn = self.conn.lock().map_err(|_| StateError::new("mutex poisoned"))?;
        let (op, from) = match after {
            Bound::Start(s) => (">=", s.as_str()),
            Bound::After(k) => (">", k.as_str()),
        };
        let sql = format!(
            "SELECT key, value FROM world_state WHERE key {op} ?1 AND (?2 = '' OR key < ?2) ORDER BY key LIMIT ?3"
        );
        let mut stmt = conn.prepare_cached(&sql).map_err(map_sqerr)?;
        let mut rows = stmt.query(params![from, end, SCAN_BATCH]).map_err(map_sqerr)?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().map_err(map_sqerr)? {
            out.push(KeyValue {
                key: row.get(0).map_err(map_sqerr)?,
                value: row.get(1).map_err(map_sqerr)?,
            });
        }
        Ok(out)
    }
}

fn init_schema(conn: &Connection) -> Result<(), StateError> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS world_state (
            key TEXT PRIMARY KEY NOT NULL,
            value BLOB NOT NULL
        );
        "#
    ).map_err(map_sqerr)?;
    Ok(())
}

fn map_sqerr<E: std::fmt::Display>(e: E) -> StateError { StateError::new(format!("sqlite error: {e}")) }

impl WorldState for SqliteWorldState {
    fn get_state(&self, key: &str) -> Result<Option<Vec<u8>>, StateError> {
        let conn = self.conn.lock().map_err(|_| StateError::new("mutex poisoned"))?;
        let mut stmt = conn.prepare_cached("SELECT value FROM world_state WHERE key = ?1")
            .map_err(map_sqerr)?;
        let mut rows = stmt.query(params![key]).map_err(map_sqerr)?;
        if let Some(row) = rows.next().map_err(map_sqerr)? {
            Ok(Some(row.get(0).map_err(map_sqerr)?))
        } else {
            Ok(None)
        }
    }

    fn put_state(&self, key: &str, value: &[u8]) -> Result<(), StateError> {
        if key.is_empty() {
            return Err(StateError::new("key must not be empty"));
        }
        let conn = self.conn.lock().map_err(|_| StateError::new("mutex poisoned"))?;
        conn.execute(
            "INSERT INTO world_state(key, value) VALUES (?1, ?2) ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        ).map_err(map_sqerr)?;
        trace!(key = key, bytes = value.len(), "put state");
        Ok(())
    }

    fn del_state(&self, key: &str) -> Result<(), StateError> {
        let conn = self.conn.lock().map_err(|_| StateError::new("mutex poisoned"))?;
        conn.execute("DELETE FROM world_state WHERE key = ?1", params![key])
            .map_err(map_sqerr)?;
        Ok(())
    }

    fn get_state_by_range<'a>(
        &'a self,
        start: &str,
        end: &str,
    ) -> Result<Box<dyn StateIterator + 'a>, StateError> {
        if !start.is_empty() && !end.is_empty() && start > end {
            return Err(StateError::new(format!("invalid range: start {start:?} is after end {end:?}")));
        }
        self.open_iterators.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SqliteRangeIter {
            state: self,
            cursor: Bound::Start(start.to_string()),
            end: end.to_string(),
            buffer: Vec::new(),
            exhausted: false,
            closed: false,
        }))
    }
}

enum Bound {
    Start(String),
    After(String),
}

struct SqliteRangeIter<'a> {
    state: &'a SqliteWorldState,
    cursor: Bound,
    end: String,
    /// Pending rows in reverse order so `pop` yields the next key.
    buffer: Vec<KeyValue>,
    exhausted: bool,
    closed: bool,
}

impl StateIterator for SqliteRangeIter<'_> {
    fn next_entry(&mut self) -> Option<Result<KeyValue, StateError>> {
        if self.closed {
            return Some(Err(StateError::new("iterator already closed")));
        }
        if self.buffer.is_empty() && !self.exhausted {
            match self.state.fetch_batch(&self.cursor, &self.end) {
                Ok(mut batch) => {
                    if (batch.len() as i64) < SCAN_BATCH {
                        self.exhausted = true;
                    }
                    if let Some(last) = batch.last() {
                        self.cursor = Bound::After(last.key.clone());
                    }
                    batch.reverse();
                    self.buffer = batch;
                }
                Err(e) => {
                    self.exhausted = true;
                    return Some(Err(e));
                }
            }
        }
        self.buffer.pop().map(Ok)
    }

    fn close(&mut self) -> Result<(), StateError> {
        if !self.closed {
            self.closed = true;
            self.buffer.clear();
            self.state.open_iterators.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

impl Drop for SqliteRangeIter<'_> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}
