//! SQLite-backed queue store
//!
//! One table for all sessions. Rows are ordered by an autoincrement
//! sequence; positions are computed at read time, so deleting a row shifts
//! the later positions without rewriting anything.

use std::ops::Range;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{QueueEntry, QueueStore};
use crate::error::{QueueError, QueueResult};

/// Queue store persisted in a SQLite database
#[derive(Clone)]
pub struct SqliteQueueStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteQueueStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteQueueStore").finish_non_exhaustive()
    }
}

impl SqliteQueueStore {
    /// Opens (and creates if needed) the database at `db_path`
    pub fn open(db_path: &Path) -> QueueResult<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                QueueError::Persistence(format!("Failed to create directory: {}", e))
            })?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| QueueError::Persistence(format!("Failed to open database: {}", e)))?;
        debug!(path = %db_path.display(), "Opened queue database");
        Self::with_connection(conn)
    }

    /// Store living in a private in-memory database
    pub fn in_memory() -> QueueResult<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> QueueResult<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS queue_entries (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                entry TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| QueueError::Persistence(format!("Failed to create queue table: {}", e)))?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_queue_session ON queue_entries(session_id, seq)",
            [],
        )
        .map_err(|e| QueueError::Persistence(format!("Failed to create index: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> QueueResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| QueueError::Persistence("queue database lock poisoned".into()))
    }

    fn count(conn: &Connection, session: &str) -> QueueResult<usize> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM queue_entries WHERE session_id = ?1",
            params![session],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn append(&self, session: &str, entry: &QueueEntry) -> QueueResult<usize> {
        let json = serde_json::to_string(entry)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO queue_entries (session_id, entry) VALUES (?1, ?2)",
            params![session, json],
        )?;
        Ok(Self::count(&conn, session)? - 1)
    }

    async fn range(&self, session: &str, range: Range<usize>) -> QueueResult<Vec<QueueEntry>> {
        if range.end <= range.start {
            return Ok(Vec::new());
        }

        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT entry FROM queue_entries
             WHERE session_id = ?1
             ORDER BY seq
             LIMIT ?2 OFFSET ?3",
        )?;
        let rows = stmt.query_map(
            params![session, (range.end - range.start) as i64, range.start as i64],
            |row| row.get::<_, String>(0),
        )?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(serde_json::from_str(&row?)?);
        }
        Ok(entries)
    }

    async fn delete_at(&self, session: &str, position: usize) -> QueueResult<bool> {
        let conn = self.lock()?;
        let seq: Option<i64> = conn
            .query_row(
                "SELECT seq FROM queue_entries
                 WHERE session_id = ?1
                 ORDER BY seq
                 LIMIT 1 OFFSET ?2",
                params![session, position as i64],
                |row| row.get(0),
            )
            .optional()?;

        match seq {
            Some(seq) => {
                conn.execute("DELETE FROM queue_entries WHERE seq = ?1", params![seq])?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn clear(&self, session: &str) -> QueueResult<()> {
        let conn = self.lock()?;
        let removed = conn.execute(
            "DELETE FROM queue_entries WHERE session_id = ?1",
            params![session],
        )?;
        debug!(session, removed, "Cleared queue");
        Ok(())
    }

    async fn len(&self, session: &str) -> QueueResult<usize> {
        let conn = self.lock()?;
        Self::count(&conn, session)
    }
}
