use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::{CachedEntry, Db, DbError, DbResult};

pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }
}

impl Db for SqliteDb {
    fn init(&self) -> DbResult<()> {
        self.conn()?.execute_batch(
            "CREATE TABLE IF NOT EXISTS entries (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                stored_at TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    fn put(&self, key: &str, value: &str) -> DbResult<()> {
        self.conn()?.execute(
            "INSERT INTO entries (key, value, stored_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, stored_at = excluded.stored_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn get(&self, key: &str) -> DbResult<Option<CachedEntry>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                "SELECT value, stored_at FROM entries WHERE key = ?1",
                params![key],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        Ok(row.map(|(value, stored_at)| CachedEntry {
            value,
            stored_at: DateTime::parse_from_rfc3339(&stored_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        }))
    }

    fn remove(&self, key: &str) -> DbResult<()> {
        self.conn()?
            .execute("DELETE FROM entries WHERE key = ?1", params![key])?;
        Ok(())
    }
}
