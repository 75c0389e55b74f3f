mod sqlite;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;

pub use sqlite::SqliteDb;

pub type DbResult<T> = Result<T, DbError>;

pub const TOPICS_KEY: &str = "topics";

/// Decks are cached under their resource reference, which is unique per topic.
pub fn deck_key(file: &str) -> String {
    format!("deck:{file}")
}

#[derive(Error, Debug)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("database lock poisoned")]
    Poisoned,
}

#[derive(Debug, Clone)]
pub struct CachedEntry {
    pub value: String,
    pub stored_at: DateTime<Utc>,
}

/// Local key-value copy of the topic list and decks, used when the data
/// root cannot be reached.
pub trait Db: Send + Sync {
    fn init(&self) -> DbResult<()>;
    fn put(&self, key: &str, value: &str) -> DbResult<()>;
    fn get(&self, key: &str) -> DbResult<Option<CachedEntry>>;
    fn remove(&self, key: &str) -> DbResult<()>;
}

pub fn open(path: &Path) -> DbResult<Arc<dyn Db>> {
    let db = SqliteDb::open(path)?;
    db.init()?;
    Ok(Arc::new(db))
}
