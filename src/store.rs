//! Append-only SQLite log of tracked-object observations.

use std::fs;
use std::path::{Path, PathBuf};

use rusqlite::{Connection, params};
use tracing::debug;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS detections (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    bottle_id INTEGER NOT NULL,
    class_id INTEGER NOT NULL,
    timestamp TEXT NOT NULL,
    center_x INTEGER NOT NULL,
    center_y INTEGER NOT NULL
)";

const INSERT_RECORD: &str = "INSERT INTO detections (bottle_id, class_id, timestamp, center_x, center_y)
     VALUES (?1, ?2, ?3, ?4, ?5)";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("cannot create log directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("track id {0} does not fit in an sqlite integer")]
    IdOverflow(u64),
}

/// One observation of a loggable track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Track id of the observed object
    pub bottle_id: u64,
    pub class_id: u32,
    pub timestamp: String,
    pub center_x: i64,
    pub center_y: i64,
}

/// A stored [`LogRecord`] with its surrogate key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecord {
    pub id: i64,
    pub record: LogRecord,
}

/// Durable sink for log records.
pub trait EventLog {
    /// Prepare storage; safe to call more than once.
    fn init(&mut self) -> Result<(), StoreError>;

    /// Append exactly one record.
    fn log(&mut self, record: &LogRecord) -> Result<(), StoreError>;
}

/// [`EventLog`] backed by an SQLite file.
///
/// Each `log` call opens the database, inserts one row inside a transaction,
/// commits and closes, so one failing record never affects another.
#[derive(Debug, Clone)]
pub struct SqliteEventLog {
    path: PathBuf,
}

impl SqliteEventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> Result<Connection, StoreError> {
        Ok(Connection::open(&self.path)?)
    }

    /// Every stored row in insertion order.
    pub fn read_all(&self) -> Result<Vec<StoredRecord>, StoreError> {
        let conn = self.open()?;
        let mut stmt = conn.prepare(
            "SELECT id, bottle_id, class_id, timestamp, center_x, center_y
             FROM detections ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            let bottle_id: i64 = row.get(1)?;
            Ok(StoredRecord {
                id: row.get(0)?,
                record: LogRecord {
                    bottle_id: bottle_id as u64,
                    class_id: row.get(2)?,
                    timestamp: row.get(3)?,
                    center_x: row.get(4)?,
                    center_y: row.get(5)?,
                },
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl EventLog for SqliteEventLog {
    fn init(&mut self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Directory {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let conn = self.open()?;
        conn.execute_batch(CREATE_TABLE)?;
        debug!(path = %self.path.display(), "event log ready");
        Ok(())
    }

    fn log(&mut self, record: &LogRecord) -> Result<(), StoreError> {
        let bottle_id =
            i64::try_from(record.bottle_id).map_err(|_| StoreError::IdOverflow(record.bottle_id))?;

        let mut conn = self.open()?;
        let tx = conn.transaction()?;
        tx.execute(
            INSERT_RECORD,
            params![
                bottle_id,
                record.class_id,
                record.timestamp,
                record.center_x,
                record.center_y
            ],
        )?;
        tx.commit()?;
        Ok(())
    }
}
