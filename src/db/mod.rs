mod migrate;
mod schema;
pub mod version;

use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use thiserror::Error;
use tracing::{debug, info};

use crate::utils::time::unix_millis;

pub use migrate::migrate;
pub use version::{APP_VERSION, SCHEMA_VERSION};

pub const MEMORY_TARGET: &str = ":memory:";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database lock poisoned")]
    LockPoisoned,
    #[error("invalid version marker: {0:?}")]
    InvalidVersion(String),
    #[error("unsupported schema version {0}")]
    UnsupportedVersion(u64),
    #[error("migration {step} failed: {source}")]
    MigrationFailed {
        step: &'static str,
        #[source]
        source: Box<DbError>,
    },
    #[error("database already connected")]
    AlreadyConnected,
    #[error("database not connected")]
    NotConnected,
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),
    #[error("not found")]
    NotFound,
    #[error("invalid base64 payload: {0}")]
    InvalidData(#[from] base64::DecodeError),
}

/// Separates uniqueness conflicts from other engine failures.
pub(crate) fn classify(err: rusqlite::Error) -> DbError {
    match err {
        rusqlite::Error::SqliteFailure(ref failure, ref message)
            if failure.code == ErrorCode::ConstraintViolation
                && matches!(
                    failure.extended_code,
                    rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                        | rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                ) =>
        {
            DbError::ConstraintViolation(
                message
                    .clone()
                    .unwrap_or_else(|| "UNIQUE constraint failed".to_string()),
            )
        }
        other => DbError::Sql(other),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    pub time: i64,
    pub data: Vec<u8>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewItem<'a> {
    pub time: i64,
    pub data: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upserted {
    Created,
    Updated,
}

/// Inclusive bounds on `Item.time`; `None` leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeRange {
    pub start: Option<i64>,
    pub end: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct OpenOptions {
    pub trace_sql: bool,
    pub busy_timeout: Duration,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            trace_sql: false,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

const ITEM_COLUMNS: &str = "items.time, items.data, items.created_at, items.updated_at";

/// Owns the single connection of a process. `open` migrates before the handle
/// becomes visible, so every record operation sees the current schema.
#[derive(Default)]
pub struct Database {
    conn: Mutex<Option<Connection>>,
}

impl Database {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens and migrates a database at `target`, returning a connected store.
    pub fn connect(target: &str, options: &OpenOptions) -> Result<Self, DbError> {
        let db = Self::new();
        db.open(target, options)?;
        Ok(db)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self, DbError> {
        Self::connect(MEMORY_TARGET, &OpenOptions::default())
    }

    /// Returns the schema version reached by migration.
    pub fn open(&self, target: &str, options: &OpenOptions) -> Result<u64, DbError> {
        let mut slot = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        if slot.is_some() {
            return Err(DbError::AlreadyConnected);
        }

        let mut conn = if target == MEMORY_TARGET {
            Connection::open_in_memory()?
        } else {
            let path = Path::new(target);
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            let conn = Connection::open(path)?;
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
            conn
        };

        if options.trace_sql {
            conn.trace(Some(trace_sql));
        }
        conn.busy_timeout(options.busy_timeout)?;
        conn.execute_batch(
            "
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            PRAGMA foreign_keys = ON;
            ",
        )?;

        let version = migrate(&mut conn)?;
        info!(path = target, version, "database ready");
        *slot = Some(conn);
        Ok(version)
    }

    pub fn close(&self) -> Result<(), DbError> {
        let mut slot = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        let conn = slot.take().ok_or(DbError::NotConnected)?;
        conn.close().map_err(|(_, err)| DbError::from(err))
    }

    pub fn is_connected(&self) -> bool {
        self.conn.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, DbError>,
    ) -> Result<T, DbError> {
        let mut slot = self.conn.lock().map_err(|_| DbError::LockPoisoned)?;
        let conn = slot.as_mut().ok_or(DbError::NotConnected)?;
        f(conn)
    }

    pub fn schema_version(&self) -> Result<u64, DbError> {
        self.with_conn(|conn| version::probe(conn))
    }

    pub fn create(&self, item: NewItem<'_>) -> Result<Item, DbError> {
        self.with_conn(|conn| {
            let now = unix_millis();
            conn.execute(
                "INSERT INTO items (time, data, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                params![item.time, item.data, now],
            )
            .map_err(classify)?;
            Ok(Item {
                time: item.time,
                data: item.data.to_vec(),
                created_at: now,
                updated_at: now,
            })
        })
    }

    pub fn first(&self, time: i64) -> Result<Item, DbError> {
        self.with_conn(|conn| get_item(conn, time)?.ok_or(DbError::NotFound))
    }

    /// Replaces the payload of an existing item.
    pub fn save(&self, item: NewItem<'_>) -> Result<Item, DbError> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE items SET data = ?2, updated_at = ?3 WHERE time = ?1",
                params![item.time, item.data, unix_millis()],
            )?;
            if changed == 0 {
                return Err(DbError::NotFound);
            }
            get_item(conn, item.time)?.ok_or(DbError::NotFound)
        })
    }

    /// Inserts or replaces in one transaction, reporting which happened.
    pub fn upsert(&self, item: NewItem<'_>) -> Result<Upserted, DbError> {
        self.with_conn(|conn| {
            let tx = conn.transaction()?;
            let now = unix_millis();
            let updated = tx.execute(
                "UPDATE items SET data = ?2, updated_at = ?3 WHERE time = ?1",
                params![item.time, item.data, now],
            )?;
            let outcome = if updated == 0 {
                tx.execute(
                    "INSERT INTO items (time, data, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
                    params![item.time, item.data, now],
                )
                .map_err(classify)?;
                Upserted::Created
            } else {
                Upserted::Updated
            };
            tx.commit()?;
            Ok(outcome)
        })
    }

    /// Returns the number of rows removed; zero rows is `NotFound`.
    pub fn delete(&self, time: i64) -> Result<usize, DbError> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM items WHERE time = ?1", params![time])?;
            if deleted == 0 {
                return Err(DbError::NotFound);
            }
            Ok(deleted)
        })
    }

    pub fn count(&self, range: TimeRange) -> Result<i64, DbError> {
        self.with_conn(|conn| {
            conn.query_row(
                "
                SELECT COUNT(*) FROM items
                WHERE (?1 IS NULL OR time >= ?1) AND (?2 IS NULL OR time <= ?2)
                ",
                params![range.start, range.end],
                |row| row.get(0),
            )
            .map_err(DbError::from)
        })
    }

    /// Capture times in `range`, newest first. A negative `limit` returns
    /// every match.
    pub fn list_times(&self, range: TimeRange, limit: i64) -> Result<Vec<i64>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "
                SELECT time FROM items
                WHERE (?1 IS NULL OR time >= ?1) AND (?2 IS NULL OR time <= ?2)
                ORDER BY time DESC
                LIMIT ?3
                ",
            )?;
            let rows = stmt.query_map(params![range.start, range.end, limit], |row| row.get(0))?;
            rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
        })
    }

    /// Items whose payload matches the full-text `query`, newest first.
    pub fn search_text(&self, query: &str, limit: i64) -> Result<Vec<Item>, DbError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "
                SELECT {ITEM_COLUMNS}
                FROM items_fts
                JOIN items ON items.time = items_fts.rowid
                WHERE items_fts MATCH ?1
                ORDER BY items.time DESC
                LIMIT ?2
                "
            ))?;
            let rows = stmt.query_map(params![query, limit], item_from_row)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(DbError::from)
        })
    }
}

fn get_item(conn: &Connection, time: i64) -> Result<Option<Item>, DbError> {
    conn.query_row(
        &format!("SELECT {ITEM_COLUMNS} FROM items WHERE time = ?1"),
        params![time],
        item_from_row,
    )
    .optional()
    .map_err(DbError::from)
}

fn item_from_row(row: &Row<'_>) -> Result<Item, rusqlite::Error> {
    Ok(Item {
        time: row.get(0)?,
        data: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

fn trace_sql(statement: &str) {
    debug!(target: "clipboard_archive::sql", "{statement}");
}
