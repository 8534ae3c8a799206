use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::{Connection, OptionalExtension};

use super::DbError;

/// Schema version the running binary expects on disk.
pub const SCHEMA_VERSION: u64 = 5;

pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const VERSION_KEY: &str = "version";

// Early releases stored the marker as "major.minor.patch".
static LEGACY_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+)\.(\d+)\.(\d+)$").expect("valid version pattern"));

/// Reads the schema version marker. A database without a `configs` table or
/// without a version row is unversioned and reports 0.
pub fn probe(conn: &Connection) -> Result<u64, DbError> {
    if !table_exists(conn, "configs")? {
        return Ok(0);
    }

    let value: Option<Option<String>> = conn
        .query_row(
            "SELECT value FROM configs WHERE key = ?1",
            [VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;

    match value {
        None => Ok(0),
        Some(None) => Err(DbError::InvalidVersion("NULL".to_string())),
        Some(Some(value)) => parse_version(&value),
    }
}

/// Accepts either a plain integer or a legacy `major.minor.patch` string, in
/// which case the major component is the schema version.
pub fn parse_version(value: &str) -> Result<u64, DbError> {
    let invalid = || DbError::InvalidVersion(value.to_string());

    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        return value.parse::<u64>().map_err(|_| invalid());
    }

    let captures = LEGACY_VERSION.captures(value).ok_or_else(invalid)?;
    captures[1].parse::<u64>().map_err(|_| invalid())
}

pub fn write_version(conn: &Connection, version: u64) -> Result<(), DbError> {
    conn.execute(
        "
        INSERT INTO configs (key, value) VALUES (?1, ?2)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        ",
        [VERSION_KEY, version.to_string().as_str()],
    )?;
    Ok(())
}

pub fn table_exists(conn: &Connection, name: &str) -> Result<bool, DbError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DbError> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2",
            [table, column],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}
