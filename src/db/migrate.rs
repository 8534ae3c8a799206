//! Forward-only schema migrations.
//!
//! Every step runs in its own transaction and writes the new version marker
//! before committing, so the marker never points past a schema change that
//! did not land. Fresh databases skip the history and are created directly at
//! [`SCHEMA_VERSION`].

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rusqlite::{params, Connection, Transaction};
use tracing::{debug, info};

use super::schema;
use super::version::{column_exists, probe, table_exists, write_version, SCHEMA_VERSION};
use super::DbError;
use crate::utils::time::unix_millis;

type StepFn = fn(&Transaction<'_>) -> Result<(), DbError>;

struct Step {
    from: u64,
    name: &'static str,
    apply: StepFn,
}

/// Ordered step table keyed by the version each step starts from.
const STEPS: &[Step] = &[
    Step {
        from: 0,
        name: "0->1: create configs",
        apply: step_0_to_1,
    },
    Step {
        from: 1,
        name: "1->2: full-text index over clipboard_items",
        apply: step_1_to_2,
    },
    Step {
        from: 2,
        name: "2->3: capture time becomes the clipboard_items key",
        apply: step_2_to_3,
    },
    Step {
        from: 3,
        name: "3->4: copy clipboard_items into items",
        apply: step_3_to_4,
    },
    Step {
        from: 4,
        name: "4->5: drop legacy tables, rebuild and index items",
        apply: step_4_to_5,
    },
];

/// Brings the database up to [`SCHEMA_VERSION`] and returns it.
pub fn migrate(conn: &mut Connection) -> Result<u64, DbError> {
    if is_fresh(conn)? {
        initialize(conn)?;
    }

    loop {
        let version = probe(conn)?;
        debug!(version, expected = SCHEMA_VERSION, "probed schema version");
        if version == SCHEMA_VERSION {
            return Ok(version);
        }

        let step = STEPS
            .iter()
            .find(|step| step.from == version)
            .ok_or(DbError::UnsupportedVersion(version))?;
        run_step(conn, step)?;
    }
}

fn is_fresh(conn: &Connection) -> Result<bool, DbError> {
    Ok(!table_exists(conn, "configs")? && !table_exists(conn, "clipboard_items")?)
}

fn initialize(conn: &mut Connection) -> Result<(), DbError> {
    info!(version = SCHEMA_VERSION, "empty database, initializing");
    let failed = |source: DbError| DbError::MigrationFailed {
        step: "initialize",
        source: Box::new(source),
    };

    let tx = conn.transaction().map_err(|err| failed(err.into()))?;
    create_current_schema(&tx)
        .and_then(|()| write_version(&tx, SCHEMA_VERSION))
        .map_err(failed)?;
    tx.commit().map_err(|err| failed(err.into()))?;
    Ok(())
}

fn create_current_schema(conn: &Connection) -> Result<(), DbError> {
    // An unversioned file may still carry an items table from an older layout.
    if table_exists(conn, "items")? {
        rebuild_items(conn)?;
    }
    conn.execute_batch(schema::CREATE_CONFIGS_TABLE)?;
    conn.execute_batch(schema::CREATE_ITEMS_TABLE)?;
    conn.execute_batch(schema::CREATE_INDEX_ITEMS_UPDATED_AT)?;
    conn.execute_batch(schema::CREATE_ITEMS_FTS)?;
    conn.execute_batch(schema::BACKFILL_ITEMS_FTS)?;
    Ok(())
}

/// Rewrites `items` into the current layout. Soft-deleted rows are dropped
/// and datetime audit columns become unix milliseconds.
fn rebuild_items(conn: &Connection) -> Result<(), DbError> {
    let live = if column_exists(conn, "items", "deleted_at")? {
        "WHERE deleted_at IS NULL"
    } else {
        ""
    };

    conn.execute_batch(schema::CREATE_ITEMS_REBUILD_TABLE)?;
    let copied = conn
        .execute(
            &schema::COPY_ITEMS_TO_REBUILD.replace("{live}", live),
            [unix_millis()],
        )
        .map_err(super::classify)?;
    conn.execute_batch("DROP TABLE items;")?;
    conn.execute_batch("ALTER TABLE items_v5 RENAME TO items;")?;

    debug!(rows = copied, "rebuilt items table");
    Ok(())
}

fn run_step(conn: &mut Connection, step: &Step) -> Result<(), DbError> {
    info!(from = step.from, to = step.from + 1, "migrating: {}", step.name);
    let failed = |source: DbError| DbError::MigrationFailed {
        step: step.name,
        source: Box::new(source),
    };

    // Dropping the transaction on any early return rolls the step back.
    let tx = conn.transaction().map_err(|err| failed(err.into()))?;
    (step.apply)(&tx)
        .and_then(|()| write_version(&tx, step.from + 1))
        .map_err(failed)?;
    tx.commit().map_err(|err| failed(err.into()))?;

    info!(version = step.from + 1, "migration step committed");
    Ok(())
}

fn step_0_to_1(tx: &Transaction<'_>) -> Result<(), DbError> {
    tx.execute_batch(schema::CREATE_CONFIGS_TABLE)?;
    Ok(())
}

fn step_1_to_2(tx: &Transaction<'_>) -> Result<(), DbError> {
    // The index needs its content table even if no capture was ever stored.
    tx.execute_batch(schema::CREATE_LEGACY_ITEMS_V0)?;
    tx.execute_batch(schema::CREATE_LEGACY_FTS_TABLE)?;
    tx.execute_batch(schema::CREATE_LEGACY_FTS_TRIGGERS)?;
    tx.execute_batch(schema::BACKFILL_LEGACY_FTS)?;
    Ok(())
}

fn step_2_to_3(tx: &Transaction<'_>) -> Result<(), DbError> {
    tx.execute_batch(schema::DROP_LEGACY_FTS_TRIGGERS)?;
    tx.execute_batch(schema::CREATE_LEGACY_ITEMS_V3)?;
    tx.execute_batch(schema::COPY_LEGACY_ITEMS_TO_V3)?;
    tx.execute_batch("DROP TABLE clipboard_items;")?;
    tx.execute_batch("ALTER TABLE clipboard_items_v3 RENAME TO clipboard_items;")?;
    // Older releases indexed the time column too; only the text is kept.
    tx.execute_batch("DROP TABLE IF EXISTS clipboard_items_fts;")?;
    tx.execute_batch(schema::CREATE_LEGACY_FTS_TABLE)?;
    tx.execute_batch(schema::CREATE_LEGACY_FTS_TRIGGERS)?;
    tx.execute_batch(schema::REBUILD_LEGACY_FTS)?;
    Ok(())
}

fn step_3_to_4(tx: &Transaction<'_>) -> Result<(), DbError> {
    tx.execute_batch(schema::CREATE_ITEMS_TABLE)?;
    tx.execute_batch(schema::CREATE_INDEX_ITEMS_UPDATED_AT)?;

    let legacy = {
        let mut stmt = tx.prepare(
            "SELECT clipboard_item_time, clipboard_item_data FROM clipboard_items ORDER BY clipboard_item_time",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, Option<String>>(1)?))
        })?;
        rows.collect::<Result<Vec<_>, _>>()?
    };

    let now = unix_millis();
    let mut insert = tx.prepare(
        "INSERT INTO items (time, data, created_at, updated_at) VALUES (?1, ?2, ?3, ?3)",
    )?;
    for (time, encoded) in &legacy {
        let data = STANDARD.decode(encoded.as_deref().unwrap_or_default())?;
        insert
            .execute(params![time, data, now])
            .map_err(super::classify)?;
    }

    debug!(rows = legacy.len(), "copied legacy clipboard items");
    Ok(())
}

fn step_4_to_5(tx: &Transaction<'_>) -> Result<(), DbError> {
    tx.execute_batch(schema::DROP_LEGACY_FTS_TRIGGERS)?;
    tx.execute_batch(schema::DROP_LEGACY_TABLES)?;
    if table_exists(tx, "items")? {
        rebuild_items(tx)?;
    }
    tx.execute_batch(schema::CREATE_ITEMS_TABLE)?;
    tx.execute_batch(schema::CREATE_INDEX_ITEMS_UPDATED_AT)?;
    tx.execute_batch(schema::CREATE_ITEMS_FTS)?;
    tx.execute_batch(schema::BACKFILL_ITEMS_FTS)?;
    Ok(())
}
