pub const CREATE_CONFIGS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS configs (
  key TEXT PRIMARY KEY,
  value TEXT
);
"#;

pub const CREATE_ITEMS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS items (
  time INTEGER PRIMARY KEY,
  data BLOB NOT NULL,
  created_at INTEGER NOT NULL,
  updated_at INTEGER NOT NULL
);
"#;

/// Search index over `items`. Rowid mirrors `items.time`; the payload is
/// indexed as text.
pub const CREATE_ITEMS_FTS: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS items_fts USING fts5(text);

CREATE TRIGGER IF NOT EXISTS items_fts_ai AFTER INSERT ON items BEGIN
  INSERT INTO items_fts(rowid, text) VALUES (new.time, CAST(new.data AS TEXT));
END;

CREATE TRIGGER IF NOT EXISTS items_fts_ad AFTER DELETE ON items BEGIN
  DELETE FROM items_fts WHERE rowid = old.time;
END;

CREATE TRIGGER IF NOT EXISTS items_fts_au AFTER UPDATE ON items BEGIN
  DELETE FROM items_fts WHERE rowid = old.time;
  INSERT INTO items_fts(rowid, text) VALUES (new.time, CAST(new.data AS TEXT));
END;
"#;

pub const BACKFILL_ITEMS_FTS: &str = r#"
DELETE FROM items_fts;
INSERT INTO items_fts(rowid, text)
SELECT time, CAST(data AS TEXT) FROM items;
"#;

pub const CREATE_INDEX_ITEMS_UPDATED_AT: &str =
    "CREATE INDEX IF NOT EXISTS idx_items_updated_at ON items(updated_at);";

/// Item table as written by the earliest releases: surrogate `id` key,
/// unique capture time and content hash, payload kept as base64 text.
pub const CREATE_LEGACY_ITEMS_V0: &str = r#"
CREATE TABLE IF NOT EXISTS clipboard_items (
  id INTEGER PRIMARY KEY,
  created_at DATETIME,
  updated_at DATETIME,
  deleted_at DATETIME,
  clipboard_item_time INTEGER UNIQUE,
  clipboard_item_text TEXT,
  clipboard_item_hash TEXT UNIQUE,
  clipboard_item_data TEXT
);
"#;

/// Item table after the key restructure: capture time is the primary key.
pub const CREATE_LEGACY_ITEMS_V3: &str = r#"
CREATE TABLE clipboard_items_v3 (
  clipboard_item_time INTEGER PRIMARY KEY,
  clipboard_item_text TEXT,
  clipboard_item_hash TEXT UNIQUE,
  clipboard_item_data TEXT
);
"#;

pub const COPY_LEGACY_ITEMS_TO_V3: &str = r#"
INSERT INTO clipboard_items_v3 (
  clipboard_item_time,
  clipboard_item_text,
  clipboard_item_hash,
  clipboard_item_data
)
SELECT
  clipboard_item_time,
  clipboard_item_text,
  clipboard_item_hash,
  clipboard_item_data
FROM clipboard_items;
"#;

pub const CREATE_LEGACY_FTS_TABLE: &str = r#"
CREATE VIRTUAL TABLE IF NOT EXISTS clipboard_items_fts USING fts5(
  clipboard_item_text,
  content = 'clipboard_items',
  content_rowid = 'clipboard_item_time'
);
"#;

pub const CREATE_LEGACY_FTS_TRIGGERS: &str = r#"
CREATE TRIGGER IF NOT EXISTS clipboard_items_ai AFTER INSERT ON clipboard_items BEGIN
  INSERT INTO clipboard_items_fts(rowid, clipboard_item_text)
  VALUES (new.clipboard_item_time, new.clipboard_item_text);
END;

CREATE TRIGGER IF NOT EXISTS clipboard_items_ad AFTER DELETE ON clipboard_items BEGIN
  INSERT INTO clipboard_items_fts(clipboard_items_fts, rowid, clipboard_item_text)
  VALUES ('delete', old.clipboard_item_time, old.clipboard_item_text);
END;

CREATE TRIGGER IF NOT EXISTS clipboard_items_au AFTER UPDATE ON clipboard_items BEGIN
  INSERT INTO clipboard_items_fts(clipboard_items_fts, rowid, clipboard_item_text)
  VALUES ('delete', old.clipboard_item_time, old.clipboard_item_text);
  INSERT INTO clipboard_items_fts(rowid, clipboard_item_text)
  VALUES (new.clipboard_item_time, new.clipboard_item_text);
END;
"#;

pub const DROP_LEGACY_FTS_TRIGGERS: &str = r#"
DROP TRIGGER IF EXISTS clipboard_items_ai;
DROP TRIGGER IF EXISTS clipboard_items_ad;
DROP TRIGGER IF EXISTS clipboard_items_au;
"#;

pub const BACKFILL_LEGACY_FTS: &str = r#"
INSERT INTO clipboard_items_fts(rowid, clipboard_item_text)
SELECT clipboard_item_time, clipboard_item_text FROM clipboard_items;
"#;

pub const REBUILD_LEGACY_FTS: &str =
    "INSERT INTO clipboard_items_fts(clipboard_items_fts) VALUES ('rebuild');";

pub const DROP_LEGACY_TABLES: &str = r#"
DROP TABLE IF EXISTS clipboard_items_fts;
DROP TABLE IF EXISTS clipboard_items;
"#;

pub const CREATE_ITEMS_REBUILD_TABLE: &str = r#"
CREATE TABLE items_v5 (
  time INTEGER PRIMARY KEY,
  data BLOB NOT NULL,
  created_at INTEGER NOT NULL,
  updated_at INTEGER NOT NULL
);
"#;

/// Copies `items` of any earlier shape into `items_v5`. Integer audit columns
/// are kept, datetime text becomes unix milliseconds, anything else takes `?1`.
/// `{live}` is replaced with the soft-delete filter when the column exists.
pub const COPY_ITEMS_TO_REBUILD: &str = r#"
INSERT INTO items_v5 (time, data, created_at, updated_at)
SELECT
  time,
  CAST(COALESCE(data, x'') AS BLOB),
  COALESCE(
    CASE typeof(created_at)
      WHEN 'integer' THEN created_at
      WHEN 'text' THEN CAST(ROUND((julianday(created_at) - 2440587.5) * 86400000) AS INTEGER)
    END,
    ?1
  ),
  COALESCE(
    CASE typeof(updated_at)
      WHEN 'integer' THEN updated_at
      WHEN 'text' THEN CAST(ROUND((julianday(updated_at) - 2440587.5) * 86400000) AS INTEGER)
    END,
    ?1
  )
FROM items
{live};
"#;
