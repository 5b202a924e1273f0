use std::path::Path;

use record_api::{RecordPath, StoreError};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::tree;

/// Open the SQLite database and run migrations.
pub(crate) fn init_db<P: AsRef<Path>>(path: P) -> Result<Connection, StoreError> {
    let conn = Connection::open(path).map_err(backend)?;
    conn.execute_batch(SCHEMA).map_err(backend)?;
    Ok(conn)
}

pub(crate) const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS records (
  path TEXT PRIMARY KEY,
  value TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS meta (
  key TEXT PRIMARY KEY,
  value INTEGER NOT NULL
);
"#;

const CLOCK_KEY: &str = "last_server_timestamp";

pub(crate) fn backend(e: rusqlite::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

/// Rebuild the record tree from its persisted leaves.
pub(crate) fn load_tree(conn: &Connection) -> Result<Value, StoreError> {
    let mut root = tree::empty();
    let mut stmt = conn
        .prepare("SELECT path, value FROM records ORDER BY path")
        .map_err(backend)?;
    let rows = stmt
        .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
        .map_err(backend)?;
    for row in rows {
        let (path, value) = row.map_err(backend)?;
        let path = RecordPath::parse(&path)?;
        let value: Value = serde_json::from_str(&value)?;
        tree::set(&mut root, &path, Some(value));
    }
    Ok(root)
}

pub(crate) fn load_clock(conn: &Connection) -> Result<i64, StoreError> {
    let last: Option<i64> = conn
        .query_row(
            "SELECT value FROM meta WHERE key = ?1",
            [CLOCK_KEY],
            |row| row.get(0),
        )
        .optional()
        .map_err(backend)?;
    Ok(last.unwrap_or(0))
}

/// Persist the current state of every `changed` location in one transaction.
pub(crate) fn persist(
    conn: &mut Connection,
    root: &Value,
    changed: &[RecordPath],
    clock: Option<i64>,
) -> Result<(), StoreError> {
    let tx = conn.transaction().map_err(backend)?;
    for path in changed {
        if path.is_root() {
            tx.execute("DELETE FROM records", []).map_err(backend)?;
        } else {
            tx.execute(
                "DELETE FROM records WHERE path = ?1 OR path LIKE ?2 ESCAPE '\\'",
                params![path.as_str(), format!("{}/%", escape_like(path.as_str()))],
            )
            .map_err(backend)?;
        }
        if let Some(value) = tree::get(root, path) {
            // a scalar stored above `path` was replaced by the object holding it
            let mut ancestor = path.parent();
            while let Some(p) = ancestor.filter(|p| !p.is_root()) {
                tx.execute("DELETE FROM records WHERE path = ?1", [p.as_str()])
                    .map_err(backend)?;
                ancestor = p.parent();
            }
            let mut leaves = Vec::new();
            tree::leaves(value, path, &mut leaves);
            for (leaf, value) in leaves {
                tx.execute(
                    "INSERT OR REPLACE INTO records (path, value) VALUES (?1, ?2)",
                    params![leaf.as_str(), serde_json::to_string(&value)?],
                )
                .map_err(backend)?;
            }
        }
    }
    if let Some(last) = clock {
        tx.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2) \
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![CLOCK_KEY, last],
        )
        .map_err(backend)?;
    }
    tx.commit().map_err(backend)?;
    Ok(())
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
