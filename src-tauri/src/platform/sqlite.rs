use super::preferences::Preferences;
use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

const PREFS_SCHEMA_VERSION: i64 = 2;

/// Preferences backed by a SQLite table. Each `set` is a single UPSERT, so a
/// value is either fully replaced or untouched.
pub struct SqlitePreferences {
    conn: Connection,
}

impl SqlitePreferences {
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

pub fn initialize_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;",
    )?;

    let mut version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;

    if version < 1 {
        apply_migration_1(conn)?;
        version = 1;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version < 2 {
        apply_migration_2(conn)?;
        version = 2;
        conn.pragma_update(None, "user_version", version)?;
    }

    if version > PREFS_SCHEMA_VERSION {
        // Newer build wrote this file; the key/value shape is stable.
        log::warn!("preferences schema v{version} is newer than v{PREFS_SCHEMA_VERSION}");
    }

    Ok(())
}

fn apply_migration_1(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS preferences (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        );",
    )
}

fn apply_migration_2(conn: &Connection) -> rusqlite::Result<()> {
    add_column_if_missing(conn, "preferences", "updated_at INTEGER NOT NULL DEFAULT 0")
}

fn add_column_if_missing(conn: &Connection, table: &str, column_def: &str) -> rusqlite::Result<()> {
    let column_name = column_def
        .split_whitespace()
        .next()
        .unwrap_or_default();

    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let exists = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .filter_map(|res| res.ok())
        .any(|name| name == column_name);

    if !exists {
        conn.execute(&format!("ALTER TABLE {table} ADD COLUMN {column_def}"), [])?;
    }

    Ok(())
}

impl Preferences for SqlitePreferences {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM preferences WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.conn.execute(
            "INSERT INTO preferences (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.conn
            .execute("DELETE FROM preferences WHERE key = ?1", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_initializes_with_expected_version() {
        let conn = Connection::open_in_memory().expect("open in-memory db");
        initialize_schema(&conn).expect("create schema");
        let version: i64 = conn
            .pragma_query_value(None, "user_version", |row| row.get(0))
            .expect("read user_version");
        assert_eq!(version, PREFS_SCHEMA_VERSION);
    }

    #[test]
    fn set_replaces_whole_value() {
        let mut prefs = SqlitePreferences::open_in_memory().expect("open in-memory db");
        prefs.set("photos", "[1]").expect("set preference");
        prefs.set("photos", "[2]").expect("set preference");
        assert_eq!(prefs.get("photos").expect("read entry").as_deref(), Some("[2]"));

        prefs.remove("photos").expect("remove entry");
        assert_eq!(prefs.get("photos").expect("read entry"), None);
    }

    #[test]
    fn values_persist_across_connections() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let db = dir.path().join("preferences.db");
        {
            let mut prefs = SqlitePreferences::open(&db).expect("open db");
            prefs.set("photos", "[]").expect("set preference");
        }
        let prefs = SqlitePreferences::open(&db).expect("open db");
        assert_eq!(prefs.get("photos").expect("read entry").as_deref(), Some("[]"));
    }
}
