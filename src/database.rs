use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

use crate::models::ConfigItem;
use crate::persistence::KeyValueStore;

pub fn default_db_path() -> PathBuf {
    let home_dir = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home_dir).join(".tasklist.db")
}

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        log::info!("opened task database at {}", path.display());
        Self::init(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        // One row per storage slot; the task list lives in a single slot.
        conn.execute(
            "CREATE TABLE IF NOT EXISTS slots (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS configs (
                key_name TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                description TEXT,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )",
            [],
        )?;

        Ok(Database { conn })
    }

    pub fn set_config(&self, key: &str, value: &str, description: Option<&str>) -> Result<()> {
        self.conn.execute(
            "INSERT INTO configs (key_name, value, description) VALUES (?1, ?2, ?3)
             ON CONFLICT(key_name) DO UPDATE SET
                value = excluded.value,
                description = COALESCE(excluded.description, configs.description),
                updated_at = CURRENT_TIMESTAMP",
            params![key, value, description],
        )?;
        Ok(())
    }

    pub fn get_config(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM configs WHERE key_name = ?1",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Returns true when a row was removed.
    pub fn delete_config(&self, key: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM configs WHERE key_name = ?1", [key])?;
        Ok(removed > 0)
    }

    pub fn get_all_configs(&self) -> Result<Vec<ConfigItem>> {
        let mut stmt = self.conn.prepare(
            "SELECT key_name, value, description, updated_at FROM configs ORDER BY key_name",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok(ConfigItem {
                key_name: row.get(0)?,
                value: row.get(1)?,
                description: row.get(2)?,
                updated_at: row.get(3)?,
            })
        })?;

        let mut configs = Vec::new();
        for row in rows {
            configs.push(row?);
        }

        Ok(configs)
    }
}

impl KeyValueStore for Database {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row("SELECT value FROM slots WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO slots (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM slots WHERE key = ?1", [key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Task;
    use crate::persistence::{load_tasks, save_tasks, TASKS_SLOT};

    #[test]
    fn slot_overwrites_previous_value() {
        let mut db = Database::open_in_memory().unwrap();
        assert_eq!(db.get("k").unwrap(), None);
        db.set("k", "one").unwrap();
        db.set("k", "two").unwrap();
        assert_eq!(db.get("k").unwrap().as_deref(), Some("two"));
        db.remove("k").unwrap();
        assert_eq!(db.get("k").unwrap(), None);
    }

    #[test]
    fn tasks_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.db");
        let tasks = vec![Task::new("Persist me", Some("2024-01-02".into()), None)];

        {
            let mut db = Database::open(&path).unwrap();
            save_tasks(&mut db, &tasks).unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(load_tasks(&db).unwrap(), tasks);
    }

    #[test]
    fn cleared_slot_loads_empty() {
        let mut db = Database::open_in_memory().unwrap();
        save_tasks(&mut db, &[Task::new("gone soon", None, None)]).unwrap();
        db.remove(TASKS_SLOT).unwrap();
        assert!(load_tasks(&db).unwrap().is_empty());
    }

    #[test]
    fn config_roundtrip_and_delete() {
        let db = Database::open_in_memory().unwrap();
        db.set_config("default_filter", "active", Some("Filter at startup")).unwrap();
        db.set_config("default_filter", "completed", None).unwrap();
        assert_eq!(db.get_config("default_filter").unwrap().as_deref(), Some("completed"));

        let configs = db.get_all_configs().unwrap();
        assert_eq!(configs.len(), 1);
        assert_eq!(configs[0].description.as_deref(), Some("Filter at startup"));

        assert!(db.delete_config("default_filter").unwrap());
        assert!(!db.delete_config("default_filter").unwrap());
        assert_eq!(db.get_config("default_filter").unwrap(), None);
    }
}
