use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{Connection, OptionalExtension};

use crate::error::StoreError;

/// Key the saved list lives under, one row per chat.
pub const SAVED_KEY: &str = "savedRecipes";

/// Per-chat key/value storage holding the saved recipe names as a JSON array.
pub struct SavedRecipes {
    conn: Mutex<Connection>,
}

impl SavedRecipes {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::with_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS local_storage (
                chat_id INTEGER NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                PRIMARY KEY (chat_id, key)
            )",
            (),
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The chat's saved names. Missing or unreadable data counts as an empty list.
    pub fn load(&self, chat_id: i64) -> Result<Vec<String>, StoreError> {
        let raw: Option<String> = self
            .lock()
            .query_row(
                "SELECT value FROM local_storage WHERE chat_id = ?1 AND key = ?2",
                (chat_id, SAVED_KEY),
                |row| row.get(0),
            )
            .optional()?;

        Ok(match raw {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                log::warn!("Discarding unreadable saved list for chat {chat_id}: {e}");
                Vec::new()
            }),
            None => Vec::new(),
        })
    }

    pub fn store(&self, chat_id: i64, names: &[String]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(names)?;
        self.lock().execute(
            "INSERT INTO local_storage (chat_id, key, value) VALUES (?1, ?2, ?3)
             ON CONFLICT (chat_id, key) DO UPDATE SET value = excluded.value",
            (chat_id, SAVED_KEY, raw),
        )?;
        Ok(())
    }

    /// Appends `name` unless an identical entry exists. Returns whether it was added.
    pub fn add(&self, chat_id: i64, name: &str) -> Result<bool, StoreError> {
        let mut names = self.load(chat_id)?;
        if names.iter().any(|n| n == name) {
            return Ok(false);
        }
        names.push(name.to_string());
        self.store(chat_id, &names)?;
        log::debug!("Saved {name:?} for chat {chat_id}");
        Ok(true)
    }

    /// Removes entry `idx`. With `expected` set, only when that entry still holds this name.
    pub fn remove(
        &self,
        chat_id: i64,
        idx: usize,
        expected: Option<&str>,
    ) -> Result<Option<String>, StoreError> {
        let mut names = self.load(chat_id)?;
        if !holds(&names, idx, expected) {
            return Ok(None);
        }
        let removed = names.remove(idx);
        self.store(chat_id, &names)?;
        log::debug!("Removed {removed:?} for chat {chat_id}");
        Ok(Some(removed))
    }

    pub fn get(
        &self,
        chat_id: i64,
        idx: usize,
        expected: Option<&str>,
    ) -> Result<Option<String>, StoreError> {
        let names = self.load(chat_id)?;
        if !holds(&names, idx, expected) {
            return Ok(None);
        }
        Ok(names.into_iter().nth(idx))
    }
}

fn holds(names: &[String], idx: usize, expected: Option<&str>) -> bool {
    match (names.get(idx), expected) {
        (None, _) => false,
        (Some(_), None) => true,
        (Some(name), Some(expected)) => name == expected,
    }
}
