//! Shared installer-state storage.
//!
//! Mutual exclusion between server instances is arbitrated through this
//! store, not through in-process locks: every process sharing it observes
//! the same integer state per machine identity, so a second instance can
//! tell that another one owns the install lane.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use gantry_types::InstallerState;
use rusqlite::{params, Connection, OptionalExtension};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from state store operations.
#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Integer-keyed state shared between server instances.
///
/// Implementations must make each read and write atomic per key. The typed
/// accessors apply the decode policy: a missing key reads as `Ready`, and a
/// value written by no known version is logged and read as `Ready` rather
/// than wedging the queue.
pub trait StateStore: Send + Sync {
    /// Raw read; `None` when the key has never been written.
    fn get_state(&self, key: &str) -> Result<Option<i64>, StateStoreError>;

    /// Raw write; creates the key if needed.
    fn set_state(&self, key: &str, value: i64) -> Result<(), StateStoreError>;

    /// Installer state for a machine identity.
    fn installer_state(&self, key: &str) -> Result<InstallerState, StateStoreError> {
        let Some(raw) = self.get_state(key)? else {
            return Ok(InstallerState::Ready);
        };
        Ok(InstallerState::from_i64(raw).unwrap_or_else(|| {
            warn!(machine = key, value = raw, "Unknown installer state value, reading as ready");
            InstallerState::Ready
        }))
    }

    fn set_installer_state(&self, key: &str, state: InstallerState) -> Result<(), StateStoreError> {
        self.set_state(key, state.as_i64())
    }
}

/// SQLite-backed store, shared by all instances on a host.
pub struct SqliteStateStore {
    conn: Mutex<Connection>,
}

impl SqliteStateStore {
    /// Open or create a store at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StateStoreError> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;

        Ok(store)
    }

    /// Open an in-memory store (for testing).
    pub fn open_in_memory() -> Result<Self, StateStoreError> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // Every statement is a single atomic write, so the data stays
        // consistent even if a holder panicked.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<(), StateStoreError> {
        self.conn().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS installer_state (
                machine TEXT PRIMARY KEY,
                state INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;

        debug!("State store schema initialized");
        Ok(())
    }
}

impl StateStore for SqliteStateStore {
    fn get_state(&self, key: &str) -> Result<Option<i64>, StateStoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT state FROM installer_state WHERE machine = ?1")?;

        stmt.query_row(params![key], |row| row.get(0))
            .optional()
            .map_err(Into::into)
    }

    fn set_state(&self, key: &str, value: i64) -> Result<(), StateStoreError> {
        self.conn().execute(
            r#"
            INSERT INTO installer_state (machine, state, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(machine) DO UPDATE SET
                state = excluded.state,
                updated_at = excluded.updated_at
            "#,
            params![key, value, chrono::Utc::now().timestamp()],
        )?;
        Ok(())
    }
}

/// In-memory store for tests and single-process development setups.
#[derive(Default)]
pub struct MemoryStateStore {
    values: Mutex<HashMap<String, i64>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn values(&self) -> MutexGuard<'_, HashMap<String, i64>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl StateStore for MemoryStateStore {
    fn get_state(&self, key: &str) -> Result<Option<i64>, StateStoreError> {
        Ok(self.values().get(key).copied())
    }

    fn set_state(&self, key: &str, value: i64) -> Result<(), StateStoreError> {
        self.values().insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_missing_key_reads_ready() {
        let store = MemoryStateStore::new();
        assert_eq!(store.get_state("web01").unwrap(), None);
        assert_eq!(
            store.installer_state("web01").unwrap(),
            InstallerState::Ready
        );
    }

    #[rstest]
    #[case(InstallerState::Ready)]
    #[case(InstallerState::InstallingPackage)]
    #[case(InstallerState::WaitingForPostSteps)]
    #[case(InstallerState::InstallingPostSteps)]
    fn test_state_roundtrip(#[case] state: InstallerState) {
        let store = SqliteStateStore::open_in_memory().unwrap();

        store.set_installer_state("web01", state).unwrap();
        assert_eq!(store.installer_state("web01").unwrap(), state);
    }

    #[test]
    fn test_unknown_value_reads_as_ready() {
        let store = MemoryStateStore::new();
        store.set_state("web01", 42).unwrap();
        assert_eq!(
            store.installer_state("web01").unwrap(),
            InstallerState::Ready
        );
    }

    #[test]
    fn test_machines_are_independent() {
        let store = SqliteStateStore::open_in_memory().unwrap();

        store
            .set_installer_state("web01", InstallerState::InstallingPackage)
            .unwrap();

        assert_eq!(
            store.installer_state("web01").unwrap(),
            InstallerState::InstallingPackage
        );
        assert_eq!(
            store.installer_state("web02").unwrap(),
            InstallerState::Ready
        );
    }

    #[test]
    fn test_shared_file_visible_across_stores() {
        let tmp = tempfile::tempdir().unwrap();
        let db = tmp.path().join("state.db");

        let first = SqliteStateStore::open(&db).unwrap();
        let second = SqliteStateStore::open(&db).unwrap();

        first
            .set_installer_state("web01", InstallerState::WaitingForPostSteps)
            .unwrap();

        // A second process opening the same file sees the update.
        assert_eq!(
            second.installer_state("web01").unwrap(),
            InstallerState::WaitingForPostSteps
        );
    }
}
