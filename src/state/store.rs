use anyhow::{anyhow, Context, Result};
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use super::models::ScriptRecord;

/// SQLite-backed store of provisioned-script tracking records.
pub struct StateStore {
    conn: Mutex<Connection>,
}

const SELECT_COLUMNS: &str = "address, id, name, project, instance, database, deletion_policy,
     script_sha256, created_at, updated_at";

impl StateStore {
    /// Open or create the state database.
    pub fn open(working_dir: &str) -> Result<Self> {
        let db_path = Path::new(working_dir).join("state.db");
        std::fs::create_dir_all(working_dir)?;
        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open state database at {}", db_path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// In-memory store, for dry runs and tests.
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("state database connection poisoned"))
    }

    /// Create the database tables if they don't exist.
    pub fn initialize(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS provisioned_scripts (
                address TEXT PRIMARY KEY,
                id TEXT NOT NULL,
                name TEXT NOT NULL,
                project TEXT NOT NULL,
                instance TEXT NOT NULL,
                database TEXT,
                deletion_policy TEXT NOT NULL DEFAULT 'ABANDON',
                script_sha256 TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_provisioned_scripts_instance
                ON provisioned_scripts(project, instance);
            ",
        )?;
        Ok(())
    }

    /// Insert or replace the record at `record.address`.
    pub fn upsert_script(&self, record: &ScriptRecord) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO provisioned_scripts
                (address, id, name, project, instance, database, deletion_policy,
                 script_sha256, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(address) DO UPDATE SET
                id = ?2, name = ?3, project = ?4, instance = ?5, database = ?6,
                deletion_policy = ?7, script_sha256 = ?8, updated_at = ?10",
            rusqlite::params![
                record.address,
                record.id,
                record.name,
                record.project,
                record.instance,
                record.database,
                record.deletion_policy,
                record.script_sha256,
                record.created_at,
                record.updated_at,
            ],
        )
        .with_context(|| format!("Failed to save state for '{}'", record.address))?;
        Ok(())
    }

    /// Get the record at an address.
    pub fn get_script(&self, address: &str) -> Result<Option<ScriptRecord>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM provisioned_scripts WHERE address = ?1",
            SELECT_COLUMNS
        );
        let record = conn
            .query_row(&sql, rusqlite::params![address], row_to_record)
            .optional()?;
        Ok(record)
    }

    /// List all records, ordered by address.
    pub fn list_scripts(&self) -> Result<Vec<ScriptRecord>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM provisioned_scripts ORDER BY address",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], row_to_record)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Remove a record. Returns whether one existed.
    pub fn delete_script(&self, address: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM provisioned_scripts WHERE address = ?1",
            rusqlite::params![address],
        )?;
        Ok(removed > 0)
    }
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScriptRecord> {
    Ok(ScriptRecord {
        address: row.get(0)?,
        id: row.get(1)?,
        name: row.get(2)?,
        project: row.get(3)?,
        instance: row.get(4)?,
        database: row.get(5)?,
        deletion_policy: row.get(6)?,
        script_sha256: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}
