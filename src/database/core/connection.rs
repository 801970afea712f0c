//! Database connection management
//!
//! This module provides the SQLite connection wrapper used by the store.

use anyhow::{anyhow, Result};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;

/// Core database connection wrapper
///
/// `DatabaseConn` provides a thin wrapper around SQLite connections,
/// handling both file-based and in-memory databases with consistent
/// configuration and error handling.
pub struct DatabaseConn {
    pub conn: Connection,
}

impl DatabaseConn {
    /// Open a database at the specified path, creating the file if needed
    ///
    /// If the path is `None`, an in-memory database is created.
    pub fn open(path: Option<&Path>) -> Result<Self> {
        let conn = match path {
            Some(p) => Connection::open(p)
                .map_err(|e| anyhow!("Failed to open database at '{}': {}", p.display(), e))?,
            None => Connection::open_in_memory()
                .map_err(|e| anyhow!("Failed to create in-memory database: {}", e))?,
        };

        let db = DatabaseConn { conn };
        db.configure()?;
        Ok(db)
    }

    /// Open an existing database file without creating it
    ///
    /// Fails when the file is missing or cannot be opened read-write. Only
    /// per-connection settings are applied, so opening leaves the file as it
    /// was; call [`DatabaseConn::enable_wal`] before writing.
    pub fn open_existing(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(anyhow!("Database file '{}' does not exist", path.display()));
        }

        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(path, flags)
            .map_err(|e| anyhow!("Failed to open database at '{}': {}", path.display(), e))?;

        let db = DatabaseConn { conn };
        db.verify_header()?;
        db.configure_connection()?;
        Ok(db)
    }

    /// Open a database at the specified path (convenience method)
    pub fn open_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open(Some(path.as_ref()))
    }

    /// Create an in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::open(None)
    }

    fn configure(&self) -> Result<()> {
        self.enable_wal()?;
        self.configure_connection()
    }

    /// Switch the database to WAL journaling
    ///
    /// Persistent: the mode is stored in the file and `-wal`/`-shm` files appear.
    pub fn enable_wal(&self) -> Result<()> {
        let _: String = self
            .conn
            .query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))
            .map_err(|e| anyhow!("Failed to set journal mode: {}", e))?;
        Ok(())
    }

    /// Read the schema cookie so a file that is not a database fails on open
    fn verify_header(&self) -> Result<()> {
        let _: i64 = self
            .conn
            .query_row("PRAGMA schema_version", [], |row| row.get(0))
            .map_err(|e| anyhow!("Not a usable database: {}", e))?;
        Ok(())
    }

    fn configure_connection(&self) -> Result<()> {
        self.conn
            .execute("PRAGMA synchronous=NORMAL", [])
            .map_err(|e| anyhow!("Failed to set synchronous mode: {}", e))?;

        self.conn
            .execute("PRAGMA foreign_keys=ON", [])
            .map_err(|e| anyhow!("Failed to enable foreign keys: {}", e))?;

        Ok(())
    }

    /// Cheap round trip to confirm the connection is usable
    pub fn ping(&self) -> Result<()> {
        let _: i64 = self
            .conn
            .query_row("SELECT 1", [], |row| row.get(0))
            .map_err(|e| anyhow!("Database did not answer: {}", e))?;
        Ok(())
    }

    /// Execute a SQL statement
    pub fn execute(&self, sql: &str) -> Result<usize> {
        self.conn
            .execute(sql, [])
            .map_err(|e| anyhow!("Failed to execute SQL: {}", e))
    }

    /// Begin an unchecked transaction
    pub fn transaction(&self) -> Result<rusqlite::Transaction<'_>> {
        self.conn
            .unchecked_transaction()
            .map_err(|e| anyhow!("Failed to begin transaction: {}", e))
    }

    /// Whether the database holds any table besides SQLite's internal ones
    pub fn has_user_tables(&self) -> Result<bool> {
        let count: i32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
                [],
                |row| row.get(0),
            )
            .map_err(|e| anyhow!("Failed to list tables: {}", e))?;
        Ok(count > 0)
    }

    /// Check if a table exists in the database
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        let count: i32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [table_name],
                |row| row.get(0),
            )
            .map_err(|e| anyhow!("Failed to check table existence: {}", e))?;
        Ok(count > 0)
    }
}
