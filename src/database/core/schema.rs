//! Change-history bookkeeping
//!
//! The store records every applied schema change in a history table. This
//! module owns that table's definition and the queries against it.

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::Serialize;
use std::fmt;

use crate::bootstrap::ChangeId;

/// Schema definitions for the bookkeeping tables
pub struct SchemaDefinitions;

impl SchemaDefinitions {
    /// Name of the change-history table
    pub const HISTORY_TABLE_NAME: &'static str = "dbready_history";

    /// SQL for creating the change-history table
    ///
    /// `seq` keeps application order independent of change id ordering.
    pub const HISTORY_TABLE: &'static str = r#"
        CREATE TABLE IF NOT EXISTS dbready_history (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            change_id TEXT NOT NULL UNIQUE,
            applied_at INTEGER NOT NULL,
            origin TEXT NOT NULL CHECK (origin IN ('model', 'change'))
        );
    "#;
}

/// How a history row came to be recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOrigin {
    /// Recorded as a baseline by create-from-model
    Model,
    /// Applied incrementally
    Change,
}

impl ChangeOrigin {
    fn as_str(&self) -> &'static str {
        match self {
            ChangeOrigin::Model => "model",
            ChangeOrigin::Change => "change",
        }
    }

    fn parse(s: &str) -> Result<Self> {
        match s {
            "model" => Ok(ChangeOrigin::Model),
            "change" => Ok(ChangeOrigin::Change),
            other => Err(anyhow!("Unknown change origin '{}'", other)),
        }
    }
}

impl fmt::Display for ChangeOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One row of the change history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEntry {
    pub change_id: ChangeId,
    pub applied_at: DateTime<Utc>,
    pub origin: ChangeOrigin,
}

/// Reads and writes the change-history table
pub struct ChangeHistory<'a> {
    conn: &'a Connection,
}

impl<'a> ChangeHistory<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Whether the history table exists yet
    pub fn is_initialized(&self) -> Result<bool> {
        let count: i32 = self
            .conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                [SchemaDefinitions::HISTORY_TABLE_NAME],
                |row| row.get(0),
            )
            .map_err(|e| anyhow!("Failed to check history table: {}", e))?;
        Ok(count > 0)
    }

    /// Create the history table if it doesn't exist
    pub fn initialize(&self) -> Result<()> {
        self.conn
            .execute(SchemaDefinitions::HISTORY_TABLE, [])
            .map_err(|e| anyhow!("Failed to create history table: {}", e))?;
        Ok(())
    }

    /// Applied change ids in application order
    ///
    /// A store without a history table has applied nothing.
    pub fn applied(&self) -> Result<Vec<ChangeId>> {
        Ok(self
            .entries()?
            .into_iter()
            .map(|entry| entry.change_id)
            .collect())
    }

    /// Full history rows in application order
    pub fn entries(&self) -> Result<Vec<HistoryEntry>> {
        if !self.is_initialized()? {
            return Ok(Vec::new());
        }

        let mut stmt = self
            .conn
            .prepare("SELECT change_id, applied_at, origin FROM dbready_history ORDER BY seq")
            .map_err(|e| anyhow!("Failed to prepare history query: {}", e))?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })
            .map_err(|e| anyhow!("Failed to query history: {}", e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| anyhow!("Failed to read history row: {}", e))?;

        rows.into_iter()
            .map(|(change_id, applied_at, origin)| {
                let applied_at = DateTime::<Utc>::from_timestamp(applied_at, 0)
                    .ok_or_else(|| anyhow!("Invalid applied_at timestamp {}", applied_at))?;
                Ok(HistoryEntry {
                    change_id: ChangeId::from(change_id),
                    applied_at,
                    origin: ChangeOrigin::parse(&origin)?,
                })
            })
            .collect()
    }

    /// Record a change as applied
    pub fn record(&self, change_id: &ChangeId, origin: ChangeOrigin) -> Result<()> {
        let now = Utc::now().timestamp();
        self.conn
            .execute(
                "INSERT INTO dbready_history (change_id, applied_at, origin) VALUES (?1, ?2, ?3)",
                params![change_id.as_str(), now, origin.as_str()],
            )
            .map_err(|e| anyhow!("Failed to record change '{}': {}", change_id, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute("PRAGMA foreign_keys=ON", []).unwrap();
        conn
    }

    #[test]
    fn test_history_not_initialized() {
        let conn = create_test_db();
        let history = ChangeHistory::new(&conn);

        assert!(!history.is_initialized().unwrap());
        assert!(history.applied().unwrap().is_empty());
    }

    #[test]
    fn test_history_records_in_order() {
        let conn = create_test_db();
        let history = ChangeHistory::new(&conn);
        history.initialize().unwrap();

        history
            .record(&ChangeId::from("010_late_name"), ChangeOrigin::Model)
            .unwrap();
        history
            .record(&ChangeId::from("002_early_name"), ChangeOrigin::Change)
            .unwrap();

        assert_eq!(
            history.applied().unwrap(),
            vec![
                ChangeId::from("010_late_name"),
                ChangeId::from("002_early_name")
            ]
        );

        let entries = history.entries().unwrap();
        assert_eq!(entries[0].origin, ChangeOrigin::Model);
        assert_eq!(entries[1].origin, ChangeOrigin::Change);
    }

    #[test]
    fn test_history_rejects_duplicates() {
        let conn = create_test_db();
        let history = ChangeHistory::new(&conn);
        history.initialize().unwrap();

        let id = ChangeId::from("001_init");
        history.record(&id, ChangeOrigin::Change).unwrap();
        assert!(history.record(&id, ChangeOrigin::Change).is_err());
        assert_eq!(history.applied().unwrap().len(), 1);
    }

    #[test]
    fn test_initialize_is_idempotent() {
        let conn = create_test_db();
        let history = ChangeHistory::new(&conn);

        history.initialize().unwrap();
        history.initialize().unwrap();
        assert!(history.is_initialized().unwrap());
    }
}
