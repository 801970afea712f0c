//! SQLite storage collaborator for the bootstrapper
//!
//! `SqliteStoreFactory` hands out one `SqliteStore` per bootstrap run. The
//! store connects lazily: a missing database file is reported as unreachable
//! by the reachability check, and only create-from-model is allowed to create
//! it. Observing never changes the file; WAL journaling is switched on by the
//! first mutating action.

use anyhow::anyhow;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::bootstrap::{BootstrapError, ChangeId, StoreFactory, StoreHandle};
use crate::database::core::{ChangeHistory, ChangeOrigin, DatabaseConn, HistoryEntry};
use crate::database::model::SchemaModel;

/// Produces scoped SQLite store handles bound to one declared model
#[derive(Debug, Clone)]
pub struct SqliteStoreFactory {
    path: PathBuf,
    model: Arc<SchemaModel>,
}

impl SqliteStoreFactory {
    pub fn new<P: Into<PathBuf>>(path: P, model: SchemaModel) -> Self {
        Self {
            path: path.into(),
            model: Arc::new(model),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn model(&self) -> &SchemaModel {
        &self.model
    }
}

impl StoreFactory for SqliteStoreFactory {
    type Handle = SqliteStore;

    fn open_scope(&self) -> Result<SqliteStore, BootstrapError> {
        debug!("Opening store scope for {}", self.path.display());
        Ok(SqliteStore {
            path: self.path.clone(),
            model: self.model.clone(),
            db: None,
        })
    }
}

/// Scoped handle to a SQLite database file
///
/// The connection is closed when the handle is dropped.
pub struct SqliteStore {
    path: PathBuf,
    model: Arc<SchemaModel>,
    db: Option<DatabaseConn>,
}

impl SqliteStore {
    /// Change-history rows, empty when the database is unreachable
    pub fn history(&mut self) -> Result<Vec<HistoryEntry>, BootstrapError> {
        if !self.can_connect()? {
            return Ok(Vec::new());
        }
        let db = self.connected()?;
        ChangeHistory::new(&db.conn)
            .entries()
            .map_err(|e| BootstrapError::unknown(e.to_string()))
    }

    fn connected(&self) -> Result<&DatabaseConn, BootstrapError> {
        self.db.as_ref().ok_or_else(|| {
            BootstrapError::connectivity(format!(
                "database '{}' is not connected",
                self.path.display()
            ))
        })
    }

    /// Connect to an existing database file, never creating one
    fn ensure_existing(&mut self) -> Result<(), BootstrapError> {
        if self.db.is_none() {
            let db = DatabaseConn::open_existing(&self.path)
                .map_err(|e| BootstrapError::connectivity(e.to_string()))?;
            self.db = Some(db);
        }
        Ok(())
    }

    /// Connect, creating the database file and its parent directory if needed
    fn ensure_created(&mut self) -> Result<(), BootstrapError> {
        if self.db.is_some() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    BootstrapError::connectivity(format!(
                        "Unable to create database directory '{}': {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let db = DatabaseConn::open_path(&self.path)
            .map_err(|e| BootstrapError::connectivity(e.to_string()))?;
        self.db = Some(db);
        Ok(())
    }
}

impl StoreHandle for SqliteStore {
    fn can_connect(&mut self) -> Result<bool, BootstrapError> {
        if let Some(db) = &self.db {
            return Ok(db.ping().is_ok());
        }

        match DatabaseConn::open_existing(&self.path) {
            Ok(db) => {
                self.db = Some(db);
                Ok(true)
            }
            Err(e) => {
                debug!("Store {} not reachable: {}", self.path.display(), e);
                Ok(false)
            }
        }
    }

    fn applied_changes(&mut self) -> Result<Vec<ChangeId>, BootstrapError> {
        if self.db.is_none() {
            return Ok(Vec::new());
        }
        let db = self.connected()?;
        ChangeHistory::new(&db.conn)
            .applied()
            .map_err(|e| BootstrapError::unknown(e.to_string()))
    }

    fn pending_changes(&mut self) -> Result<Vec<ChangeId>, BootstrapError> {
        if self.db.is_none() {
            return Ok(Vec::new());
        }
        let applied: HashSet<ChangeId> = self.applied_changes()?.into_iter().collect();
        Ok(self
            .model
            .change_ids()
            .into_iter()
            .filter(|id| !applied.contains(id))
            .collect())
    }

    fn create_from_model(&mut self) -> Result<(), BootstrapError> {
        self.ensure_created()?;
        let db = self.connected()?;
        let model = &self.model;

        // A model without declared changes leaves no history rows, so a store
        // that already holds tables is treated as created
        let populated = db
            .has_user_tables()
            .map_err(|e| BootstrapError::unknown(e.to_string()))?;
        if populated {
            info!(
                "Schema already present in {}, skipping model creation",
                self.path.display()
            );
            return Ok(());
        }

        db.enable_wal()
            .map_err(|e| BootstrapError::unknown(e.to_string()))?;

        let tx = db
            .transaction()
            .map_err(|e| BootstrapError::unknown(e.to_string()))?;

        tx.execute_batch(&model.model_sql)
            .map_err(|e| BootstrapError::unknown(format!("Failed to create schema: {}", e)))?;

        let history = ChangeHistory::new(&tx);
        history
            .initialize()
            .map_err(|e| BootstrapError::unknown(e.to_string()))?;

        for change in &model.changes {
            history
                .record(&change.id, ChangeOrigin::Model)
                .map_err(|e| BootstrapError::unknown(e.to_string()))?;
        }

        tx.commit()
            .map_err(|e| BootstrapError::unknown(format!("Failed to commit schema: {}", e)))?;

        info!(
            "Created schema for {} ({} changes recorded as baseline)",
            self.path.display(),
            model.changes.len()
        );
        Ok(())
    }

    fn apply_change(&mut self, change: &ChangeId) -> Result<(), BootstrapError> {
        let declared = self.model.change(change).cloned().ok_or_else(|| {
            BootstrapError::unknown(format!("Change '{}' is not declared by the model", change))
        })?;

        self.ensure_existing()?;
        let db = self.connected()?;
        let failed = |e: anyhow::Error| BootstrapError::change_application(change.clone(), e.to_string());

        db.enable_wal().map_err(failed)?;
        let tx = db.transaction().map_err(failed)?;
        let history = ChangeHistory::new(&tx);
        history.initialize().map_err(failed)?;

        tx.execute_batch(&declared.sql)
            .map_err(|e| failed(anyhow!(e)))?;
        history
            .record(&declared.id, ChangeOrigin::Change)
            .map_err(failed)?;

        tx.commit().map_err(|e| failed(anyhow!(e)))?;

        info!("Applied change {} to {}", change, self.path.display());
        Ok(())
    }
}

impl Drop for SqliteStore {
    fn drop(&mut self) {
        if let Some(db) = self.db.take() {
            match db.conn.close() {
                Ok(()) => debug!("Released store handle for {}", self.path.display()),
                Err((_, e)) => warn!(
                    "Failed to close database {} cleanly: {}",
                    self.path.display(),
                    e
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::{Bootstrapper, ReconciliationAction, ReconciliationDecision};
    use crate::database::model::SchemaChange;

    const MODEL: &str = r#"
        CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, email TEXT);
        CREATE INDEX idx_users_email ON users(email);
    "#;

    fn changes() -> Vec<SchemaChange> {
        vec![
            SchemaChange::new(
                "001_users",
                "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
            ),
            SchemaChange::new("002_users_email", "ALTER TABLE users ADD COLUMN email TEXT;"),
            SchemaChange::new(
                "003_users_email_index",
                "CREATE INDEX idx_users_email ON users(email);",
            ),
        ]
    }

    fn model() -> SchemaModel {
        SchemaModel::new(MODEL, changes()).unwrap()
    }

    fn columns(path: &Path, table: &str) -> Vec<String> {
        let db = DatabaseConn::open_existing(path).unwrap();
        let mut stmt = db
            .conn
            .prepare(&format!("PRAGMA table_info({})", table))
            .unwrap();
        stmt.query_map([], |row| row.get::<_, String>(1))
            .unwrap()
            .collect::<Result<Vec<_>, _>>()
            .unwrap()
    }

    /// Apply the first `n` declared changes the way an older release would have
    fn seed_partial_history(path: &Path, n: usize) {
        let factory = SqliteStoreFactory::new(path, model());
        let mut store = factory.open_scope().unwrap();
        DatabaseConn::open_path(path).unwrap();
        for change in changes().iter().take(n) {
            store.apply_change(&change.id).unwrap();
        }
    }

    #[test]
    fn test_missing_file_is_unreachable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.sqlite3");
        let factory = SqliteStoreFactory::new(&path, model());

        let mut store = factory.open_scope().unwrap();
        assert!(!store.can_connect().unwrap());
        assert!(store.applied_changes().unwrap().is_empty());
        assert!(store.pending_changes().unwrap().is_empty());
        assert!(!path.exists());
    }

    #[test]
    fn test_fresh_store_created_from_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("app.sqlite3");
        let factory = SqliteStoreFactory::new(&path, model());

        let report = Bootstrapper::new(None).run(&factory).unwrap();
        assert_eq!(report.decision, ReconciliationDecision::NoMigrationHistory);
        assert_eq!(columns(&path, "users"), vec!["id", "name", "email"]);

        let mut store = factory.open_scope().unwrap();
        let history = store.history().unwrap();
        assert_eq!(history.len(), 3);
        assert!(history.iter().all(|e| e.origin == ChangeOrigin::Model));
        drop(store);

        let second = Bootstrapper::new(None).run(&factory).unwrap();
        assert_eq!(second.decision, ReconciliationDecision::UpToDate);
        assert_eq!(second.action, ReconciliationAction::NoOp);
    }

    #[test]
    fn test_partial_history_applies_remaining() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.sqlite3");
        seed_partial_history(&path, 1);

        let factory = SqliteStoreFactory::new(&path, model());
        let report = Bootstrapper::new(None).run(&factory).unwrap();

        assert_eq!(report.decision, ReconciliationDecision::HasPendingChanges);
        assert_eq!(
            report.applied_changes,
            vec![
                ChangeId::from("002_users_email"),
                ChangeId::from("003_users_email_index")
            ]
        );
        assert_eq!(columns(&path, "users"), vec!["id", "name", "email"]);

        let mut store = factory.open_scope().unwrap();
        let origins: Vec<ChangeOrigin> =
            store.history().unwrap().iter().map(|e| e.origin).collect();
        assert_eq!(origins, vec![ChangeOrigin::Change; 3]);
    }

    #[test]
    fn test_empty_existing_file_applies_all_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.sqlite3");
        DatabaseConn::open_path(&path).unwrap();

        let factory = SqliteStoreFactory::new(&path, model());
        let report = Bootstrapper::new(None).run(&factory).unwrap();

        assert_eq!(report.decision, ReconciliationDecision::HasPendingChanges);
        assert_eq!(report.applied_changes.len(), 3);
    }

    #[test]
    fn test_no_declared_changes_creates_from_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.sqlite3");
        DatabaseConn::open_path(&path).unwrap();

        let factory = SqliteStoreFactory::new(&path, SchemaModel::new(MODEL, vec![]).unwrap());
        let report = Bootstrapper::new(None).run(&factory).unwrap();

        assert_eq!(report.decision, ReconciliationDecision::NoMigrationHistory);
        assert_eq!(columns(&path, "users"), vec!["id", "name", "email"]);
    }

    #[test]
    fn test_no_declared_changes_rerun_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.sqlite3");
        let factory = SqliteStoreFactory::new(&path, SchemaModel::new(MODEL, vec![]).unwrap());

        let first = Bootstrapper::new(None).run(&factory).unwrap();
        assert_eq!(first.decision, ReconciliationDecision::NoMigrationHistory);

        let second = Bootstrapper::new(None).run(&factory).unwrap();
        assert_eq!(second.decision, ReconciliationDecision::NoMigrationHistory);
        assert_eq!(second.action, ReconciliationAction::CreateFromModel);
        assert_eq!(columns(&path, "users"), vec!["id", "name", "email"]);
    }

    #[test]
    fn test_existing_tables_are_left_alone_by_create() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.sqlite3");
        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute_batch(
                "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);
                 INSERT INTO users (name) VALUES ('ada');",
            )
            .unwrap();
        }

        let factory = SqliteStoreFactory::new(&path, SchemaModel::new(MODEL, vec![]).unwrap());
        Bootstrapper::new(None).run(&factory).unwrap();

        assert_eq!(columns(&path, "users"), vec!["id", "name"]);
        let db = DatabaseConn::open_existing(&path).unwrap();
        let count: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_plan_keeps_legacy_journal_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("legacy.sqlite3");
        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute_batch(
                "PRAGMA journal_mode=DELETE;
                 CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL);",
            )
            .unwrap();
        }

        let factory = SqliteStoreFactory::new(&path, model());
        let plan = Bootstrapper::new(None).plan(&factory).unwrap();
        assert_eq!(plan.decision, ReconciliationDecision::HasPendingChanges);

        let conn = rusqlite::Connection::open(&path).unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "delete");
        let history_tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE name = 'dbready_history'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(history_tables, 0);
        assert!(!dir.path().join("legacy.sqlite3-wal").exists());
    }

    #[test]
    fn test_mutating_action_enables_wal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.sqlite3");
        {
            let conn = rusqlite::Connection::open(&path).unwrap();
            conn.execute_batch("PRAGMA journal_mode=DELETE;").unwrap();
        }

        let factory = SqliteStoreFactory::new(&path, model());
        Bootstrapper::new(None).run(&factory).unwrap();

        let conn = rusqlite::Connection::open(&path).unwrap();
        let mode: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }

    #[test]
    fn test_failing_change_keeps_earlier_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.sqlite3");
        seed_partial_history(&path, 1);

        let broken = vec![
            changes()[0].clone(),
            SchemaChange::new("002_users_email", "ALTER TABLE users ADD COLUMN email TEXT;"),
            SchemaChange::new("003_broken", "ALTER TABLE missing_table ADD COLUMN x TEXT;"),
            SchemaChange::new("004_never", "CREATE TABLE never (id INTEGER);"),
        ];
        let factory = SqliteStoreFactory::new(&path, SchemaModel::new(MODEL, broken).unwrap());

        let err = Bootstrapper::new(None).run(&factory).unwrap_err();
        assert_eq!(err.change_id(), Some(&ChangeId::from("003_broken")));

        let mut store = factory.open_scope().unwrap();
        assert!(store.can_connect().unwrap());
        assert_eq!(
            store.applied_changes().unwrap(),
            vec![ChangeId::from("001_users"), ChangeId::from("002_users_email")]
        );
        assert!(!store.connected().unwrap().table_exists("never").unwrap());
    }

    #[test]
    fn test_apply_undeclared_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.sqlite3");
        let factory = SqliteStoreFactory::new(&path, model());

        let mut store = factory.open_scope().unwrap();
        let err = store.apply_change(&ChangeId::from("999_unknown")).unwrap_err();
        assert_eq!(err.kind(), "unknown");
    }

    #[test]
    fn test_apply_change_on_missing_file_is_connectivity_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.sqlite3");
        let factory = SqliteStoreFactory::new(&path, model());

        let mut store = factory.open_scope().unwrap();
        let err = store.apply_change(&ChangeId::from("001_users")).unwrap_err();
        assert_eq!(err.kind(), "connectivity");
        assert!(!path.exists());
    }
}
