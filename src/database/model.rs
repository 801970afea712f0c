//! Declared application schema
//!
//! A [`SchemaModel`] is what the application expects the store to look like:
//! the full current schema as a list of statements, and the ordered set of
//! incremental changes that lead to it.
//!
//! On disk the model lives in a directory:
//!
//! ```text
//! schema/
//! ├── model.sql          # full current schema
//! └── changes/
//!     ├── 001_init.sql   # applied in filename order,
//!     └── 002_users.sql  # id = file stem
//! ```

use anyhow::{anyhow, Result};
use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

use crate::bootstrap::ChangeId;

/// File holding the full current schema inside a schema directory
pub const MODEL_FILE: &str = "model.sql";

/// Subdirectory holding incremental change scripts
pub const CHANGES_DIR: &str = "changes";

/// One declared incremental change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaChange {
    pub id: ChangeId,
    pub sql: String,
}

impl SchemaChange {
    pub fn new(id: impl Into<ChangeId>, sql: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            sql: sql.into(),
        }
    }
}

/// The application's declared schema
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaModel {
    /// Statements creating the full current schema
    pub model_sql: String,
    /// Incremental changes in declared order
    pub changes: Vec<SchemaChange>,
}

impl SchemaModel {
    /// Build a model, rejecting duplicate change ids
    pub fn new(model_sql: impl Into<String>, changes: Vec<SchemaChange>) -> Result<Self> {
        let mut seen = HashSet::new();
        for change in &changes {
            if !seen.insert(change.id.clone()) {
                return Err(anyhow!("Duplicate schema change id '{}'", change.id));
            }
        }

        Ok(Self {
            model_sql: model_sql.into(),
            changes,
        })
    }

    /// Load a model from a schema directory
    ///
    /// `model.sql` is required. The `changes/` subdirectory is optional; only
    /// `*.sql` files in it are considered.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let model_path = dir.join(MODEL_FILE);
        let model_sql = std::fs::read_to_string(&model_path).map_err(|e| {
            anyhow!(
                "Unable to read schema model '{}': {}",
                model_path.display(),
                e
            )
        })?;

        let changes_dir = dir.join(CHANGES_DIR);
        let mut files = Vec::new();
        if changes_dir.is_dir() {
            let entries = std::fs::read_dir(&changes_dir).map_err(|e| {
                anyhow!(
                    "Unable to list changes in '{}': {}",
                    changes_dir.display(),
                    e
                )
            })?;
            for entry in entries {
                let path = entry
                    .map_err(|e| anyhow!("Unable to read change entry: {}", e))?
                    .path();
                if path.is_file() && path.extension().is_some_and(|ext| ext == "sql") {
                    files.push(path);
                }
            }
        }
        files.sort();

        let mut changes = Vec::with_capacity(files.len());
        for path in files {
            let id = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| anyhow!("Invalid change file name '{}'", path.display()))?;
            let sql = std::fs::read_to_string(&path)
                .map_err(|e| anyhow!("Unable to read change '{}': {}", path.display(), e))?;
            changes.push(SchemaChange::new(id, sql));
        }

        debug!(
            "Loaded schema model from {} with {} changes",
            dir.display(),
            changes.len()
        );
        Self::new(model_sql, changes)
    }

    /// Declared change ids in order
    pub fn change_ids(&self) -> Vec<ChangeId> {
        self.changes.iter().map(|c| c.id.clone()).collect()
    }

    /// Look up a declared change by id
    pub fn change(&self, id: &ChangeId) -> Option<&SchemaChange> {
        self.changes.iter().find(|c| &c.id == id)
    }
}
