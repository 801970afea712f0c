//! Database module
//!
//! SQLite side of the bootstrapper:
//!
//! ```text
//! database/
//! ├── core/       # Foundation
//! │   ├── connection  # SQLite DatabaseConn wrapper
//! │   └── schema      # change-history table and queries
//! ├── model       # declared schema: full model + ordered changes
//! └── store       # StoreFactory / StoreHandle implementation
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use dbready::database::{SchemaModel, SqliteStoreFactory};
//! use dbready::bootstrap::Bootstrapper;
//!
//! let model = SchemaModel::from_dir("./schema")?;
//! let factory = SqliteStoreFactory::new("./data/app.sqlite3", model);
//! Bootstrapper::new(None).run(&factory)?;
//! ```

pub mod core;
pub mod model;
pub mod store;

pub use core::{ChangeHistory, ChangeOrigin, DatabaseConn, HistoryEntry, SchemaDefinitions};
pub use model::{SchemaChange, SchemaModel, CHANGES_DIR, MODEL_FILE};
pub use store::{SqliteStore, SqliteStoreFactory};
