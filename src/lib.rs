#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]

//! dbready - database readiness bootstrapper
//!
//! dbready runs once at application startup and reconciles a SQLite store's
//! schema with the schema the application declares, before any request is
//! served. It handles three situations:
//!
//! - the store does not exist yet, or was never put under change tracking:
//!   the full schema is created from the model in one shot
//! - the store has a partial change history: the remaining changes are
//!   applied in declared order, stopping at the first failure
//! - the store is up to date: nothing happens
//!
//! # Architecture
//!
//! - **[`bootstrap`]**: the decision procedure, its collaborator traits and
//!   the closed [`BootstrapError`] taxonomy
//! - **[`database`]**: SQLite connection wrapper, change-history table,
//!   declared [`SchemaModel`] and the [`SqliteStoreFactory`] collaborator
//! - **[`config`]**: configuration file and `DBREADY_*` environment handling
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use dbready::{migrate_database, BootstrapHost, BootstrapLogger, TracingLogger};
//! use dbready::{SchemaModel, SqliteStoreFactory};
//!
//! struct App {
//!     store: SqliteStoreFactory,
//! }
//!
//! impl BootstrapHost for App {
//!     type Factory = SqliteStoreFactory;
//!
//!     fn store_factory(&self) -> &SqliteStoreFactory {
//!         &self.store
//!     }
//!
//!     fn logger(&self) -> Option<&dyn BootstrapLogger> {
//!         Some(&TracingLogger)
//!     }
//! }
//!
//! let store = SqliteStoreFactory::new("app.sqlite3", SchemaModel::from_dir("schema")?);
//! let app = migrate_database(App { store })?;
//! ```
//!
//! Bootstrapping is not safe to run from several processes against the same
//! store at once; serialize startup externally when running many instances.

pub mod bootstrap;
pub mod config;
pub mod database;
pub mod utils;

pub use config::DbreadyConfig;

pub use bootstrap::{
    migrate_database, BootstrapError, BootstrapHost, BootstrapLogger, BootstrapPlan,
    BootstrapReport, Bootstrapper, ChangeId, Phase, ReconciliationAction, ReconciliationDecision,
    StoreFactory, StoreHandle, StoreObservation, TracingLogger,
};

pub use database::{
    ChangeHistory, ChangeOrigin, DatabaseConn, HistoryEntry, SchemaChange, SchemaModel,
    SqliteStore, SqliteStoreFactory,
};

pub use utils::OutputFormat;
