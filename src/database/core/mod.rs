//! Core database infrastructure
//!
//! - `DatabaseConn`: SQLite connection wrapper with configuration
//! - `ChangeHistory`: the store's record of applied schema changes

mod connection;
mod schema;

pub use connection::DatabaseConn;
pub use schema::{ChangeHistory, ChangeOrigin, HistoryEntry, SchemaDefinitions};
