//! Driver Adapters
//!
//! The contract between the query executor and a database driver. An adapter receives SQL that
//! is already rendered for its flavour, together with positional arguments, and hands back result
//! sets and affected-row counts. It never sees the query IR, and the executor never speaks a wire
//! protocol itself.

mod error;
mod queryable;
mod transaction;
mod types;

pub use error::{AdapterError, Result};
pub use queryable::{Adapter, Queryable};
pub use transaction::{IsolationLevel, Transaction};
pub use types::{
    AdapterFlavour, ColumnType, ConnectionInfo, DEFAULT_MYSQL_DB, DEFAULT_POSTGRES_SCHEMA, DEFAULT_SQLITE_DATABASE,
    ResultSet, SqlQuery,
};
