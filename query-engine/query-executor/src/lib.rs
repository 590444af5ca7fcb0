//! Runs compiled queries through a driver adapter and turns the rows into records.
//!
//! Reads come back as [`Record`]s keyed by camelCase field names, with the rows of joined
//! relations nested under their relation field. Writes return affected-row counts.

mod connection;
mod deserialize;
mod error;
mod executor;
mod reconcile;

pub use deserialize::normalize_column_name;
pub use error::{ExecutorError, Result};
pub use executor::{QueryExecutor, TransactionExecutor};

/// A row keyed by field name, in column order.
pub type Record = indexmap::IndexMap<String, query_value::QueryValue>;
