use crate::{AdapterFlavour, ConnectionInfo, IsolationLevel, Result, ResultSet, SqlQuery, Transaction};
use async_trait::async_trait;

/// Represents a connection or a transaction that can be queried.
#[async_trait]
pub trait Queryable: Send + Sync {
    /// Execute a query returning rows.
    async fn query_raw(&self, query: SqlQuery) -> Result<ResultSet>;

    /// Execute a statement, returning the number of affected rows.
    async fn execute_raw(&self, query: SqlQuery) -> Result<u64>;
}

/// A database connection provided by a driver.
#[async_trait]
pub trait Adapter: Queryable {
    fn flavour(&self) -> AdapterFlavour;

    /// Run a script of one or more statements without parameters.
    async fn execute_script(&self, script: &str) -> Result<()>;

    /// Start a new transaction. Implementers validate `isolation_level` against their database,
    /// see [`IsolationLevel::check_supported`].
    async fn start_transaction(&self, isolation_level: Option<IsolationLevel>) -> Result<Box<dyn Transaction>>;

    fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo::default()
    }

    /// Release the underlying connection. Nothing is released implicitly.
    async fn dispose(&self) -> Result<()>;
}
