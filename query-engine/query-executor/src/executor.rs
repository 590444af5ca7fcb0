use crate::{
    ExecutorError, Record, Result,
    connection::ConnectionLike,
    deserialize::coerce_result_set,
    reconcile::into_records,
};
use driver_adapters::{Adapter, IsolationLevel, ResultSet, Transaction};
use futures::{FutureExt, future::BoxFuture};
use query_compiler::{CompiledMutation, CompiledQuery, CompilerConfig, Dialect, QueryCompiler};
use query_structure::{Query, SchemaRegistry};
use query_value::QueryValue;
use std::{panic::AssertUnwindSafe, sync::Arc};
use tracing::info_span;

/// Compiles queries and runs them through an adapter.
pub struct QueryExecutor {
    adapter: Arc<dyn Adapter>,
    compiler: QueryCompiler,
}

impl QueryExecutor {
    pub fn new(adapter: Arc<dyn Adapter>, compiler: QueryCompiler) -> Self {
        Self { adapter, compiler }
    }

    /// An executor compiling for the adapter's own flavour.
    pub fn for_adapter(adapter: Arc<dyn Adapter>, registry: Arc<SchemaRegistry>) -> Self {
        let dialect = Dialect::from_name(adapter.flavour().dialect_name());
        Self::new(adapter, QueryCompiler::new(CompilerConfig::new(dialect), registry))
    }

    pub fn compiler(&self) -> &QueryCompiler {
        &self.compiler
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    /// Runs a read and returns its rows with coerced values and the column names of the database.
    pub async fn execute_query(&self, query: &Query) -> Result<ResultSet> {
        self.session().execute_query(query).await
    }

    pub async fn execute_query_as_maps(&self, query: &Query) -> Result<Vec<Record>> {
        self.session().execute_query_as_maps(query).await
    }

    /// The first record, if any. `findUniqueOrThrow` and `findFirstOrThrow` fail with
    /// [`ExecutorError::RecordNotFound`] instead of returning `None`.
    pub async fn execute_query_as_single_map(&self, query: &Query) -> Result<Option<Record>> {
        self.session().execute_query_as_single_map(query).await
    }

    /// Runs a write and returns the number of affected rows. Junction table statements of
    /// many-to-many `connect`/`disconnect` run in one transaction with the write itself.
    pub async fn execute_mutation(&self, query: &Query) -> Result<u64> {
        let mutation = self.compiler.compile_with_relations(query)?;

        if mutation.relation_mutations.is_empty() {
            return self.session().run_mutation(&mutation).await;
        }

        let tx = self.start_transaction(None).await?;
        let result = Session::new(ConnectionLike::Transaction(tx.as_ref()), &self.compiler)
            .run_mutation(&mutation)
            .await;

        close(tx.as_ref(), result).await
    }

    pub async fn execute_count(&self, query: &Query) -> Result<i64> {
        self.session().execute_count(query).await
    }

    /// Runs `f` against an executor bound to a new transaction. The transaction is committed when
    /// `f` succeeds and rolled back when it fails, in which case the error of `f` is returned. A
    /// panic in `f` rolls back before it resumes.
    ///
    /// Dropping the returned future before it completes leaves the transaction open. Closing it is
    /// then up to the adapter, when its connection is disposed.
    pub async fn execute_in_transaction<T, F>(&self, isolation_level: Option<IsolationLevel>, f: F) -> Result<T>
    where
        F: for<'tx> FnOnce(&'tx TransactionExecutor<'tx>) -> BoxFuture<'tx, Result<T>>,
    {
        let tx = self.start_transaction(isolation_level).await?;

        let executor = TransactionExecutor {
            session: Session::new(ConnectionLike::Transaction(tx.as_ref()), &self.compiler),
        };
        let result = match AssertUnwindSafe(f(&executor)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                match tx.rollback().await {
                    Ok(()) => tracing::debug!("transaction rolled back after a panic"),
                    Err(err) => tracing::error!(error = %err, "failed to roll back transaction after a panic"),
                }

                std::panic::resume_unwind(panic);
            }
        };

        close(tx.as_ref(), result).await
    }

    fn session(&self) -> Session<'_> {
        Session::new(ConnectionLike::Connection(self.adapter.as_ref()), &self.compiler)
    }

    async fn start_transaction(&self, isolation_level: Option<IsolationLevel>) -> Result<Box<dyn Transaction>> {
        if let Some(level) = isolation_level {
            level.check_supported(self.adapter.flavour())?;
        }

        let tx = self.adapter.start_transaction(isolation_level).await?;
        tracing::debug!(isolation_level = ?isolation_level, "transaction started");

        Ok(tx)
    }
}

/// The executor handed to [`QueryExecutor::execute_in_transaction`]. Every statement runs inside
/// the transaction.
pub struct TransactionExecutor<'a> {
    session: Session<'a>,
}

impl TransactionExecutor<'_> {
    pub async fn execute_query(&self, query: &Query) -> Result<ResultSet> {
        self.session.execute_query(query).await
    }

    pub async fn execute_query_as_maps(&self, query: &Query) -> Result<Vec<Record>> {
        self.session.execute_query_as_maps(query).await
    }

    pub async fn execute_query_as_single_map(&self, query: &Query) -> Result<Option<Record>> {
        self.session.execute_query_as_single_map(query).await
    }

    pub async fn execute_mutation(&self, query: &Query) -> Result<u64> {
        let mutation = self.session.compiler.compile_with_relations(query)?;
        self.session.run_mutation(&mutation).await
    }

    pub async fn execute_count(&self, query: &Query) -> Result<i64> {
        self.session.execute_count(query).await
    }
}

/// Compile, round-trip and deserialize, against one connection.
struct Session<'a> {
    conn: ConnectionLike<'a>,
    compiler: &'a QueryCompiler,
}

impl<'a> Session<'a> {
    fn new(conn: ConnectionLike<'a>, compiler: &'a QueryCompiler) -> Self {
        Self { conn, compiler }
    }

    async fn execute_query(&self, query: &Query) -> Result<ResultSet> {
        let compiled = self.compiler.compile(query)?;
        self.query(&compiled).await
    }

    async fn execute_query_as_maps(&self, query: &Query) -> Result<Vec<Record>> {
        let compiled = self.compiler.compile(query)?;
        let result = self.query(&compiled).await?;

        let _span = info_span!("query:result", "length" = %result.len()).entered();
        Ok(into_records(result, &compiled))
    }

    async fn execute_query_as_single_map(&self, query: &Query) -> Result<Option<Record>> {
        let record = self.execute_query_as_maps(query).await?.into_iter().next();

        match record {
            None if query.action.is_or_throw() => Err(ExecutorError::RecordNotFound {
                model: query.model.clone(),
                action: query.action,
            }),
            record => Ok(record),
        }
    }

    async fn execute_count(&self, query: &Query) -> Result<i64> {
        let compiled = self.compiler.compile(query)?;
        let result = self.query(&compiled).await?;

        let column = result.column_names.first().cloned().unwrap_or_default();
        let value = result
            .rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .unwrap_or(QueryValue::Int(0));

        i64::try_from(value).map_err(|failure| ExecutorError::conversion(&column, failure.to_string()))
    }

    /// The affected-row count of the main statement: the number of returned rows when it has
    /// `RETURNING`, the adapter's count otherwise.
    async fn run_mutation(&self, mutation: &CompiledMutation) -> Result<u64> {
        debug_assert!(mutation.relation_mutations.is_empty() || self.conn.is_transaction());

        let main = &mutation.main_query;

        let Some(generated) = &mutation.generated_id else {
            let affected = if main.returns_rows {
                self.query(main).await?.len() as u64
            } else {
                self.conn.execute_raw(main).await?
            };

            for statement in &mutation.relation_mutations {
                self.conn.execute_raw(statement).await?;
            }

            return Ok(affected);
        };

        let result = self.query(main).await?;
        let id = generated_id(&result, &generated.column).ok_or_else(|| ExecutorError::MissingGeneratedId {
            column: generated.column.clone(),
        })?;

        tracing::debug!(column = %generated.column, id = %id, "binding generated id");

        for statement in mutation.bind_generated_id(&id) {
            self.conn.execute_raw(&statement).await?;
        }

        Ok((result.len() as u64).max(1))
    }

    async fn query(&self, compiled: &CompiledQuery) -> Result<ResultSet> {
        let mut result = self.conn.query_raw(compiled).await?;
        coerce_result_set(&mut result)?;

        Ok(result)
    }
}

/// The id of a created row: from the returned row, else from the adapter's last insert id.
fn generated_id(result: &ResultSet, column: &str) -> Option<QueryValue> {
    let returned = result
        .column_index(column)
        .and_then(|idx| result.rows.first().and_then(|row| row.get(idx)))
        .filter(|value| !value.is_null())
        .cloned();

    returned.or_else(|| {
        result.last_insert_id.as_ref().map(|id| match id.parse::<i64>() {
            Ok(id) => QueryValue::Int(id),
            Err(_) => QueryValue::String(id.clone()),
        })
    })
}

async fn close<T>(tx: &dyn Transaction, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            tracing::debug!("transaction committed");

            Ok(value)
        }
        Err(err) => {
            match tx.rollback().await {
                Ok(()) => tracing::debug!(error = %err, "transaction rolled back"),
                Err(rollback_err) => tracing::error!(error = %rollback_err, "failed to roll back transaction"),
            }

            Err(err)
        }
    }
}
