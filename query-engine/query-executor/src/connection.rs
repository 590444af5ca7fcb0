use driver_adapters::{Adapter, Queryable, ResultSet, SqlQuery, Transaction};
use query_compiler::CompiledQuery;
use tracing::{Instrument, info_span};

/// Where statements are sent: the adapter itself, or a transaction opened on it.
#[derive(Clone, Copy)]
pub(crate) enum ConnectionLike<'a> {
    Connection(&'a dyn Adapter),
    Transaction(&'a dyn Transaction),
}

impl ConnectionLike<'_> {
    pub(crate) fn is_transaction(&self) -> bool {
        matches!(self, Self::Transaction(_))
    }

    pub(crate) async fn query_raw(&self, compiled: &CompiledQuery) -> driver_adapters::Result<ResultSet> {
        let query = {
            let _span = info_span!("query:args", "length" = %compiled.args.len()).entered();
            sql_query(compiled)
        };

        let sql_span = info_span!("query:sql", "db.statement" = %compiled.sql);

        match self {
            Self::Connection(adapter) => adapter.query_raw(query).instrument(sql_span).await,
            Self::Transaction(tx) => tx.as_queryable().query_raw(query).instrument(sql_span).await,
        }
    }

    pub(crate) async fn execute_raw(&self, compiled: &CompiledQuery) -> driver_adapters::Result<u64> {
        let query = {
            let _span = info_span!("query:args", "length" = %compiled.args.len()).entered();
            sql_query(compiled)
        };

        let sql_span = info_span!("query:sql", "db.statement" = %compiled.sql);

        match self {
            Self::Connection(adapter) => adapter.execute_raw(query).instrument(sql_span).await,
            Self::Transaction(tx) => tx.as_queryable().execute_raw(query).instrument(sql_span).await,
        }
    }
}

fn sql_query(compiled: &CompiledQuery) -> SqlQuery {
    SqlQuery {
        sql: compiled.sql.clone(),
        args: compiled.args.clone(),
        arg_types: compiled.arg_types.clone(),
    }
}
