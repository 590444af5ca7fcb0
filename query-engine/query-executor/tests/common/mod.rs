#![allow(dead_code)]

use async_trait::async_trait;
use driver_adapters::{
    Adapter, AdapterError, AdapterFlavour, ColumnType, ConnectionInfo, IsolationLevel, Queryable, Result, ResultSet,
    SqlQuery, Transaction,
};
use query_executor::QueryExecutor;
use query_structure::{FieldInfo, ModelSchema, RelationInfo, SchemaRegistry, TypeIdentifier};
use query_value::QueryValue;
use std::{
    collections::VecDeque,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

pub fn registry() -> SchemaRegistry {
    SchemaRegistry::new()
        .with_model(
            ModelSchema::new("User")
                .field(FieldInfo::new("id", TypeIdentifier::String).id())
                .field(FieldInfo::new("email", TypeIdentifier::String))
                .field(FieldInfo::new("createdAt", TypeIdentifier::DateTime).column("created_at"))
                .relation(RelationInfo::one_to_many("posts", "Post", "authorId"))
                .relation(RelationInfo::one_to_many("orders", "Order", "userId")),
        )
        .with_model(
            ModelSchema::new("Post")
                .field(FieldInfo::new("id", TypeIdentifier::String).id())
                .field(FieldInfo::new("title", TypeIdentifier::String))
                .field(FieldInfo::new("published", TypeIdentifier::Boolean))
                .field(FieldInfo::new("authorId", TypeIdentifier::String))
                .relation(RelationInfo::many_to_one("author", "User", "authorId"))
                .relation(RelationInfo::many_to_many("tags", "Tag", "_PostToTag")),
        )
        .with_model(
            ModelSchema::new("Tag")
                .field(FieldInfo::new("id", TypeIdentifier::String).id())
                .field(FieldInfo::new("name", TypeIdentifier::String)),
        )
        .with_model(
            ModelSchema::new("Order")
                .table("orders")
                .field(FieldInfo::new("id", TypeIdentifier::Int).id())
                .field(FieldInfo::new("userId", TypeIdentifier::String).column("user_id"))
                .field(FieldInfo::new("status", TypeIdentifier::String)),
        )
}

pub fn executor(adapter: &Arc<RecordingAdapter>) -> QueryExecutor {
    let adapter: Arc<dyn Adapter> = adapter.clone();
    QueryExecutor::for_adapter(adapter, Arc::new(registry()))
}

pub fn result_set(columns: &[(&str, ColumnType)], rows: Vec<Vec<QueryValue>>) -> ResultSet {
    ResultSet::new(
        columns.iter().map(|(name, _)| (*name).to_owned()).collect(),
        columns.iter().map(|(_, column_type)| *column_type).collect(),
        rows,
    )
}

/// Everything sent to the database, shared between an adapter and its transactions.
#[derive(Default)]
struct State {
    log: Vec<String>,
    queries: Vec<SqlQuery>,
    results: VecDeque<ResultSet>,
    affected_rows: u64,
    fail_on: Option<String>,
}

impl State {
    fn run(&mut self, query: &SqlQuery) -> Result<()> {
        self.log.push(query.sql.clone());
        self.queries.push(query.clone());

        match &self.fail_on {
            Some(fragment) if query.sql.contains(fragment.as_str()) => Err(AdapterError::Query {
                code: Some("23503".to_owned()),
                message: format!("statement failed: {}", query.sql),
            }),
            _ => Ok(()),
        }
    }
}

/// An in-memory adapter recording every statement and answering reads with queued result sets.
pub struct RecordingAdapter {
    flavour: AdapterFlavour,
    state: Arc<Mutex<State>>,
}

impl RecordingAdapter {
    pub fn new(flavour: AdapterFlavour) -> Arc<Self> {
        Arc::new(Self {
            flavour,
            state: Arc::default(),
        })
    }

    pub fn push_result(&self, result: ResultSet) {
        self.state.lock().unwrap().results.push_back(result);
    }

    pub fn set_affected_rows(&self, rows: u64) {
        self.state.lock().unwrap().affected_rows = rows;
    }

    /// Statements whose SQL contains `fragment` fail.
    pub fn fail_on(&self, fragment: &str) {
        self.state.lock().unwrap().fail_on = Some(fragment.to_owned());
    }

    pub fn log(&self) -> Vec<String> {
        self.state.lock().unwrap().log.clone()
    }

    pub fn queries(&self) -> Vec<SqlQuery> {
        self.state.lock().unwrap().queries.clone()
    }
}

#[async_trait]
impl Queryable for RecordingAdapter {
    async fn query_raw(&self, query: SqlQuery) -> Result<ResultSet> {
        let mut state = self.state.lock().unwrap();
        state.run(&query)?;

        Ok(state.results.pop_front().unwrap_or_default())
    }

    async fn execute_raw(&self, query: SqlQuery) -> Result<u64> {
        let mut state = self.state.lock().unwrap();
        state.run(&query)?;

        Ok(state.affected_rows)
    }
}

#[async_trait]
impl Adapter for RecordingAdapter {
    fn flavour(&self) -> AdapterFlavour {
        self.flavour
    }

    async fn execute_script(&self, script: &str) -> Result<()> {
        self.state.lock().unwrap().log.push(script.to_owned());
        Ok(())
    }

    async fn start_transaction(&self, isolation_level: Option<IsolationLevel>) -> Result<Box<dyn Transaction>> {
        let mut state = self.state.lock().unwrap();

        let set_isolation = isolation_level.and_then(|level| level.set_statement(self.flavour));

        match set_isolation {
            Some(statement) if self.flavour.requires_isolation_first() => {
                state.log.push(statement);
                state.log.push("BEGIN".to_owned());
            }
            Some(statement) => {
                state.log.push("BEGIN".to_owned());
                state.log.push(statement);
            }
            None => state.log.push("BEGIN".to_owned()),
        }

        Ok(Box::new(RecordingTransaction {
            state: self.state.clone(),
            active: AtomicBool::new(true),
        }))
    }

    fn connection_info(&self) -> ConnectionInfo {
        ConnectionInfo {
            schema_name: None,
            max_bind_values: Some(32766),
            supports_relation_joins: true,
        }
    }

    async fn dispose(&self) -> Result<()> {
        Ok(())
    }
}

pub struct RecordingTransaction {
    state: Arc<Mutex<State>>,
    active: AtomicBool,
}

impl RecordingTransaction {
    fn close(&self, statement: &str) -> Result<()> {
        if !self.active.swap(false, Ordering::SeqCst) {
            return Err(AdapterError::transaction_closed(statement));
        }

        self.state.lock().unwrap().log.push(statement.to_owned());
        Ok(())
    }
}

#[async_trait]
impl Queryable for RecordingTransaction {
    async fn query_raw(&self, query: SqlQuery) -> Result<ResultSet> {
        if !self.is_active() {
            return Err(AdapterError::transaction_closed("query"));
        }

        let mut state = self.state.lock().unwrap();
        state.run(&query)?;

        Ok(state.results.pop_front().unwrap_or_default())
    }

    async fn execute_raw(&self, query: SqlQuery) -> Result<u64> {
        if !self.is_active() {
            return Err(AdapterError::transaction_closed("query"));
        }

        let mut state = self.state.lock().unwrap();
        state.run(&query)?;

        Ok(state.affected_rows)
    }
}

#[async_trait]
impl Transaction for RecordingTransaction {
    async fn commit(&self) -> Result<()> {
        self.close("COMMIT")
    }

    async fn rollback(&self) -> Result<()> {
        self.close("ROLLBACK")
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn as_queryable(&self) -> &dyn Queryable {
        self
    }
}
