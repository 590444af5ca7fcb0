use crate::{QueryArguments, QueryStructureError, Result, Selection, filter::json::json_kind};
use serde_json::Value;
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    FindUnique,
    FindUniqueOrThrow,
    FindFirst,
    FindFirstOrThrow,
    FindMany,
    Create,
    CreateMany,
    Update,
    UpdateMany,
    Upsert,
    Delete,
    DeleteMany,
    Aggregate,
    GroupBy,
    Count,
}

impl Action {
    pub const ALL: [Action; 15] = [
        Action::FindUnique,
        Action::FindUniqueOrThrow,
        Action::FindFirst,
        Action::FindFirstOrThrow,
        Action::FindMany,
        Action::Create,
        Action::CreateMany,
        Action::Update,
        Action::UpdateMany,
        Action::Upsert,
        Action::Delete,
        Action::DeleteMany,
        Action::Aggregate,
        Action::GroupBy,
        Action::Count,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::FindUnique => "findUnique",
            Action::FindUniqueOrThrow => "findUniqueOrThrow",
            Action::FindFirst => "findFirst",
            Action::FindFirstOrThrow => "findFirstOrThrow",
            Action::FindMany => "findMany",
            Action::Create => "create",
            Action::CreateMany => "createMany",
            Action::Update => "update",
            Action::UpdateMany => "updateMany",
            Action::Upsert => "upsert",
            Action::Delete => "delete",
            Action::DeleteMany => "deleteMany",
            Action::Aggregate => "aggregate",
            Action::GroupBy => "groupBy",
            Action::Count => "count",
        }
    }

    pub fn is_read(self) -> bool {
        matches!(
            self,
            Action::FindUnique
                | Action::FindUniqueOrThrow
                | Action::FindFirst
                | Action::FindFirstOrThrow
                | Action::FindMany
        )
    }

    pub fn is_write(self) -> bool {
        matches!(
            self,
            Action::Create
                | Action::CreateMany
                | Action::Update
                | Action::UpdateMany
                | Action::Upsert
                | Action::Delete
                | Action::DeleteMany
        )
    }

    /// Reads that fail instead of returning nothing.
    pub fn is_or_throw(self) -> bool {
        matches!(self, Action::FindUniqueOrThrow | Action::FindFirstOrThrow)
    }

    /// Reads returning at most one row.
    pub fn is_single_read(self) -> bool {
        matches!(
            self,
            Action::FindUnique | Action::FindUniqueOrThrow | Action::FindFirst | Action::FindFirstOrThrow
        )
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = QueryStructureError;

    fn from_str(s: &str) -> Result<Self> {
        let action = match s {
            "createOne" => Action::Create,
            "updateOne" => Action::Update,
            "upsertOne" => Action::Upsert,
            "deleteOne" => Action::Delete,
            _ => Action::ALL
                .into_iter()
                .find(|action| action.as_str() == s)
                .ok_or_else(|| QueryStructureError::UnknownAction { action: s.to_owned() })?,
        };

        Ok(action)
    }
}

/// One query against one model. Built once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub model: String,
    pub action: Action,
    pub arguments: QueryArguments,
    pub selection: Option<Selection>,
}

impl Query {
    pub fn new(model: impl Into<String>, action: Action) -> Self {
        Self {
            model: model.into(),
            action,
            arguments: QueryArguments::default(),
            selection: None,
        }
    }

    pub fn builder() -> QueryBuilder {
        QueryBuilder::default()
    }

    pub fn with_arguments(mut self, arguments: QueryArguments) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn with_selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Reads `{ modelName, action, query: { arguments, selection } }`.
    pub fn from_json(value: Value) -> Result<Self> {
        let mut obj = match value {
            Value::Object(obj) => obj,
            other => {
                return Err(QueryStructureError::invalid_argument(
                    "query",
                    format!("expected an object, found {}", json_kind(&other)),
                ));
            }
        };

        let model = match obj.remove("modelName") {
            Some(Value::String(model)) => model,
            _ => return Err(QueryStructureError::MissingField { field: "modelName" }),
        };

        let action = match obj.remove("action") {
            Some(Value::String(action)) => action.parse::<Action>()?,
            _ => return Err(QueryStructureError::MissingField { field: "action" }),
        };

        let mut query = Query::new(model, action);

        match obj.remove("query") {
            Some(Value::Object(mut body)) => {
                if let Some(arguments) = body.remove("arguments") {
                    query.arguments = QueryArguments::from_json(arguments)?;
                }

                if let Some(selection) = body.remove("selection") {
                    query.selection = Some(Selection::from_json(selection)?);
                }
            }
            None | Some(Value::Null) => (),
            Some(other) => {
                return Err(QueryStructureError::invalid_argument(
                    "query",
                    format!("expected an object, found {}", json_kind(&other)),
                ));
            }
        }

        Ok(query)
    }
}

impl TryFrom<Value> for Query {
    type Error = QueryStructureError;

    fn try_from(value: Value) -> Result<Self> {
        Query::from_json(value)
    }
}

/// Assembles a [`Query`], failing on `build` when the model or the action is missing.
#[derive(Debug, Default)]
pub struct QueryBuilder {
    model: Option<String>,
    action: Option<Action>,
    arguments: QueryArguments,
    selection: Option<Selection>,
}

impl QueryBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.action = Some(action);
        self
    }

    pub fn arguments(mut self, arguments: QueryArguments) -> Self {
        self.arguments = arguments;
        self
    }

    pub fn selection(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    pub fn build(self) -> Result<Query> {
        let model = self.model.ok_or(QueryStructureError::MissingField { field: "model" })?;
        let action = self.action.ok_or(QueryStructureError::MissingField { field: "action" })?;

        Ok(Query {
            model,
            action,
            arguments: self.arguments,
            selection: self.selection,
        })
    }
}
