use query_value::{ArgType, QueryValue};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const DEFAULT_POSTGRES_SCHEMA: &str = "public";
pub const DEFAULT_MYSQL_DB: &str = "mysql";
pub const DEFAULT_SQLITE_DATABASE: &str = "main";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdapterFlavour {
    Mysql,
    Postgres,
    Sqlite,
}

impl AdapterFlavour {
    /// The dialect name the query compiler understands for this flavour.
    pub fn dialect_name(self) -> &'static str {
        match self {
            Self::Mysql => "mysql",
            Self::Postgres => "postgresql",
            Self::Sqlite => "sqlite",
        }
    }

    /// MySQL only applies `SET TRANSACTION ISOLATION LEVEL` to the next transaction, so the
    /// statement has to run before `BEGIN`.
    pub fn requires_isolation_first(self) -> bool {
        match self {
            Self::Mysql => true,
            Self::Postgres | Self::Sqlite => false,
        }
    }
}

impl FromStr for AdapterFlavour {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "postgres" | "postgresql" | "supabase" => Ok(Self::Postgres),
            "mysql" => Ok(Self::Mysql),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(format!("Unsupported adapter flavour: {s:?}")),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    pub schema_name: Option<String>,
    pub max_bind_values: Option<u32>,
    #[serde(default)]
    pub supports_relation_joins: bool,
}

impl ConnectionInfo {
    pub fn schema_name_or_default(&self, flavour: AdapterFlavour) -> &str {
        match self.schema_name.as_deref() {
            Some(name) => name,
            None => match flavour {
                AdapterFlavour::Mysql => DEFAULT_MYSQL_DB,
                AdapterFlavour::Postgres => DEFAULT_POSTGRES_SCHEMA,
                AdapterFlavour::Sqlite => DEFAULT_SQLITE_DATABASE,
            },
        }
    }
}

/// A statement as handed to a driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlQuery {
    pub sql: String,
    pub args: Vec<QueryValue>,
    pub arg_types: Vec<ArgType>,
}

impl SqlQuery {
    pub fn new(sql: impl Into<String>, args: Vec<QueryValue>) -> Self {
        let arg_types = args.iter().map(ArgType::of).collect();

        Self {
            sql: sql.into(),
            args,
            arg_types,
        }
    }
}

/// Rows returned by a driver, with one declared type per column.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSet {
    pub column_names: Vec<String>,
    pub column_types: Vec<ColumnType>,
    pub rows: Vec<Vec<QueryValue>>,
    pub last_insert_id: Option<String>,
}

impl ResultSet {
    pub fn new(column_names: Vec<String>, column_types: Vec<ColumnType>, rows: Vec<Vec<QueryValue>>) -> Self {
        Self {
            column_names,
            column_types,
            rows,
            last_insert_id: None,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.column_names.iter().position(|column| column == name)
    }

    /// The declared type of a column. Drivers that report fewer types than columns leave the
    /// remaining ones untyped.
    pub fn column_type(&self, idx: usize) -> Option<ColumnType> {
        self.column_types.get(idx).copied()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnType {
    /// TINYINT, SMALLINT, MEDIUMINT and INT on MySQL, INT2 and INT4 on PostgreSQL.
    Int32,

    /// BIGINT, usually string-encoded by drivers.
    Int64,
    Float,
    Double,

    /// DECIMAL and NUMERIC, string-encoded.
    Numeric,

    /// BOOLEAN. MySQL and SQLite return `0`/`1`.
    Boolean,
    Character,
    Text,

    /// e.g. `"2023-01-01"`
    Date,

    /// e.g. `"23:59:59"`
    Time,

    /// e.g. `"2023-01-01 23:59:59"` or an RFC 3339 timestamp.
    DateTime,
    Json,
    Enum,
    Bytes,
    Set,
    Uuid,

    /// A number of unknown precision, as returned for aggregates by some SQLite drivers.
    UnknownNumber,
}
