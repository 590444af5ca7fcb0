use crate::QueryValue;
use serde::Serialize;
use std::fmt;

/// How a positional argument should be bound by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ArgType {
    Int32,
    Int64,
    Double,
    Text,
    Boolean,
    DateTime,
    Json,
    Bytes,
    Array,
    Object,
    /// A `NULL` argument; the driver decides the type from the statement.
    Unknown,
}

impl ArgType {
    pub fn of(value: &QueryValue) -> Self {
        match value {
            QueryValue::Null => ArgType::Unknown,
            QueryValue::Boolean(_) => ArgType::Boolean,
            QueryValue::Int(i) if i32::try_from(*i).is_ok() => ArgType::Int32,
            QueryValue::Int(_) => ArgType::Int64,
            QueryValue::Float(_) => ArgType::Double,
            QueryValue::String(_) => ArgType::Text,
            QueryValue::DateTime(_) => ArgType::DateTime,
            QueryValue::Json(_) => ArgType::Json,
            QueryValue::Bytes(_) => ArgType::Bytes,
            QueryValue::List(_) => ArgType::Array,
            QueryValue::Object(_) => ArgType::Object,
        }
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArgType::Int32 => "Int32",
            ArgType::Int64 => "Int64",
            ArgType::Double => "Double",
            ArgType::Text => "Text",
            ArgType::Boolean => "Boolean",
            ArgType::DateTime => "DateTime",
            ArgType::Json => "Json",
            ArgType::Bytes => "Bytes",
            ArgType::Array => "Array",
            ArgType::Object => "Object",
            ArgType::Unknown => "Unknown",
        };

        write!(f, "{s}")
    }
}
