//! Conversion of driver values into engine values, driven by the declared column types.

use crate::{ExecutorError, Result};
use driver_adapters::{ColumnType, ResultSet};
use heck::ToLowerCamelCase;
use query_value::{QueryValue, parse_iso8601};

/// `created_at` becomes `createdAt`. Names without underscores, such as `authorId`, are kept as
/// they are, and so are leading underscores: `_count` stays `_count`, `_sum_total` becomes
/// `_sumTotal`.
pub fn normalize_column_name(name: &str) -> String {
    let rest = name.trim_start_matches('_');

    if !rest.contains('_') {
        return name.to_owned();
    }

    let prefix = &name[..name.len() - rest.len()];
    format!("{prefix}{}", rest.to_lower_camel_case())
}

/// Coerces every cell of `result` in place.
pub(crate) fn coerce_result_set(result: &mut ResultSet) -> Result<()> {
    let column_types = result.column_types.clone();

    for row in &mut result.rows {
        for (idx, cell) in row.iter_mut().enumerate() {
            let value = std::mem::replace(cell, QueryValue::Null);
            let column = result.column_names.get(idx).map_or("", String::as_str);

            *cell = coerce_value(column, column_types.get(idx).copied(), value)?;
        }
    }

    Ok(())
}

pub(crate) fn coerce_value(column: &str, column_type: Option<ColumnType>, value: QueryValue) -> Result<QueryValue> {
    let Some(column_type) = column_type else {
        return Ok(value);
    };

    match (column_type, value) {
        (ColumnType::DateTime | ColumnType::Date, QueryValue::String(s)) => parse_iso8601(&s)
            .map(QueryValue::DateTime)
            .ok_or_else(|| ExecutorError::conversion(column, format!("`{s}` is not an ISO 8601 date"))),

        // MySQL and SQLite store booleans as integers.
        (ColumnType::Boolean, QueryValue::Int(i)) => Ok(QueryValue::Boolean(i != 0)),

        (_, value) => Ok(value),
    }
}
