use crate::{OrderBy, QueryStructureError, Result, filter::json::json_kind};
use indexmap::IndexMap;
use query_value::QueryValue;
use serde_json::Value;
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComputedOp {
    Min,
    Max,
    Avg,
    Sum,
    Count,
    /// The column of the first row in `orderBy` order.
    First,
}

impl ComputedOp {
    pub fn as_str(self) -> &'static str {
        match self {
            ComputedOp::Min => "min",
            ComputedOp::Max => "max",
            ComputedOp::Avg => "avg",
            ComputedOp::Sum => "sum",
            ComputedOp::Count => "count",
            ComputedOp::First => "first",
        }
    }

    /// The SQL aggregate function, `None` for [`ComputedOp::First`].
    pub fn sql_function(self) -> Option<&'static str> {
        match self {
            ComputedOp::Min => Some("MIN"),
            ComputedOp::Max => Some("MAX"),
            ComputedOp::Avg => Some("AVG"),
            ComputedOp::Sum => Some("SUM"),
            ComputedOp::Count => Some("COUNT"),
            ComputedOp::First => None,
        }
    }
}

impl fmt::Display for ComputedOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComputedOp {
    type Err = QueryStructureError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "min" => Ok(ComputedOp::Min),
            "max" => Ok(ComputedOp::Max),
            "avg" => Ok(ComputedOp::Avg),
            "sum" => Ok(ComputedOp::Sum),
            "count" => Ok(ComputedOp::Count),
            "first" => Ok(ComputedOp::First),
            other => Err(QueryStructureError::invalid_argument(
                "computed",
                format!("unknown operation `{other}`, expected one of min, max, avg, sum, count, first"),
            )),
        }
    }
}

/// Right-hand side of a correlation condition.
#[derive(Debug, Clone, PartialEq)]
pub enum CorrelationValue {
    /// A column of the base row.
    FieldRef(String),
    /// A static value, always bound as an argument.
    Value(QueryValue),
}

impl CorrelationValue {
    pub fn field_ref(column: impl Into<String>) -> Self {
        CorrelationValue::FieldRef(column.into())
    }
}

macro_rules! static_correlation_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for CorrelationValue {
                fn from(value: $t) -> Self {
                    CorrelationValue::Value(QueryValue::from(value))
                }
            }
        )*
    };
}

static_correlation_value!(QueryValue, &str, String, bool, i32, i64, f64);

/// A scalar correlated subquery projected next to the base columns.
#[derive(Debug, Clone, PartialEq)]
pub struct ComputedField {
    pub op: ComputedOp,
    pub column: Option<String>,
    pub from_table: String,
    pub correlating_where: IndexMap<String, CorrelationValue>,
    pub order_by: Vec<OrderBy>,
}

impl ComputedField {
    pub fn new(op: ComputedOp, from_table: impl Into<String>) -> Self {
        Self {
            op,
            column: None,
            from_table: from_table.into(),
            correlating_where: IndexMap::new(),
            order_by: Vec::new(),
        }
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn correlate(mut self, column: impl Into<String>, value: impl Into<CorrelationValue>) -> Self {
        self.correlating_where.insert(column.into(), value.into());
        self
    }

    pub fn order_by(mut self, order_by: OrderBy) -> Self {
        self.order_by.push(order_by);
        self
    }

    /// Reads `{ op, column?, fromTable, correlatingWhere, orderBy? }`, where a correlation value of
    /// the shape `{ "fieldRef": "id" }` points at a base column.
    pub fn from_json(alias: &str, value: Value) -> Result<Self> {
        let argument = format!("computed.{alias}");

        let Value::Object(mut obj) = value else {
            return Err(QueryStructureError::invalid_argument(argument, "expected an object"));
        };

        let op = match obj.remove("op") {
            Some(Value::String(op)) => op.parse::<ComputedOp>()?,
            _ => return Err(QueryStructureError::invalid_argument(argument, "`op` is required")),
        };

        let from_table = match obj.remove("fromTable") {
            Some(Value::String(table)) => table,
            _ => return Err(QueryStructureError::invalid_argument(argument, "`fromTable` is required")),
        };

        let mut field = ComputedField::new(op, from_table);

        match obj.remove("column") {
            Some(Value::String(column)) => field.column = Some(column),
            None | Some(Value::Null) => (),
            Some(other) => {
                return Err(QueryStructureError::invalid_argument(
                    argument,
                    format!("`column` must be a string, found {}", json_kind(&other)),
                ));
            }
        }

        if let Some(correlating) = obj.remove("correlatingWhere") {
            let Value::Object(correlating) = correlating else {
                return Err(QueryStructureError::invalid_argument(
                    argument,
                    "`correlatingWhere` must be an object",
                ));
            };

            for (column, value) in correlating {
                let value = match value {
                    Value::Object(mut reference) if reference.len() == 1 && reference.contains_key("fieldRef") => {
                        match reference.remove("fieldRef") {
                            Some(Value::String(base_column)) => CorrelationValue::FieldRef(base_column),
                            _ => {
                                return Err(QueryStructureError::invalid_argument(
                                    argument,
                                    "`fieldRef` must name a column",
                                ));
                            }
                        }
                    }
                    other => CorrelationValue::Value(QueryValue::from(other)),
                };

                field.correlating_where.insert(column, value);
            }
        }

        if let Some(order_by) = obj.remove("orderBy") {
            field.order_by = OrderBy::from_json(order_by)?;
        }

        if field.op == ComputedOp::First && field.column.is_none() {
            return Err(QueryStructureError::invalid_argument(
                argument,
                "`first` needs a `column` to project",
            ));
        }

        Ok(field)
    }
}
