use super::{Filter, FilterValue};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOperator {
    And,
    Or,
    Not,
}

impl LogicalOperator {
    pub fn key(self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
            LogicalOperator::Not => "NOT",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "AND" => Some(LogicalOperator::And),
            "OR" => Some(LogicalOperator::Or),
            "NOT" => Some(LogicalOperator::Not),
            _ => None,
        }
    }
}

impl fmt::Display for LogicalOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

fn logical(op: LogicalOperator, filters: Vec<Filter>) -> Filter {
    Filter::new().field(op.key(), FilterValue::Logical(op, filters))
}

pub fn and(filters: Vec<Filter>) -> Filter {
    logical(LogicalOperator::And, filters)
}

pub fn or(filters: Vec<Filter>) -> Filter {
    logical(LogicalOperator::Or, filters)
}

/// Negates `filter`, i.e. `{ NOT: filter }`.
pub fn none(filter: Filter) -> Filter {
    logical(LogicalOperator::Not, vec![filter])
}
