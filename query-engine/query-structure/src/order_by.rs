use crate::{QueryStructureError, Result, filter::json::json_kind};
use serde_json::Value;
use std::fmt;

#[derive(Clone, Copy, PartialEq, Debug, Eq, Hash)]
pub enum SortOrder {
    Ascending,
    Descending,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "asc" | "ASC" => Some(SortOrder::Ascending),
            "desc" | "DESC" => Some(SortOrder::Descending),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Debug, Eq, Hash)]
pub enum NullsOrder {
    First,
    Last,
}

impl NullsOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            NullsOrder::First => "NULLS FIRST",
            NullsOrder::Last => "NULLS LAST",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OrderBy {
    pub field: String,
    pub sort_order: SortOrder,
    pub nulls_order: Option<NullsOrder>,
}

impl OrderBy {
    pub fn new(field: impl Into<String>, sort_order: SortOrder) -> Self {
        Self {
            field: field.into(),
            sort_order,
            nulls_order: None,
        }
    }

    pub fn asc(field: impl Into<String>) -> Self {
        Self::new(field, SortOrder::Ascending)
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self::new(field, SortOrder::Descending)
    }

    pub fn nulls(mut self, nulls_order: NullsOrder) -> Self {
        self.nulls_order = Some(nulls_order);
        self
    }

    /// Reads `{ field: "asc" }`, `{ field: { sort: "desc", nulls: "last" } }` or a list of those.
    pub fn from_json(value: Value) -> Result<Vec<OrderBy>> {
        match value {
            Value::Null => Ok(Vec::new()),
            Value::Array(items) => {
                let mut order_by = Vec::with_capacity(items.len());

                for item in items {
                    order_by.extend(Self::from_json(item)?);
                }

                Ok(order_by)
            }
            Value::Object(obj) => obj
                .into_iter()
                .map(|(field, direction)| parse_direction(field, direction))
                .collect(),
            other => Err(QueryStructureError::invalid_argument(
                "orderBy",
                format!("expected an object or a list, found {}", json_kind(&other)),
            )),
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.sort_order.as_sql())?;

        if let Some(nulls) = self.nulls_order {
            write!(f, " {}", nulls.as_sql())?;
        }

        Ok(())
    }
}

fn parse_direction(field: String, direction: Value) -> Result<OrderBy> {
    let invalid = |found: &str| {
        QueryStructureError::invalid_argument(
            "orderBy",
            format!("invalid sort direction `{found}` for `{field}`, expected `asc` or `desc`"),
        )
    };

    match direction {
        Value::String(s) => {
            let sort_order = SortOrder::parse(&s).ok_or_else(|| invalid(&s))?;
            Ok(OrderBy::new(field.clone(), sort_order))
        }
        Value::Object(mut obj) => {
            let sort = match obj.remove("sort") {
                Some(Value::String(s)) => SortOrder::parse(&s).ok_or_else(|| invalid(&s))?,
                Some(other) => return Err(invalid(&other.to_string())),
                None => SortOrder::Ascending,
            };

            let nulls = match obj.remove("nulls") {
                Some(Value::String(s)) if s.eq_ignore_ascii_case("first") => Some(NullsOrder::First),
                Some(Value::String(s)) if s.eq_ignore_ascii_case("last") => Some(NullsOrder::Last),
                None | Some(Value::Null) => None,
                Some(other) => {
                    return Err(QueryStructureError::invalid_argument(
                        "orderBy",
                        format!("invalid nulls order {other} for `{field}`, expected `first` or `last`"),
                    ));
                }
            };

            Ok(OrderBy {
                field: field.clone(),
                sort_order: sort,
                nulls_order: nulls,
            })
        }
        other => Err(invalid(&other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn bare_directions_and_objects() {
        let order_by = OrderBy::from_json(json!([
            { "createdAt": "desc" },
            { "name": { "sort": "asc", "nulls": "last" } }
        ]))
        .unwrap();

        assert_eq!(
            order_by,
            vec![
                OrderBy::desc("createdAt"),
                OrderBy::asc("name").nulls(NullsOrder::Last)
            ]
        );
    }

    #[test]
    fn invalid_direction_is_rejected() {
        let err = OrderBy::from_json(json!({ "name": "up" })).unwrap_err();

        assert_eq!(
            err.to_string(),
            "Invalid `orderBy` argument: invalid sort direction `up` for `name`, expected `asc` or `desc`"
        );
    }
}
