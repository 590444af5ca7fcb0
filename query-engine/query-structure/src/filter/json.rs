use super::{ComparisonMap, Filter, FilterValue, LogicalOperator, RelationQuantifier};
use crate::{QueryStructureError, Result};
use query_value::QueryValue;
use serde_json::Value;

impl Filter {
    /// Reads a `where` object in the JSON protocol shape.
    ///
    /// `AND` and `OR` take a list of filters or a single filter object, `NOT` takes either. An object
    /// whose only key is `some`, `every` or `none` is a relation filter. Any other object is a
    /// comparison map and everything else is a literal.
    pub fn from_json(value: Value) -> Result<Filter> {
        parse_filter(value, "where")
    }
}

impl TryFrom<Value> for Filter {
    type Error = QueryStructureError;

    fn try_from(value: Value) -> Result<Self> {
        Filter::from_json(value)
    }
}

pub(crate) fn parse_filter(value: Value, path: &str) -> Result<Filter> {
    match value {
        Value::Null => Ok(Filter::new()),
        Value::Object(obj) => obj
            .into_iter()
            .map(|(key, value)| {
                let entry = parse_entry(&key, value, &format!("{path}.{key}"))?;
                Ok((key, entry))
            })
            .collect(),
        other => Err(QueryStructureError::invalid_filter(
            path,
            format!("expected an object, found {}", json_kind(&other)),
        )),
    }
}

fn parse_entry(key: &str, value: Value, path: &str) -> Result<FilterValue> {
    if let Some(op) = LogicalOperator::from_key(key) {
        let filters = match value {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(idx, item)| parse_filter(item, &format!("{path}[{idx}]")))
                .collect::<Result<Vec<_>>>()?,
            obj @ Value::Object(_) => vec![parse_filter(obj, path)?],
            other => {
                return Err(QueryStructureError::invalid_filter(
                    path,
                    format!("`{op}` expects a filter or a list of filters, found {}", json_kind(&other)),
                ));
            }
        };

        return Ok(FilterValue::Logical(op, filters));
    }

    match value {
        Value::Object(obj) => {
            let quantifiers = obj.keys().filter(|k| RelationQuantifier::from_key(k).is_some()).count();

            match (quantifiers, obj.len()) {
                (0, _) => Ok(FilterValue::Comparison(
                    obj.into_iter()
                        .map(|(k, v)| (k, QueryValue::from(v)))
                        .collect::<ComparisonMap>(),
                )),
                (1, 1) => {
                    let (quantifier_key, nested) = obj
                        .into_iter()
                        .next()
                        .ok_or_else(|| QueryStructureError::invalid_filter(path, "empty relation filter"))?;
                    let quantifier = RelationQuantifier::from_key(&quantifier_key)
                        .ok_or_else(|| QueryStructureError::invalid_filter(path, "unknown quantifier"))?;
                    let nested = parse_filter(nested, &format!("{path}.{quantifier_key}"))?;

                    Ok(FilterValue::Relation(quantifier, Box::new(nested)))
                }
                _ => Err(QueryStructureError::invalid_filter(
                    path,
                    "a relation filter takes exactly one of `some`, `every` or `none`",
                )),
            }
        }
        literal => Ok(FilterValue::Literal(QueryValue::from(literal))),
    }
}

pub(crate) fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
