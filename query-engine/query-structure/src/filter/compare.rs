use super::{ComparisonMap, FilterValue};
use query_value::QueryValue;
use std::{fmt, str::FromStr};

/// The comparison keys understood on scalar fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarOperator {
    Equals,
    Not,
    In,
    NotIn,
    Lt,
    Lte,
    Gt,
    Gte,
    Contains,
    StartsWith,
    EndsWith,
    ContainsInsensitive,
    StartsWithInsensitive,
    EndsWithInsensitive,
}

impl ScalarOperator {
    pub const ALL: [ScalarOperator; 14] = [
        Self::Equals,
        Self::Not,
        Self::In,
        Self::NotIn,
        Self::Lt,
        Self::Lte,
        Self::Gt,
        Self::Gte,
        Self::Contains,
        Self::StartsWith,
        Self::EndsWith,
        Self::ContainsInsensitive,
        Self::StartsWithInsensitive,
        Self::EndsWithInsensitive,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Equals => "equals",
            Self::Not => "not",
            Self::In => "in",
            Self::NotIn => "notIn",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Contains => "contains",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
            Self::ContainsInsensitive => "containsInsensitive",
            Self::StartsWithInsensitive => "startsWithInsensitive",
            Self::EndsWithInsensitive => "endsWithInsensitive",
        }
    }

    pub fn is_insensitive(self) -> bool {
        matches!(
            self,
            Self::ContainsInsensitive | Self::StartsWithInsensitive | Self::EndsWithInsensitive
        )
    }

    /// Wraps a pattern operand in `%` wildcards according to the operator.
    pub fn like_pattern(self, operand: &str) -> String {
        match self {
            Self::Contains | Self::ContainsInsensitive => format!("%{operand}%"),
            Self::StartsWith | Self::StartsWithInsensitive => format!("{operand}%"),
            Self::EndsWith | Self::EndsWithInsensitive => format!("%{operand}"),
            _ => operand.to_owned(),
        }
    }
}

impl fmt::Display for ScalarOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScalarOperator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| s.to_owned())
    }
}

fn comparison(op: ScalarOperator, value: QueryValue) -> FilterValue {
    let mut map = ComparisonMap::new();
    map.insert(op.as_str().to_owned(), value);

    FilterValue::Comparison(map)
}

pub fn equals(value: impl Into<QueryValue>) -> FilterValue {
    comparison(ScalarOperator::Equals, value.into())
}

pub fn not(value: impl Into<QueryValue>) -> FilterValue {
    comparison(ScalarOperator::Not, value.into())
}

pub fn in_<I, T>(values: I) -> FilterValue
where
    I: IntoIterator<Item = T>,
    T: Into<QueryValue>,
{
    comparison(
        ScalarOperator::In,
        QueryValue::List(values.into_iter().map(Into::into).collect()),
    )
}

pub fn not_in<I, T>(values: I) -> FilterValue
where
    I: IntoIterator<Item = T>,
    T: Into<QueryValue>,
{
    comparison(
        ScalarOperator::NotIn,
        QueryValue::List(values.into_iter().map(Into::into).collect()),
    )
}

pub fn lt(value: impl Into<QueryValue>) -> FilterValue {
    comparison(ScalarOperator::Lt, value.into())
}

pub fn lte(value: impl Into<QueryValue>) -> FilterValue {
    comparison(ScalarOperator::Lte, value.into())
}

pub fn gt(value: impl Into<QueryValue>) -> FilterValue {
    comparison(ScalarOperator::Gt, value.into())
}

pub fn gte(value: impl Into<QueryValue>) -> FilterValue {
    comparison(ScalarOperator::Gte, value.into())
}

pub fn contains(value: impl Into<QueryValue>) -> FilterValue {
    comparison(ScalarOperator::Contains, value.into())
}

pub fn starts_with(value: impl Into<QueryValue>) -> FilterValue {
    comparison(ScalarOperator::StartsWith, value.into())
}

pub fn ends_with(value: impl Into<QueryValue>) -> FilterValue {
    comparison(ScalarOperator::EndsWith, value.into())
}

pub fn contains_insensitive(value: impl Into<QueryValue>) -> FilterValue {
    comparison(ScalarOperator::ContainsInsensitive, value.into())
}

pub fn starts_with_insensitive(value: impl Into<QueryValue>) -> FilterValue {
    comparison(ScalarOperator::StartsWithInsensitive, value.into())
}

pub fn ends_with_insensitive(value: impl Into<QueryValue>) -> FilterValue {
    comparison(ScalarOperator::EndsWithInsensitive, value.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn operator_keys_round_trip() {
        for op in ScalarOperator::ALL {
            assert_eq!(op.as_str().parse::<ScalarOperator>(), Ok(op));
        }

        assert_eq!("like".parse::<ScalarOperator>(), Err("like".to_owned()));
    }

    #[test]
    fn constructors_are_pure() {
        assert_eq!(gte(4), gte(4));
        assert_eq!(in_(["a", "b"]), in_(vec!["a".to_owned(), "b".to_owned()]));
    }

    #[test]
    fn list_constructors_wrap_values_in_a_list() {
        let value = not_in([1, 2]);
        let map = value.as_comparison().unwrap();

        assert_eq!(
            map.get("notIn"),
            Some(&QueryValue::List(vec![QueryValue::Int(1), QueryValue::Int(2)]))
        );
    }

    #[test]
    fn like_patterns() {
        assert_eq!(ScalarOperator::Contains.like_pattern("ab"), "%ab%");
        assert_eq!(ScalarOperator::StartsWithInsensitive.like_pattern("ab"), "ab%");
        assert_eq!(ScalarOperator::EndsWith.like_pattern("ab"), "%ab");
    }
}
