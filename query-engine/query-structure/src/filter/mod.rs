//! Filters are ordered maps from a field name (or one of the logical keys `AND`, `OR`, `NOT`) to a
//! [`FilterValue`]. Sibling entries are implicitly combined with `AND`.
//!
//! The free functions in this module are pure constructors. They never validate anything: a
//! relation quantifier placed on a scalar field, or an unknown comparison key, is reported by
//! the compiler once the schema is known.

mod compare;
pub(crate) mod json;
mod logical;
mod relation;

pub use compare::*;
pub use logical::*;
pub use relation::*;

use indexmap::IndexMap;
use query_value::QueryValue;

/// Raw comparison operator keys to their operands, in insertion order.
///
/// Keys stay strings so that unknown operators survive construction and can be reported together.
pub type ComparisonMap = IndexMap<String, QueryValue>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter(IndexMap<String, FilterValue>);

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds (or replaces) the condition for `name`.
    pub fn field<T>(mut self, name: impl Into<String>, value: T) -> Self
    where
        T: Into<FilterValue>,
    {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Appends every entry of `other`. Entries of `other` win on key collisions.
    pub fn merge(mut self, other: Filter) -> Self {
        self.0.extend(other.0);
        self
    }

    pub fn get(&self, name: &str) -> Option<&FilterValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FilterValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, FilterValue)> for Filter {
    fn from_iter<I: IntoIterator<Item = (String, FilterValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Filter {
    type Item = (String, FilterValue);
    type IntoIter = indexmap::map::IntoIter<String, FilterValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// The right-hand side of a filter entry.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Bare value, compared with `=` (or `IS NULL` for null).
    Literal(QueryValue),

    /// `{ "gte": 4, "lt": 10 }`
    Comparison(ComparisonMap),

    /// Only valid under the `AND`, `OR` and `NOT` keys.
    Logical(LogicalOperator, Vec<Filter>),

    /// Only valid under a relation field.
    Relation(RelationQuantifier, Box<Filter>),
}

impl FilterValue {
    /// Combines two comparison maps, so that `gte(1).with(lt(5))` reads as `{gte: 1, lt: 5}`.
    ///
    /// Anything that is not a comparison map on either side is replaced by `other`.
    pub fn with(self, other: FilterValue) -> FilterValue {
        match (self, other) {
            (FilterValue::Comparison(mut left), FilterValue::Comparison(right)) => {
                left.extend(right);
                FilterValue::Comparison(left)
            }
            (_, other) => other,
        }
    }

    pub fn as_comparison(&self) -> Option<&ComparisonMap> {
        match self {
            FilterValue::Comparison(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_relation(&self) -> Option<(RelationQuantifier, &Filter)> {
        match self {
            FilterValue::Relation(quantifier, filter) => Some((*quantifier, filter)),
            _ => None,
        }
    }

    pub fn is_relation(&self) -> bool {
        matches!(self, FilterValue::Relation(..))
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, FilterValue::Logical(..))
    }
}

impl From<ComparisonMap> for FilterValue {
    fn from(map: ComparisonMap) -> Self {
        FilterValue::Comparison(map)
    }
}

macro_rules! literal_filter_value {
    ($($t:ty),* $(,)?) => {
        $(
            impl From<$t> for FilterValue {
                fn from(value: $t) -> Self {
                    FilterValue::Literal(QueryValue::from(value))
                }
            }
        )*
    };
}

literal_filter_value!(
    QueryValue,
    &str,
    String,
    bool,
    i32,
    i64,
    u32,
    f64,
    chrono::DateTime<chrono::FixedOffset>,
    chrono::DateTime<chrono::Utc>,
    Vec<u8>,
);
