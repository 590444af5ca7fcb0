use super::{Filter, FilterValue};
use std::fmt;

/// Existential or universal semantics over the related rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationQuantifier {
    Some,
    Every,
    None,
}

impl RelationQuantifier {
    pub fn key(self) -> &'static str {
        match self {
            RelationQuantifier::Some => "some",
            RelationQuantifier::Every => "every",
            RelationQuantifier::None => "none",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "some" => Some(RelationQuantifier::Some),
            "every" => Some(RelationQuantifier::Every),
            "none" => Some(RelationQuantifier::None),
            _ => None,
        }
    }
}

impl fmt::Display for RelationQuantifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// At least one related row matches `filter`.
pub fn some(filter: Filter) -> FilterValue {
    FilterValue::Relation(RelationQuantifier::Some, Box::new(filter))
}

/// All related rows match `filter` (vacuously true without related rows).
pub fn every(filter: Filter) -> FilterValue {
    FilterValue::Relation(RelationQuantifier::Every, Box::new(filter))
}

/// No related row matches `filter`.
pub fn none_match(filter: Filter) -> FilterValue {
    FilterValue::Relation(RelationQuantifier::None, Box::new(filter))
}

/// There are no related rows at all.
pub fn is_empty() -> FilterValue {
    none_match(Filter::new())
}

/// There is at least one related row.
pub fn is_not_empty() -> FilterValue {
    some(Filter::new())
}
