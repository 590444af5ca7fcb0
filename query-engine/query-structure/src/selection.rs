use crate::{QueryArguments, QueryStructureError, Result, filter::json::json_kind};
use indexmap::IndexMap;
use serde_json::Value;

const SCALARS_KEY: &str = "$scalars";
const COMPOSITES_KEY: &str = "$composites";

/// Which fields to return. A nested entry on a relation field asks for the related rows to be
/// joined in (an include), optionally restricted by its own selection.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub scalars: bool,
    pub composites: bool,
    pub fields: IndexMap<String, SelectedField>,
}

impl Default for Selection {
    fn default() -> Self {
        Self {
            scalars: true,
            composites: true,
            fields: IndexMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectedField {
    Scalar(bool),
    Nested(Box<NestedSelection>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NestedSelection {
    pub arguments: QueryArguments,
    pub selection: Selection,
}

impl Selection {
    /// Only the explicitly listed fields.
    pub fn explicit() -> Self {
        Self {
            scalars: false,
            composites: false,
            fields: IndexMap::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>) -> Self {
        self.fields.insert(name.into(), SelectedField::Scalar(true));
        self
    }

    pub fn include(mut self, relation: impl Into<String>, arguments: QueryArguments, selection: Selection) -> Self {
        self.fields.insert(
            relation.into(),
            SelectedField::Nested(Box::new(NestedSelection { arguments, selection })),
        );
        self
    }

    /// Fields selected with `true`. On a relation field that is an include without arguments.
    pub fn flagged_fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().filter_map(|(name, field)| match field {
            SelectedField::Scalar(true) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn nested_fields(&self) -> impl Iterator<Item = (&str, &NestedSelection)> {
        self.fields.iter().filter_map(|(name, field)| match field {
            SelectedField::Nested(nested) => Some((name.as_str(), nested.as_ref())),
            SelectedField::Scalar(_) => None,
        })
    }

    pub fn from_json(value: Value) -> Result<Selection> {
        parse_selection(value, "selection")
    }
}

fn parse_selection(value: Value, path: &str) -> Result<Selection> {
    let obj = match value {
        Value::Null => return Ok(Selection::default()),
        Value::Object(obj) => obj,
        other => {
            return Err(QueryStructureError::invalid_argument(
                path,
                format!("expected an object, found {}", json_kind(&other)),
            ));
        }
    };

    let mut selection = Selection::explicit();

    for (key, value) in obj {
        if key == SCALARS_KEY || key == COMPOSITES_KEY {
            let Value::Bool(flag) = value else {
                return Err(QueryStructureError::invalid_argument(
                    format!("{path}.{key}"),
                    "expected a boolean",
                ));
            };

            if key == SCALARS_KEY {
                selection.scalars = flag;
            } else {
                selection.composites = flag;
            }

            continue;
        }

        match value {
            Value::Bool(flag) => {
                selection.fields.insert(key, SelectedField::Scalar(flag));
            }
            Value::Object(mut nested) => {
                let nested_path = format!("{path}.{key}");

                let arguments = match nested.remove("arguments") {
                    Some(arguments) => QueryArguments::from_json(arguments)?,
                    None => QueryArguments::default(),
                };

                let nested_selection = match nested.remove("selection") {
                    Some(selection) => parse_selection(selection, &format!("{nested_path}.selection"))?,
                    None => Selection::default(),
                };

                if let Some(unknown) = nested.keys().next() {
                    return Err(QueryStructureError::invalid_argument(
                        nested_path,
                        format!("unknown key `{unknown}`, expected `arguments` or `selection`"),
                    ));
                }

                selection.fields.insert(
                    key,
                    SelectedField::Nested(Box::new(NestedSelection {
                        arguments,
                        selection: nested_selection,
                    })),
                );
            }
            other => {
                return Err(QueryStructureError::invalid_argument(
                    format!("{path}.{key}"),
                    format!("expected a boolean or an object, found {}", json_kind(&other)),
                ));
            }
        }
    }

    Ok(selection)
}
