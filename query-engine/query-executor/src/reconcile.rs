//! Folds the flat rows of a joined read back into nested records.

use crate::{Record, deserialize::normalize_column_name};
use driver_adapters::ResultSet;
use indexmap::IndexMap;
use query_compiler::{CompiledQuery, IncludeInfo};
use query_value::QueryValue;

const BASE_ALIAS: &str = "t0";

/// Where the columns of one table occurrence sit in a row.
struct Layout<'a> {
    include: Option<&'a IncludeInfo>,
    /// `(column index, record key)`
    columns: Vec<(usize, String)>,
}

/// One distinct row of a table occurrence and the related rows joined to it.
struct Node {
    key: Vec<QueryValue>,
    children: IndexMap<String, Vec<Node>>,
}

impl Node {
    fn new(key: Vec<QueryValue>) -> Self {
        Self {
            key,
            children: IndexMap::new(),
        }
    }
}

pub(crate) fn into_records(result: ResultSet, compiled: &CompiledQuery) -> Vec<Record> {
    let layouts = layouts(&result, compiled);

    if compiled.includes.is_empty() {
        let base = &layouts[BASE_ALIAS];
        return result.rows.into_iter().map(|row| record(base, &row)).collect();
    }

    let mut roots: Vec<Node> = Vec::new();

    for row in &result.rows {
        let key = values(&layouts[BASE_ALIAS], row);

        let idx = match roots.iter().position(|node| node.key == key) {
            Some(idx) => idx,
            None => {
                roots.push(Node::new(key));
                roots.len() - 1
            }
        };

        merge_row(&mut roots[idx], BASE_ALIAS, row, &layouts);
    }

    roots.iter().map(|node| build(node, BASE_ALIAS, &layouts)).collect()
}

/// Splits columns between the base table and the includes. Include columns are selected as
/// `<alias>__<column>`, everything else belongs to the base row.
fn layouts<'a>(result: &ResultSet, compiled: &'a CompiledQuery) -> IndexMap<String, Layout<'a>> {
    let mut layouts = IndexMap::new();
    layouts.insert(
        BASE_ALIAS.to_owned(),
        Layout {
            include: None,
            columns: Vec::new(),
        },
    );

    for include in &compiled.includes {
        if include.columns.is_none() {
            tracing::warn!(
                relation = %include.relation,
                alias = %include.alias,
                "joined columns were selected without aliases and cannot be nested"
            );
        }

        layouts.insert(
            include.alias.clone(),
            Layout {
                include: Some(include),
                columns: Vec::new(),
            },
        );
    }

    for (idx, name) in result.column_names.iter().enumerate() {
        let owner = compiled.includes.iter().find_map(|include| {
            let column = name.strip_prefix(include.alias.as_str())?.strip_prefix("__")?;
            Some((include.alias.as_str(), column))
        });

        let (alias, key) = match owner {
            Some((alias, column)) => (alias, normalize_column_name(column)),
            None if compiled.computed_field_names.contains(name) => (BASE_ALIAS, name.clone()),
            None => (BASE_ALIAS, normalize_column_name(name)),
        };

        if let Some(layout) = layouts.get_mut(alias) {
            layout.columns.push((idx, key));
        }
    }

    layouts
}

fn values(layout: &Layout<'_>, row: &[QueryValue]) -> Vec<QueryValue> {
    layout
        .columns
        .iter()
        .map(|(idx, _)| row.get(*idx).cloned().unwrap_or(QueryValue::Null))
        .collect()
}

fn record(layout: &Layout<'_>, row: &[QueryValue]) -> Record {
    layout
        .columns
        .iter()
        .map(|(idx, key)| (key.clone(), row.get(*idx).cloned().unwrap_or(QueryValue::Null)))
        .collect()
}

fn children<'l, 'a>(
    alias: &'l str,
    layouts: &'l IndexMap<String, Layout<'a>>,
) -> impl Iterator<Item = (&'l str, &'l Layout<'a>)> + 'l {
    layouts.iter().filter_map(move |(child_alias, layout)| {
        let include = layout.include?;
        (include.parent_alias == alias && include.columns.is_some()).then_some((child_alias.as_str(), layout))
    })
}

fn merge_row(node: &mut Node, alias: &str, row: &[QueryValue], layouts: &IndexMap<String, Layout<'_>>) {
    for (child_alias, layout) in children(alias, layouts) {
        let key = values(layout, row);

        // No match on the LEFT JOIN.
        if key.iter().all(QueryValue::is_null) {
            continue;
        }

        let nodes = node.children.entry(child_alias.to_owned()).or_default();

        let idx = match nodes.iter().position(|child| child.key == key) {
            Some(idx) => idx,
            None => {
                nodes.push(Node::new(key));
                nodes.len() - 1
            }
        };

        merge_row(&mut nodes[idx], child_alias, row, layouts);
    }
}

fn build(node: &Node, alias: &str, layouts: &IndexMap<String, Layout<'_>>) -> Record {
    let mut record: Record = layouts[alias]
        .columns
        .iter()
        .zip(&node.key)
        .map(|((_, key), value)| (key.clone(), value.clone()))
        .collect();

    for (child_alias, layout) in children(alias, layouts) {
        let Some(include) = layout.include else { continue };

        let related = node
            .children
            .get(child_alias)
            .map(|nodes| {
                nodes
                    .iter()
                    .map(|child| QueryValue::Object(build(child, child_alias, layouts)))
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let value = if include.is_list {
            QueryValue::List(related)
        } else {
            related.into_iter().next().unwrap_or(QueryValue::Null)
        };

        record.insert(include.relation.clone(), value);
    }

    record
}
