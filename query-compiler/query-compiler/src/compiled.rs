use query_value::{ArgType, QueryValue};
use serde::Serialize;

/// A statement ready to be handed to an adapter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledQuery {
    pub sql: String,
    pub args: Vec<QueryValue>,
    pub arg_types: Vec<ArgType>,
    /// Whether the statement produces a result set: reads, and writes ending in `RETURNING *`.
    pub returns_rows: bool,
    /// Aliases of computed-field columns, which belong to the base row.
    pub computed_field_names: Vec<String>,
    /// Joined relations, in alias order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<IncludeInfo>,
}

impl CompiledQuery {
    pub(crate) fn new(sql: String, args: Vec<QueryValue>) -> Self {
        let arg_types = args.iter().map(ArgType::of).collect();

        Self {
            sql,
            args,
            arg_types,
            returns_rows: false,
            computed_field_names: Vec::new(),
            includes: Vec::new(),
        }
    }

    /// Counts `$n` and `?` placeholders outside of quoted identifiers and string literals.
    pub fn placeholder_count(&self) -> usize {
        let mut count = 0;
        let mut quote: Option<char> = None;
        let mut chars = self.sql.chars().peekable();

        while let Some(c) = chars.next() {
            match (quote, c) {
                (Some(open), c) if c == open => quote = None,
                (Some(_), _) => (),
                (None, '"' | '`' | '\'') => quote = Some(c),
                (None, '?') => count += 1,
                (None, '$') if chars.peek().is_some_and(char::is_ascii_digit) => {
                    count += 1;
                    while chars.peek().is_some_and(char::is_ascii_digit) {
                        chars.next();
                    }
                }
                _ => (),
            }
        }

        count
    }
}

/// A relation joined into a read, as needed to fold flat rows back into nested records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncludeInfo {
    /// Relation field name on the parent model.
    pub relation: String,
    pub alias: String,
    /// `t0` for relations of the base model.
    pub parent_alias: String,
    pub is_list: bool,
    /// Projected columns, each selected as `<alias>__<column>`. `None` when the joined model is
    /// unknown and its columns were selected with `<alias>.*`.
    pub columns: Option<Vec<String>>,
}

impl IncludeInfo {
    pub fn column_alias(&self, column: &str) -> String {
        column_alias(&self.alias, column)
    }
}

pub(crate) fn column_alias(alias: &str, column: &str) -> String {
    format!("{alias}__{column}")
}

/// A write plus the junction-table statements its relation writes turned into.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledMutation {
    pub main_query: CompiledQuery,
    /// Each statement binds the id of the written row as its first argument.
    pub relation_mutations: Vec<CompiledQuery>,
    /// Set when the created row's id is generated by the database. The relation mutations then
    /// bind `Null` in its place until [`CompiledMutation::bind_generated_id`] fills it in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_id: Option<GeneratedId>,
}

impl CompiledMutation {
    pub(crate) fn new(main_query: CompiledQuery) -> Self {
        Self {
            main_query,
            relation_mutations: Vec::new(),
            generated_id: None,
        }
    }

    /// The relation mutations with `id` bound as the id of the created row.
    pub fn bind_generated_id(&self, id: &QueryValue) -> Vec<CompiledQuery> {
        self.relation_mutations
            .iter()
            .cloned()
            .map(|mut statement| {
                if let (Some(arg), Some(arg_type)) = (statement.args.first_mut(), statement.arg_types.first_mut()) {
                    *arg = id.clone();
                    *arg_type = ArgType::of(id);
                }
                statement
            })
            .collect()
    }
}

/// Where the database-generated id of a created row is found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedId {
    /// Column of the id in the rows returned by the main statement.
    pub column: String,
}
