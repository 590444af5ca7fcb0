use crate::{
    CompileError, CompileResult,
    alias::SubqueryAliases,
    context::Context,
    fragment::{Fragment, ParamGroup},
};
use itertools::Itertools;
use query_structure::{
    Filter, FilterValue, LogicalOperator, QueryValue, RelationInfo, RelationQuantifier, ScalarOperator,
};

const ALWAYS_TRUE: &str = "1=1";
const ALWAYS_FALSE: &str = "1=0";

/// One occurrence of a model's table in a statement.
#[derive(Debug, Clone)]
pub(crate) struct TableRef {
    pub(crate) model: String,
    /// Alias, or the table name for unaliased occurrences.
    pub(crate) name: String,
    /// Whether own columns are written as `"name"."column"`.
    pub(crate) qualify: bool,
}

impl TableRef {
    pub(crate) fn unaliased(model: &str, ctx: &Context<'_>) -> Self {
        Self {
            model: model.to_owned(),
            name: ctx.table(model),
            qualify: false,
        }
    }

    pub(crate) fn aliased(model: &str, alias: impl Into<String>) -> Self {
        Self {
            model: model.to_owned(),
            name: alias.into(),
            qualify: true,
        }
    }

    /// A column of this table, as it is written inside this table's own scope.
    pub(crate) fn column(&self, field: &str, ctx: &Context<'_>) -> String {
        let column = ctx.column(&self.model, field);

        if self.qualify {
            ctx.dialect.qualified(&self.name, &column)
        } else {
            ctx.quote(&column)
        }
    }

    /// A column of this table as seen from a nested scope.
    pub(crate) fn qualified_column(&self, field: &str, ctx: &Context<'_>) -> String {
        ctx.dialect.qualified(&self.name, &ctx.column(&self.model, field))
    }
}

/// Turns filters into SQL conditions, binding every value into `group`.
pub(crate) struct FilterVisitor<'a> {
    ctx: Context<'a>,
    group: ParamGroup,
    /// Table names and aliases of the enclosing scopes.
    visible: Vec<String>,
    aliases: SubqueryAliases,
    depth: usize,
}

impl<'a> FilterVisitor<'a> {
    pub(crate) fn new(ctx: Context<'a>, group: ParamGroup) -> Self {
        Self {
            ctx,
            group,
            visible: Vec::new(),
            aliases: SubqueryAliases::default(),
            depth: 0,
        }
    }

    /// Marks `names` as already in scope, so subqueries never shadow them.
    pub(crate) fn with_visible<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            let name = name.into();
            self.aliases.reserve(name.clone());
            self.visible.push(name);
        }

        self
    }

    /// All conditions of `filter`, to be combined with `AND`.
    pub(crate) fn visit_filter(&mut self, filter: &Filter, table: &TableRef) -> CompileResult<Vec<Fragment>> {
        let mut conditions = Vec::with_capacity(filter.len());

        for (key, value) in filter.iter() {
            if let Some(op) = LogicalOperator::from_key(key) {
                conditions.extend(self.visit_logical(op, value, table)?);
                continue;
            }

            if value.is_logical() {
                return Err(CompileError::argument(format!(
                    "Field `{key}` of model `{}` holds a logical filter; AND, OR and NOT are only allowed as keys of their own.",
                    table.model
                )));
            }

            match self.ctx.registry.resolve_relation(&table.model, key) {
                Some(relation) => {
                    let Some((quantifier, nested)) = value.as_relation() else {
                        return Err(CompileError::argument(format!(
                            "Field `{key}` of model `{}` is a relation and must be filtered with a quantifier: use some(...), every(...) or none_match(...).",
                            table.model
                        )));
                    };

                    let relation = relation.clone();
                    conditions.push(self.visit_relation(key, &relation, quantifier, nested, table)?);
                }
                None if value.is_relation() => {
                    return Err(CompileError::argument(format!(
                        "Field `{key}` is not a registered relation of model `{}`; some, every and none only apply to relation fields.",
                        table.model
                    )));
                }
                None => conditions.extend(self.visit_scalar(key, value, table)?),
            }
        }

        Ok(conditions)
    }

    /// `filter` as one condition, `None` when it has no conditions at all.
    pub(crate) fn visit_condition(&mut self, filter: &Filter, table: &TableRef) -> CompileResult<Option<Fragment>> {
        let conditions = self.visit_filter(filter, table)?;

        Ok(match conditions.len() {
            0 => None,
            _ => Some(Fragment::join(conditions, " AND ")),
        })
    }

    fn visit_clause(&mut self, filter: &Filter, table: &TableRef) -> CompileResult<Fragment> {
        Ok(self
            .visit_condition(filter, table)?
            .unwrap_or_else(|| Fragment::sql(ALWAYS_TRUE)))
    }

    fn visit_logical(&mut self, key: LogicalOperator, value: &FilterValue, table: &TableRef) -> CompileResult<Vec<Fragment>> {
        let FilterValue::Logical(op, children) = value else {
            return Err(CompileError::argument(format!(
                "`{key}` expects a list of filters."
            )));
        };

        let clauses = children
            .iter()
            .map(|child| Ok(self.visit_clause(child, table)?.wrap("(", ")")))
            .collect::<CompileResult<Vec<_>>>()?;

        let condition = match op {
            LogicalOperator::And if clauses.is_empty() => Fragment::sql(ALWAYS_TRUE),
            LogicalOperator::Or if clauses.is_empty() => Fragment::sql(ALWAYS_FALSE),
            LogicalOperator::And => Fragment::join(clauses, " AND ").wrap("(", ")"),
            LogicalOperator::Or => Fragment::join(clauses, " OR ").wrap("(", ")"),
            LogicalOperator::Not => {
                return Ok(clauses.into_iter().map(|clause| clause.wrap("NOT ", "")).collect());
            }
        };

        Ok(vec![condition])
    }

    fn visit_scalar(&mut self, field: &str, value: &FilterValue, table: &TableRef) -> CompileResult<Vec<Fragment>> {
        let column = table.column(field, &self.ctx);

        match value {
            FilterValue::Literal(literal) => Ok(vec![self.equals(&column, literal)]),
            FilterValue::Comparison(map) => {
                let unknown = map
                    .keys()
                    .filter(|key| key.parse::<ScalarOperator>().is_err())
                    .cloned()
                    .collect_vec();

                if !unknown.is_empty() {
                    return Err(CompileError::UnknownOperators {
                        field: field.to_owned(),
                        operators: unknown,
                        supported: ScalarOperator::ALL.iter().map(|op| op.as_str()).join(", "),
                    });
                }

                map.iter()
                    .map(|(key, operand)| {
                        let op = key
                            .parse::<ScalarOperator>()
                            .map_err(|unknown| CompileError::argument(format!("Unknown operator `{unknown}`")))?;

                        self.comparison(field, &column, op, operand, table)
                    })
                    .collect()
            }
            FilterValue::Logical(..) | FilterValue::Relation(..) => Err(CompileError::argument(format!(
                "Field `{field}` of model `{}` expects a value or an operator map.",
                table.model
            ))),
        }
    }

    fn equals(&self, column: &str, value: &QueryValue) -> Fragment {
        match value {
            QueryValue::Null => Fragment::sql(format!("{column} IS NULL")),
            value => self.binary(column, "=", value.clone()),
        }
    }

    fn binary(&self, column: &str, operator: &str, value: QueryValue) -> Fragment {
        let mut fragment = Fragment::sql(format!("{column} {operator} "));
        fragment.push_param(self.group, value);
        fragment
    }

    fn comparison(
        &mut self,
        field: &str,
        column: &str,
        op: ScalarOperator,
        operand: &QueryValue,
        table: &TableRef,
    ) -> CompileResult<Fragment> {
        let fragment = match op {
            ScalarOperator::Equals => self.equals(column, operand),
            ScalarOperator::Not => match operand {
                QueryValue::Null => Fragment::sql(format!("{column} IS NOT NULL")),
                QueryValue::Object(nested) if nested.is_empty() => {
                    return Err(CompileError::argument(format!(
                        "`not` on field `{field}` expects a value or at least one operator, found an empty object."
                    )));
                }
                QueryValue::Object(nested) => {
                    let nested = nested
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect::<query_structure::ComparisonMap>();

                    let conditions = self.visit_scalar(field, &FilterValue::Comparison(nested), table)?;
                    Fragment::join(conditions, " AND ").wrap("NOT (", ")")
                }
                value => self.binary(column, "<>", value.clone()),
            },
            ScalarOperator::In | ScalarOperator::NotIn => {
                let values = match operand {
                    QueryValue::List(values) => values.clone(),
                    single => vec![single.clone()],
                };

                match (op, values.is_empty()) {
                    (ScalarOperator::In, true) => Fragment::sql(ALWAYS_FALSE),
                    (_, true) => Fragment::sql(ALWAYS_TRUE),
                    (op, false) => {
                        let keyword = if op == ScalarOperator::In { "IN" } else { "NOT IN" };
                        let placeholders = values
                            .into_iter()
                            .map(|value| Fragment::param(self.group, value));

                        Fragment::join(placeholders, ",").wrap(&format!("{column} {keyword} ("), ")")
                    }
                }
            }
            ScalarOperator::Lt => self.binary(column, "<", operand.clone()),
            ScalarOperator::Lte => self.binary(column, "<=", operand.clone()),
            ScalarOperator::Gt => self.binary(column, ">", operand.clone()),
            ScalarOperator::Gte => self.binary(column, ">=", operand.clone()),
            op => {
                let text = match operand {
                    QueryValue::String(s) => s.clone(),
                    QueryValue::Null | QueryValue::List(_) | QueryValue::Object(_) => {
                        return Err(CompileError::argument(format!(
                            "`{op}` on field `{field}` expects a string, found {}.",
                            operand.type_name()
                        )));
                    }
                    other => other.to_string(),
                };

                let keyword = if op.is_insensitive() && self.ctx.dialect.has(crate::Capability::InsensitiveLike) {
                    "ILIKE"
                } else {
                    "LIKE"
                };

                self.binary(column, keyword, QueryValue::String(op.like_pattern(&text)))
            }
        };

        Ok(fragment)
    }

    /// `[NOT] EXISTS (SELECT 1 FROM <related> WHERE <correlation> AND <nested>)`
    fn visit_relation(
        &mut self,
        field: &str,
        relation: &RelationInfo,
        quantifier: RelationQuantifier,
        nested: &Filter,
        parent: &TableRef,
    ) -> CompileResult<Fragment> {
        let ctx = self.ctx;
        ctx.check_model(&relation.target_model)?;

        let target_table = ctx.table(&relation.target_model);

        let (from, target, correlation) = if relation.is_many_to_many() {
            let junction_table = relation.junction_table().ok_or_else(|| {
                CompileError::argument(format!(
                    "Many-to-many relation `{field}` of model `{}` has no join table.",
                    parent.model
                ))
            })?;

            let alias = self.aliases.allocate(&format!("sub_{field}"));
            let target = TableRef::aliased(&relation.target_model, alias.clone());

            let (junction_from, junction_name) = if self.visible.iter().any(|name| name == junction_table) {
                let junction_alias = self.aliases.allocate(&format!("sub_{field}_join"));
                (
                    format!("{} AS {}", ctx.quote(junction_table), ctx.quote(&junction_alias)),
                    junction_alias,
                )
            } else {
                (ctx.quote(junction_table), junction_table.to_owned())
            };

            let from = format!(
                "{junction_from} INNER JOIN {} AS {} ON {} = {}",
                ctx.quote(&target_table),
                ctx.quote(&alias),
                ctx.dialect.qualified(&alias, ctx.registry.id_column(&relation.target_model)),
                ctx.dialect.qualified(&junction_name, relation.inverse_join_column(&parent.model)),
            );

            let correlation = format!(
                "{} = {}",
                ctx.dialect.qualified(&junction_name, relation.join_column(&parent.model)),
                ctx.dialect.qualified(&parent.name, ctx.registry.id_column(&parent.model)),
            );

            (from, target, correlation)
        } else {
            let needs_alias = self.depth > 0 || self.visible.iter().any(|name| *name == target_table);

            let (from, target) = if needs_alias {
                let alias = self.aliases.allocate(&format!("sub_{field}"));
                let from = format!("{} AS {}", ctx.quote(&target_table), ctx.quote(&alias));
                (from, TableRef::aliased(&relation.target_model, alias))
            } else {
                self.aliases.reserve(target_table.clone());
                (ctx.quote(&target_table), TableRef::unaliased(&relation.target_model, &ctx))
            };

            let correlation = if ctx.registry.holds_foreign_key(&parent.model, relation) {
                format!(
                    "{} = {}",
                    target.column(&relation.references, &ctx),
                    parent.qualified_column(&relation.foreign_key, &ctx)
                )
            } else {
                format!(
                    "{} = {}",
                    target.column(&relation.foreign_key, &ctx),
                    parent.qualified_column(&relation.references, &ctx)
                )
            };

            (from, target, correlation)
        };

        self.visible.push(target.name.clone());
        self.depth += 1;
        let nested_conditions = self.visit_filter(nested, &target);
        self.depth -= 1;
        self.visible.pop();
        let nested_conditions = nested_conditions?;

        let mut subquery = Fragment::sql(format!("SELECT 1 FROM {from} WHERE {correlation}"));

        match quantifier {
            RelationQuantifier::Every => {
                let nested = match nested_conditions.is_empty() {
                    true => Fragment::sql(ALWAYS_TRUE),
                    false => Fragment::join(nested_conditions, " AND "),
                };

                subquery.push_str(" AND ");
                subquery.append(nested.wrap("NOT (", ")"));
            }
            RelationQuantifier::Some | RelationQuantifier::None => {
                for condition in nested_conditions {
                    subquery.push_str(" AND ");
                    subquery.append(condition);
                }
            }
        }

        let exists = match quantifier {
            RelationQuantifier::Some => "EXISTS (",
            RelationQuantifier::Every | RelationQuantifier::None => "NOT EXISTS (",
        };

        Ok(subquery.wrap(exists, ")"))
    }
}
