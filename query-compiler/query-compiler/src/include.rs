use crate::{
    CompileError, CompileResult, IncludeInfo,
    alias::{Alias, AliasCounter},
    compiled::column_alias,
    context::Context,
    filter::{FilterVisitor, TableRef},
    fragment::{Fragment, ParamGroup},
};
use query_structure::{Filter, NestedSelection, RelationInfo, SelectedField, Selection};
use std::collections::VecDeque;

/// One `LEFT JOIN` brought in by an include.
#[derive(Debug, Clone)]
pub(crate) struct JoinPlan {
    pub(crate) alias: Alias,
    pub(crate) table: TableRef,
    pub(crate) parent: TableRef,
    pub(crate) relation: RelationInfo,
    pub(crate) filter: Option<Filter>,
    pub(crate) info: IncludeInfo,
}

/// Whether `selection` asks for any relation of `model`.
pub(crate) fn selects_relations(ctx: &Context<'_>, model: &str, selection: &Selection) -> bool {
    selection.fields.iter().any(|(name, field)| {
        !matches!(field, SelectedField::Scalar(false)) && ctx.registry.resolve_relation(model, name).is_some()
    })
}

/// Assigns aliases to every included relation, breadth-first across nesting levels.
pub(crate) fn plan_includes(
    ctx: &Context<'_>,
    base: &TableRef,
    selection: &Selection,
    counter: &mut AliasCounter,
) -> CompileResult<Vec<JoinPlan>> {
    let default_nested = NestedSelection::default();
    let mut plans = Vec::new();
    let mut queue: VecDeque<(TableRef, &Selection)> = VecDeque::from([(base.clone(), selection)]);

    while let Some((parent, selection)) = queue.pop_front() {
        for (name, field) in &selection.fields {
            let Some(relation) = ctx.registry.resolve_relation(&parent.model, name) else {
                continue;
            };

            let nested = match field {
                SelectedField::Scalar(false) => continue,
                SelectedField::Scalar(true) => &default_nested,
                SelectedField::Nested(nested) => nested.as_ref(),
            };

            ctx.check_model(&relation.target_model)?;

            if nested.arguments.take.is_some() || nested.arguments.skip.is_some() || !nested.arguments.order_by.is_empty() {
                tracing::debug!(relation = %name, "pagination and ordering of included relations are not applied to joins");
            }

            let alias = counter.next_alias();
            let table = TableRef::aliased(&relation.target_model, alias.to_string());

            let info = IncludeInfo {
                relation: name.clone(),
                alias: alias.to_string(),
                parent_alias: parent.name.clone(),
                is_list: relation.kind.is_list(),
                columns: projected_columns(ctx, &relation.target_model, &nested.selection),
            };

            plans.push(JoinPlan {
                alias,
                table: table.clone(),
                parent: parent.clone(),
                relation: relation.clone(),
                filter: nested.arguments.filter.clone(),
                info,
            });

            queue.push_back((table, &nested.selection));
        }
    }

    Ok(plans)
}

/// Explicitly selected scalars, else every known column of the model.
fn projected_columns(ctx: &Context<'_>, model: &str, selection: &Selection) -> Option<Vec<String>> {
    if !selection.scalars {
        let mut columns: Vec<String> = selection
            .flagged_fields()
            .filter(|field| ctx.registry.resolve_relation(model, field).is_none())
            .map(|field| ctx.column(model, field))
            .collect();

        if columns.is_empty() {
            columns.push(ctx.registry.id_column(model).to_owned());
        }

        return Some(columns);
    }

    ctx.registry
        .model(model)
        .filter(|m| !m.fields.is_empty())
        .map(|m| m.columns().map(ToOwned::to_owned).collect())
}

/// The select list entries of a joined relation.
pub(crate) fn render_projection(ctx: &Context<'_>, plan: &JoinPlan) -> Vec<String> {
    match &plan.info.columns {
        Some(columns) => columns
            .iter()
            .map(|column| {
                format!(
                    "{} AS {}",
                    ctx.dialect.qualified(&plan.table.name, column),
                    ctx.quote(&column_alias(&plan.table.name, column))
                )
            })
            .collect(),
        None => {
            tracing::warn!(
                model = %plan.table.model,
                alias = %plan.table.name,
                "columns of the included model are unknown, selecting all of them without prefixes"
            );
            vec![format!("{}.*", ctx.quote(&plan.table.name))]
        }
    }
}

/// `LEFT JOIN <related> AS tN ON <correlation> [AND <include where>]`
pub(crate) fn render_join(ctx: &Context<'_>, plan: &JoinPlan, visible: &[String]) -> CompileResult<Fragment> {
    let relation = &plan.relation;
    let target_table = ctx.table(&relation.target_model);
    let target_id = ctx.registry.id_column(&relation.target_model);

    let mut join = if relation.is_many_to_many() {
        let junction_table = relation.junction_table().ok_or_else(|| {
            CompileError::argument(format!(
                "Many-to-many relation `{}` of model `{}` has no join table.",
                relation.name, plan.parent.model
            ))
        })?;
        let junction = plan.alias.to_join_alias().to_string();

        Fragment::sql(format!(
            "LEFT JOIN {} AS {} ON {} = {} LEFT JOIN {} AS {} ON {} = {}",
            ctx.quote(junction_table),
            ctx.quote(&junction),
            ctx.dialect.qualified(&junction, relation.join_column(&plan.parent.model)),
            ctx.dialect.qualified(&plan.parent.name, ctx.registry.id_column(&plan.parent.model)),
            ctx.quote(&target_table),
            ctx.quote(&plan.table.name),
            ctx.dialect.qualified(&plan.table.name, target_id),
            ctx.dialect.qualified(&junction, relation.inverse_join_column(&plan.parent.model)),
        ))
    } else {
        let correlation = if ctx.registry.holds_foreign_key(&plan.parent.model, relation) {
            format!(
                "{} = {}",
                plan.table.column(&relation.references, ctx),
                plan.parent.qualified_column(&relation.foreign_key, ctx)
            )
        } else {
            format!(
                "{} = {}",
                plan.table.column(&relation.foreign_key, ctx),
                plan.parent.qualified_column(&relation.references, ctx)
            )
        };

        Fragment::sql(format!(
            "LEFT JOIN {} AS {} ON {correlation}",
            ctx.quote(&target_table),
            ctx.quote(&plan.table.name)
        ))
    };

    if let Some(filter) = &plan.filter {
        let mut visitor = FilterVisitor::new(*ctx, ParamGroup::Join).with_visible(visible.iter().cloned());

        for condition in visitor.visit_filter(filter, &plan.table)? {
            join.push_str(" AND ");
            join.append(condition);
        }
    }

    Ok(join)
}
