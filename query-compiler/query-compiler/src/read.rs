use crate::{
    Capability, CompileError, CompileResult, CompiledQuery,
    alias::{Alias, AliasCounter},
    computed::render_computed,
    context::Context,
    filter::{FilterVisitor, TableRef},
    fragment::{Fragment, ParamGroup},
    include::{JoinPlan, plan_includes, render_join, render_projection, selects_relations},
};
use itertools::Itertools;
use query_structure::{AggregationSpec, Filter, OrderBy, Query, SelectedField};

/// `findUnique`, `findFirst`, `findMany` and their throwing variants.
pub(crate) fn find(ctx: &Context<'_>, query: &Query) -> CompileResult<CompiledQuery> {
    let args = &query.arguments;
    let includes = query
        .selection
        .as_ref()
        .is_some_and(|selection| selects_relations(ctx, &query.model, selection));
    let aliased = includes || !args.computed.is_empty();

    let base = if aliased {
        TableRef::aliased(&query.model, Alias::BASE.to_string())
    } else {
        TableRef::unaliased(&query.model, ctx)
    };

    let joins = match (&query.selection, includes) {
        (Some(selection), true) => plan_includes(ctx, &base, selection, &mut AliasCounter::default())?,
        _ => Vec::new(),
    };

    let mut visible = vec![base.name.clone()];
    for join in &joins {
        if join.relation.is_many_to_many() {
            visible.push(join.alias.to_join_alias().to_string());
        }
        visible.push(join.table.name.clone());
    }

    let mut select_items: Vec<Fragment> = Vec::new();

    match base_columns(ctx, query) {
        Some(fields) => select_items.extend(fields.iter().map(|field| Fragment::sql(base.column(field, ctx)))),
        None if aliased => select_items.push(Fragment::sql(format!("{}.*", ctx.quote(&base.name)))),
        None => select_items.push(Fragment::sql("*")),
    }

    select_items.extend(
        joins
            .iter()
            .flat_map(|join| render_projection(ctx, join))
            .map(Fragment::sql),
    );

    for (alias, field) in &args.computed {
        select_items.push(render_computed(ctx, alias, field, &base)?);
    }

    let take = if query.action.is_single_read() { Some(1) } else { args.take };

    // Joined to-many relations repeat the base row once per related row, so a limit on the joined
    // rows would cut off base rows and their relations. The page of base rows is taken first.
    let page_first = (take.is_some() || args.skip.is_some()) && joins.iter().any(|join| join.info.is_list);

    let mut sql = Fragment::sql("SELECT ");
    sql.append(Fragment::join(select_items, ", "));
    sql.push_str(" FROM ");

    if page_first {
        sql.append(page(ctx, query, take, args.skip)?.wrap("(SELECT * FROM ", ")"));
    } else {
        sql.push_str(&ctx.quote(&ctx.table(&query.model)));
    }

    if aliased {
        sql.push_str(" AS ");
        sql.push_str(&ctx.quote(&base.name));
    }

    for join in &joins {
        sql.push_str(" ");
        sql.append(render_join(ctx, join, &visible)?);
    }

    if !page_first {
        append_where(ctx, &mut sql, args.filter.as_ref(), &base, &visible)?;
    }

    if !args.order_by.is_empty() {
        sql.push_str(&order_by_clause(ctx, &args.order_by, |field| base.column(field, ctx)));
    }

    if !page_first {
        sql.push_str(&pagination(ctx, take, args.skip));
    }

    Ok(finish(ctx, sql, &args.computed.keys().cloned().collect_vec(), &joins))
}

/// `count`, over a limited subquery when `take` or `skip` is given.
pub(crate) fn count(ctx: &Context<'_>, query: &Query) -> CompileResult<CompiledQuery> {
    let mut sql = Fragment::sql("SELECT COUNT(*) FROM ");
    sql.append(source(ctx, query)?);

    Ok(finish(ctx, sql, &[], &[]))
}

pub(crate) fn aggregate(ctx: &Context<'_>, query: &Query) -> CompileResult<CompiledQuery> {
    let spec = query.arguments.aggregation.clone().unwrap_or_default();
    let table = match is_paginated(query) {
        true => TableRef::aliased(&query.model, PAGE_ALIAS),
        false => TableRef::unaliased(&query.model, ctx),
    };
    let items = aggregate_items(ctx, &table, &spec)?;

    if items.is_empty() {
        return Err(no_aggregates(&spec));
    }

    let mut sql = Fragment::sql("SELECT ");
    sql.append(Fragment::join(items, ", "));
    sql.push_str(" FROM ");
    sql.append(source(ctx, query)?);

    Ok(finish(ctx, sql, &[], &[]))
}

pub(crate) fn group_by(ctx: &Context<'_>, query: &Query) -> CompileResult<CompiledQuery> {
    let args = &query.arguments;

    if args.group_by_fields.is_empty() {
        return Err(CompileError::argument("groupBy requires at least one field in `groupByFields`."));
    }

    let table = TableRef::unaliased(&query.model, ctx);
    let groups = args
        .group_by_fields
        .iter()
        .map(|field| table.column(field, ctx))
        .collect_vec();

    let spec = args.aggregation.clone().unwrap_or_default();
    let mut items = groups.iter().map(Fragment::sql).collect_vec();
    items.extend(aggregate_items(ctx, &table, &spec)?);

    let mut sql = Fragment::sql("SELECT ");
    sql.append(Fragment::join(items, ", "));
    sql.push_str(" FROM ");
    sql.push_str(&ctx.quote(&table.name));

    append_where(ctx, &mut sql, args.filter.as_ref(), &table, &[table.name.clone()])?;

    sql.push_str(" GROUP BY ");
    sql.push_str(&groups.join(", "));

    if !args.order_by.is_empty() {
        sql.push_str(&order_by_clause(ctx, &args.order_by, |field| table.column(field, ctx)));
    }

    sql.push_str(&pagination(ctx, args.take, args.skip));

    Ok(finish(ctx, sql, &[], &[]))
}

/// Alias of the limited subquery aggregates and counts are computed over.
const PAGE_ALIAS: &str = "sub";

fn is_paginated(query: &Query) -> bool {
    query.arguments.take.is_some() || query.arguments.skip.is_some()
}

/// `"Table" [WHERE ...]`, or a limited `(SELECT * ...) AS "sub"` when paginated.
fn source(ctx: &Context<'_>, query: &Query) -> CompileResult<Fragment> {
    let args = &query.arguments;

    if !is_paginated(query) {
        let table = TableRef::unaliased(&query.model, ctx);
        let mut sql = Fragment::sql(ctx.quote(&table.name));
        append_where(ctx, &mut sql, args.filter.as_ref(), &table, &[table.name.clone()])?;

        return Ok(sql);
    }

    Ok(page(ctx, query, args.take, args.skip)?.wrap("(SELECT * FROM ", &format!(") AS {}", ctx.quote(PAGE_ALIAS))))
}

/// `"Table" [WHERE ...] [ORDER BY ...] [LIMIT ...]`, the rows of one page of the model.
fn page(ctx: &Context<'_>, query: &Query, take: Option<i64>, skip: Option<i64>) -> CompileResult<Fragment> {
    let args = &query.arguments;
    let table = TableRef::unaliased(&query.model, ctx);

    let mut sql = Fragment::sql(ctx.quote(&table.name));
    append_where(ctx, &mut sql, args.filter.as_ref(), &table, &[table.name.clone()])?;

    if !args.order_by.is_empty() {
        sql.push_str(&order_by_clause(ctx, &args.order_by, |field| table.column(field, ctx)));
    }

    sql.push_str(&pagination(ctx, take, skip));

    Ok(sql)
}

/// Aggregates over the rows of `table`, the queried table or the page it was limited to.
fn aggregate_items(ctx: &Context<'_>, table: &TableRef, spec: &AggregationSpec) -> CompileResult<Vec<Fragment>> {
    let model = table.model.as_str();
    let mut items = Vec::new();

    if let Some(count) = &spec.count {
        if count.all {
            items.push(Fragment::sql(format!("COUNT(*) AS {}", ctx.quote("_count"))));
        }

        for field in &count.fields {
            items.push(aggregate_item(ctx, model, "COUNT", "_count", field));
        }
    }

    let functions = [
        ("AVG", "_avg", &spec.avg),
        ("SUM", "_sum", &spec.sum),
        ("MIN", "_min", &spec.min),
        ("MAX", "_max", &spec.max),
    ];

    for (function, prefix, fields) in functions {
        items.extend(fields.iter().map(|field| aggregate_item(ctx, model, function, prefix, field)));
    }

    if !spec.count_filtered.is_empty() && !ctx.dialect.has(Capability::AggregateFilter) {
        tracing::debug!(
            dialect = %ctx.dialect,
            count = spec.count_filtered.len(),
            "dialect has no aggregate FILTER clause, skipping filtered counts"
        );
        return Ok(items);
    }

    for counted in &spec.count_filtered {
        let mut visitor = FilterVisitor::new(*ctx, ParamGroup::Filter).with_visible([table.name.clone()]);
        let condition = visitor
            .visit_condition(&counted.filter, table)?
            .unwrap_or_else(|| Fragment::sql("1=1"));

        let mut item = Fragment::sql("COUNT(*) FILTER (WHERE ");
        item.append(condition);
        item.push_str(&format!(") AS {}", ctx.quote(&counted.alias)));
        items.push(item);
    }

    Ok(items)
}

fn aggregate_item(ctx: &Context<'_>, model: &str, function: &str, prefix: &str, field: &str) -> Fragment {
    Fragment::sql(format!(
        "{function}({}) AS {}",
        ctx.quote(&ctx.column(model, field)),
        ctx.quote(&format!("{prefix}_{field}"))
    ))
}

fn no_aggregates(spec: &AggregationSpec) -> CompileError {
    if spec.is_empty() {
        CompileError::argument("aggregate requires at least one of `_count`, `_avg`, `_sum`, `_min`, `_max` or `_countFiltered`.")
    } else {
        CompileError::unsupported("Filtered counts are the only requested aggregates and this dialect cannot compute them.")
    }
}

/// Explicitly requested base columns: `selectFields` first, then a selection without `$scalars`.
fn base_columns(ctx: &Context<'_>, query: &Query) -> Option<Vec<String>> {
    let args = &query.arguments;

    if !args.select_fields.is_empty() {
        return Some(args.select_fields.clone());
    }

    let selection = query.selection.as_ref().filter(|selection| !selection.scalars)?;
    let fields = selection
        .fields
        .iter()
        .filter(|(_, field)| matches!(field, SelectedField::Scalar(true)))
        .filter(|(name, _)| ctx.registry.resolve_relation(&query.model, name).is_none())
        .map(|(name, _)| name.clone())
        .collect_vec();

    (!fields.is_empty()).then_some(fields)
}

pub(crate) fn append_where(
    ctx: &Context<'_>,
    sql: &mut Fragment,
    filter: Option<&Filter>,
    table: &TableRef,
    visible: &[String],
) -> CompileResult<()> {
    let Some(filter) = filter else {
        return Ok(());
    };

    let mut visitor = FilterVisitor::new(*ctx, ParamGroup::Where).with_visible(visible.iter().cloned());

    if let Some(condition) = visitor.visit_condition(filter, table)? {
        sql.push_str(" WHERE ");
        sql.append(condition);
    }

    Ok(())
}

/// ` ORDER BY ...`, with `NULLS FIRST/LAST` only where the dialect supports it.
pub(crate) fn order_by_clause<F>(ctx: &Context<'_>, order_by: &[OrderBy], column: F) -> String
where
    F: Fn(&str) -> String,
{
    let entries = order_by.iter().map(|entry| {
        let mut rendered = format!("{} {}", column(&entry.field), entry.sort_order.as_sql());

        if let Some(nulls) = entry.nulls_order {
            if ctx.dialect.has(Capability::NullsOrdering) {
                rendered.push(' ');
                rendered.push_str(nulls.as_sql());
            } else {
                tracing::debug!(dialect = %ctx.dialect, field = %entry.field, "ignoring nulls ordering");
            }
        }

        rendered
    });

    format!(" ORDER BY {}", entries.format(", "))
}

pub(crate) fn pagination(ctx: &Context<'_>, take: Option<i64>, skip: Option<i64>) -> String {
    match (take, skip) {
        (Some(take), Some(skip)) => format!(" LIMIT {take} OFFSET {skip}"),
        (Some(take), None) => format!(" LIMIT {take}"),
        (None, Some(skip)) => match ctx.dialect.unbounded_limit() {
            Some(limit) => format!(" LIMIT {limit} OFFSET {skip}"),
            None => format!(" OFFSET {skip}"),
        },
        (None, None) => String::new(),
    }
}

fn finish(ctx: &Context<'_>, sql: Fragment, computed_field_names: &[String], joins: &[JoinPlan]) -> CompiledQuery {
    let (sql, args) = sql.render(ctx.dialect.placeholder_format());
    let mut compiled = CompiledQuery::new(sql, args);

    compiled.returns_rows = true;
    compiled.computed_field_names = computed_field_names.to_vec();
    compiled.includes = joins.iter().map(|join| join.info.clone()).collect();
    compiled
}
