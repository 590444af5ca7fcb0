use crate::{
    CompileError, CompileResult, CompiledMutation, CompiledQuery, GeneratedId,
    context::Context,
    fragment::{Fragment, ParamGroup},
    read,
};
use query_structure::{
    Action, ConnectTarget, DataRecord, DataValue, FilterValue, Query, QueryArguments, QueryValue, RelationInfo,
    RelationWrite, WriteData, filter::ScalarOperator,
};

/// Junction writes requested under one many-to-many relation field.
struct JunctionWrite {
    model: String,
    field: String,
    relation: RelationInfo,
    write: RelationWrite,
}

/// Row on the declaring side of the junction writes.
enum SourceId {
    Known(QueryValue),
    /// Created by the main statement with an id the database generates.
    Generated(GeneratedId),
}

/// Splits `connect`/`disconnect` instructions off the data of a `create` or `update` and compiles
/// them into junction table statements, connects before disconnects, per relation in input order.
pub(crate) fn compile_with_relations(ctx: &Context<'_>, query: &Query) -> CompileResult<CompiledMutation> {
    let Some(WriteData::Single(record)) = &query.arguments.data else {
        return Ok(CompiledMutation::new(crate::dispatch(ctx, query)?));
    };

    let (scalars, writes) = split_record(ctx, &query.model, record)?;

    if writes.is_empty() {
        return Ok(CompiledMutation::new(crate::dispatch(ctx, query)?));
    }

    if !matches!(query.action, Action::Create | Action::Update) {
        return Err(CompileError::argument(format!(
            "{} cannot connect or disconnect related records, only create and update can.",
            query.action
        )));
    }

    let mut stripped = query.clone();
    stripped.arguments.data = Some(WriteData::Single(scalars));

    let main_query = match (&stripped.arguments.data, query.action) {
        (Some(WriteData::Single(data)), Action::Update) if data.is_empty() => {
            let select = Query::new(query.model.clone(), Action::FindMany).with_arguments(QueryArguments {
                filter: query.arguments.filter.clone(),
                ..Default::default()
            });
            read::find(ctx, &select)?
        }
        _ => crate::dispatch(ctx, &stripped)?,
    };

    let (source_id, generated_id) = match source_id(ctx, query, record)? {
        SourceId::Known(id) => (id, None),
        SourceId::Generated(generated) => (QueryValue::Null, Some(generated)),
    };

    let mut relation_mutations = Vec::new();

    for junction in &writes {
        for target in &junction.write.connect {
            relation_mutations.push(connect(ctx, junction, &source_id, target)?);
        }

        for target in &junction.write.disconnect {
            relation_mutations.push(disconnect(ctx, junction, &source_id, target)?);
        }
    }

    tracing::debug!(
        model = %query.model,
        statements = relation_mutations.len(),
        "compiled junction table writes"
    );

    Ok(CompiledMutation {
        main_query,
        relation_mutations,
        generated_id,
    })
}

fn split_record(ctx: &Context<'_>, model: &str, record: &DataRecord) -> CompileResult<(DataRecord, Vec<JunctionWrite>)> {
    let mut scalars = DataRecord::new();
    let mut writes = Vec::new();

    for (field, value) in record {
        let write = match value {
            DataValue::Value(_) => {
                scalars.insert(field.clone(), value.clone());
                continue;
            }
            DataValue::Relation(write) => write,
        };

        let Some(relation) = ctx.registry.resolve_relation(model, field) else {
            return Err(CompileError::argument(format!(
                "Field `{field}` is not a registered relation of model `{model}` and cannot connect or disconnect records."
            )));
        };

        if !relation.is_many_to_many() {
            return Err(CompileError::argument(format!(
                "Relation `{field}` of model `{model}` is not many-to-many, set the foreign key `{}` directly instead of using connect or disconnect.",
                relation.foreign_key
            )));
        }

        ctx.check_model(&relation.target_model)?;

        writes.push(JunctionWrite {
            model: model.to_owned(),
            field: field.clone(),
            relation: relation.clone(),
            write: write.clone(),
        });
    }

    Ok((scalars, writes))
}

/// Id of the row on the declaring side: from `data` on create, from `where` on update. A create
/// without an id in `data` leaves it to the database.
fn source_id(ctx: &Context<'_>, query: &Query, record: &DataRecord) -> CompileResult<SourceId> {
    let id_field = ctx
        .registry
        .model(&query.model)
        .and_then(|model| model.id_field())
        .map(|field| field.name.as_str())
        .unwrap_or("id");

    let id = match query.action {
        Action::Create => record
            .get(id_field)
            .and_then(DataValue::as_value)
            .filter(|value| !value.is_null())
            .cloned(),
        _ => query
            .arguments
            .filter
            .as_ref()
            .and_then(|filter| filter.get(id_field))
            .and_then(|value| match value {
                FilterValue::Literal(value) => Some(value.clone()),
                FilterValue::Comparison(map) if map.len() == 1 => {
                    map.get(ScalarOperator::Equals.as_str()).cloned()
                }
                _ => None,
            })
            .filter(|value| !value.is_null()),
    };

    match (id, query.action) {
        (Some(id), _) => Ok(SourceId::Known(id)),
        (None, Action::Create) => Ok(SourceId::Generated(GeneratedId {
            column: ctx.registry.id_column(&query.model).to_owned(),
        })),
        (None, _) => Err(CompileError::argument(format!(
            "Connecting or disconnecting records of `{}` requires `{id_field}` in `where` to identify the row.",
            query.model
        ))),
    }
}

fn connect(
    ctx: &Context<'_>,
    junction: &JunctionWrite,
    source_id: &QueryValue,
    target: &ConnectTarget,
) -> CompileResult<CompiledQuery> {
    let relation = &junction.relation;

    let mut sql = Fragment::sql(format!(
        "{} {} ({},{}) VALUES (",
        ctx.dialect.insert_ignore_prefix(),
        ctx.quote(junction_table(junction)?),
        ctx.quote(relation.join_column(&junction.model)),
        ctx.quote(relation.inverse_join_column(&junction.model)),
    ));
    sql.push_param(ParamGroup::Data, source_id.clone());
    sql.push_str(",");
    sql.append(target_id(ctx, relation, target, ParamGroup::Data));
    sql.push_str(")");

    if let Some(suffix) = ctx.dialect.insert_ignore_suffix() {
        sql.push_str(" ");
        sql.push_str(suffix);
    }

    Ok(finish(ctx, sql))
}

fn disconnect(
    ctx: &Context<'_>,
    junction: &JunctionWrite,
    source_id: &QueryValue,
    target: &ConnectTarget,
) -> CompileResult<CompiledQuery> {
    let relation = &junction.relation;

    let mut sql = Fragment::sql(format!(
        "DELETE FROM {} WHERE {} = ",
        ctx.quote(junction_table(junction)?),
        ctx.quote(relation.join_column(&junction.model)),
    ));
    sql.push_param(ParamGroup::Where, source_id.clone());
    sql.push_str(&format!(" AND {} = ", ctx.quote(relation.inverse_join_column(&junction.model))));
    sql.append(target_id(ctx, relation, target, ParamGroup::Where));

    Ok(finish(ctx, sql))
}

/// The target's id, looked up with a subquery when the target is identified by another field.
fn target_id(ctx: &Context<'_>, relation: &RelationInfo, target: &ConnectTarget, group: ParamGroup) -> Fragment {
    let target_model = &relation.target_model;
    let id_column = ctx.registry.id_column(target_model);
    let column = ctx.column(target_model, &target.field);

    if column == id_column {
        return Fragment::param(group, target.value.clone());
    }

    let mut lookup = Fragment::sql(format!(
        "(SELECT {} FROM {} WHERE {} = ",
        ctx.quote(id_column),
        ctx.quote(&ctx.table(target_model)),
        ctx.quote(&column),
    ));
    lookup.push_param(group, target.value.clone());
    lookup.push_str(")");
    lookup
}

fn junction_table(junction: &JunctionWrite) -> CompileResult<&str> {
    junction.relation.junction_table().ok_or_else(|| {
        CompileError::argument(format!(
            "Many-to-many relation `{}` has no join table.",
            junction.field
        ))
    })
}

fn finish(ctx: &Context<'_>, sql: Fragment) -> CompiledQuery {
    let (sql, args) = sql.render(ctx.dialect.placeholder_format());
    CompiledQuery::new(sql, args)
}
