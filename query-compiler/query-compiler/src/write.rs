use crate::{
    Capability, CompileError, CompileResult, CompiledQuery, Dialect,
    context::Context,
    filter::TableRef,
    fragment::{Fragment, ParamGroup},
    read::append_where,
};
use itertools::Itertools;
use query_structure::{DataRecord, DataValue, Query, QueryValue, WriteData};

/// `(column, value)` pairs of a record, in input order.
type Assignments = Vec<(String, QueryValue)>;

pub(crate) fn create(ctx: &Context<'_>, query: &Query) -> CompileResult<CompiledQuery> {
    let record = match &query.arguments.data {
        Some(WriteData::Single(record)) => record,
        Some(WriteData::Many(_)) => {
            return Err(CompileError::argument(
                "create expects a single record in `data`, use createMany to insert a list.",
            ));
        }
        None => return Err(CompileError::argument("create requires `data`.")),
    };

    let assignments = assignments(ctx, &query.model, record)?;
    let mut sql = insert_into(ctx, "INSERT INTO", &query.model, &assignments);

    let returns_rows = returning(ctx, &mut sql);

    Ok(finish(ctx, sql, returns_rows))
}

pub(crate) fn create_many(ctx: &Context<'_>, query: &Query) -> CompileResult<CompiledQuery> {
    let rows: &[DataRecord] = match &query.arguments.data {
        Some(WriteData::Many(rows)) => rows.as_slice(),
        Some(WriteData::Single(record)) => std::slice::from_ref(record),
        None => &[],
    };

    let Some(first) = rows.first() else {
        return Err(CompileError::argument("createMany requires at least one record in `data`."));
    };

    let fields = first.keys().cloned().collect_vec();
    let columns = fields.iter().map(|field| ctx.quote(&ctx.column(&query.model, field))).join(",");

    let mut tuples = Vec::with_capacity(rows.len());

    for (idx, row) in rows.iter().enumerate() {
        if let Some(extra) = row.keys().find(|key| !first.contains_key(*key)) {
            return Err(CompileError::argument(format!(
                "Record {idx} of createMany sets `{extra}`, which the first record does not. Every record must use the columns of the first one."
            )));
        }

        let mut values = Vec::with_capacity(fields.len());

        for field in &fields {
            let value = match row.get(field) {
                Some(value) => scalar(&query.model, field, value)?.clone(),
                None => QueryValue::Null,
            };
            values.push(Fragment::param(ParamGroup::Data, value));
        }

        tuples.push(Fragment::join(values, ",").wrap("(", ")"));
    }

    let mut sql = Fragment::sql(format!(
        "INSERT INTO {} ({columns}) VALUES ",
        ctx.quote(&ctx.table(&query.model))
    ));
    sql.append(Fragment::join(tuples, ","));

    let returns_rows = returning(ctx, &mut sql);

    Ok(finish(ctx, sql, returns_rows))
}

/// `update` returns the changed rows where the dialect can, `updateMany` never does.
pub(crate) fn update(ctx: &Context<'_>, query: &Query, with_returning: bool) -> CompileResult<CompiledQuery> {
    let record = match &query.arguments.data {
        Some(WriteData::Single(record)) => record,
        Some(WriteData::Many(_)) => {
            return Err(CompileError::argument(format!(
                "{} expects a single record in `data`.",
                query.action
            )));
        }
        None => return Err(CompileError::argument(format!("{} requires `data`.", query.action))),
    };

    let assignments = assignments(ctx, &query.model, record)?;

    if assignments.is_empty() {
        return Err(CompileError::argument(format!(
            "{} requires at least one field to set in `data`.",
            query.action
        )));
    }

    let table = TableRef::unaliased(&query.model, ctx);
    let mut sql = Fragment::sql(format!("UPDATE {} SET ", ctx.quote(&table.name)));
    sql.append(set_list(ctx, &assignments));

    append_where(ctx, &mut sql, query.arguments.filter.as_ref(), &table, &[table.name.clone()])?;

    let returns_rows = with_returning && returning(ctx, &mut sql);

    Ok(finish(ctx, sql, returns_rows))
}

/// Insert of `create`, resolving conflicts on the columns named by `where`.
pub(crate) fn upsert(ctx: &Context<'_>, query: &Query) -> CompileResult<CompiledQuery> {
    let args = &query.arguments;

    let Some(create) = &args.create else {
        return Err(CompileError::argument("upsert requires `create`."));
    };

    let conflict_fields = args
        .filter
        .as_ref()
        .map(|filter| filter.keys().map(ToOwned::to_owned).collect_vec())
        .unwrap_or_default();

    if conflict_fields.is_empty() {
        return Err(CompileError::argument(
            "upsert requires `where` naming the unique columns to resolve conflicts on.",
        ));
    }

    let insert = assignments(ctx, &query.model, create)?;
    let update = match &args.update {
        Some(record) => assignments(ctx, &query.model, record)?,
        None => Vec::new(),
    };

    let mut sql = match (ctx.dialect, update.is_empty()) {
        (Dialect::Mysql, true) => insert_into(ctx, ctx.dialect.insert_ignore_prefix(), &query.model, &insert),
        (Dialect::Mysql, false) => {
            let mut sql = insert_into(ctx, "INSERT INTO", &query.model, &insert);
            sql.push_str(" ON DUPLICATE KEY UPDATE ");
            sql.append(set_list(ctx, &update));
            sql
        }
        (_, update_is_empty) => {
            let conflict = conflict_fields
                .iter()
                .map(|field| ctx.quote(&ctx.column(&query.model, field)))
                .join(",");

            let mut sql = insert_into(ctx, "INSERT INTO", &query.model, &insert);
            sql.push_str(&format!(" ON CONFLICT ({conflict}) DO "));

            if update_is_empty {
                sql.push_str("NOTHING");
            } else {
                sql.push_str("UPDATE SET ");
                sql.append(set_list(ctx, &update));
            }

            sql
        }
    };

    let returns_rows = returning(ctx, &mut sql);

    Ok(finish(ctx, sql, returns_rows))
}

/// `delete` and `deleteMany`. A missing `where` deletes every row.
pub(crate) fn delete(ctx: &Context<'_>, query: &Query) -> CompileResult<CompiledQuery> {
    let table = TableRef::unaliased(&query.model, ctx);
    let mut sql = Fragment::sql(format!("DELETE FROM {}", ctx.quote(&table.name)));

    append_where(ctx, &mut sql, query.arguments.filter.as_ref(), &table, &[table.name.clone()])?;

    Ok(finish(ctx, sql, false))
}

fn assignments(ctx: &Context<'_>, model: &str, record: &DataRecord) -> CompileResult<Assignments> {
    record
        .iter()
        .map(|(field, value)| Ok((ctx.column(model, field), scalar(model, field, value)?.clone())))
        .collect()
}

fn scalar<'v>(model: &str, field: &str, value: &'v DataValue) -> CompileResult<&'v QueryValue> {
    match value {
        DataValue::Value(value) => Ok(value),
        DataValue::Relation(_) => Err(CompileError::argument(format!(
            "Field `{field}` of model `{model}` connects or disconnects related records, compile the query with compile_with_relations."
        ))),
    }
}

/// `<prefix> "table" ("a","b") VALUES ($1,$2)`, or the dialect's default-values insert.
fn insert_into(ctx: &Context<'_>, prefix: &str, model: &str, assignments: &Assignments) -> Fragment {
    let mut sql = Fragment::sql(format!("{prefix} {} ", ctx.quote(&ctx.table(model))));

    if assignments.is_empty() {
        sql.push_str(ctx.dialect.default_values_insert());
        return sql;
    }

    let columns = assignments.iter().map(|(column, _)| ctx.quote(column)).join(",");
    let values = assignments
        .iter()
        .map(|(_, value)| Fragment::param(ParamGroup::Data, value.clone()));

    sql.push_str(&format!("({columns}) VALUES "));
    sql.append(Fragment::join(values, ",").wrap("(", ")"));
    sql
}

/// `"a" = $1, "b" = $2`
fn set_list(ctx: &Context<'_>, assignments: &Assignments) -> Fragment {
    Fragment::join(
        assignments.iter().map(|(column, value)| {
            let mut assignment = Fragment::sql(format!("{} = ", ctx.quote(column)));
            assignment.push_param(ParamGroup::Data, value.clone());
            assignment
        }),
        ", ",
    )
}

/// Appends `RETURNING *` where the dialect supports it.
fn returning(ctx: &Context<'_>, sql: &mut Fragment) -> bool {
    let supported = ctx.dialect.has(Capability::Returning);

    if supported {
        sql.push_str(" RETURNING *");
    }

    supported
}

fn finish(ctx: &Context<'_>, sql: Fragment, returns_rows: bool) -> CompiledQuery {
    let (sql, args) = sql.render(ctx.dialect.placeholder_format());
    let mut compiled = CompiledQuery::new(sql, args);

    compiled.returns_rows = returns_rows;
    compiled
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use query_structure::{Action, Filter, QueryArguments, SchemaRegistry, data_record, filter::equals};

    fn with_ctx<T>(dialect: Dialect, f: impl FnOnce(&Context<'_>) -> T) -> T {
        let registry = SchemaRegistry::new();
        f(&Context {
            dialect,
            registry: &registry,
            strict: false,
        })
    }

    #[test]
    fn create_with_empty_data_inserts_defaults() {
        let query = Query::new("Log", Action::Create).with_arguments(QueryArguments::new().data(DataRecord::new()));

        let sql = with_ctx(Dialect::Postgres, |ctx| create(ctx, &query)).unwrap().sql;
        assert_eq!(sql, r#"INSERT INTO "Log" DEFAULT VALUES RETURNING *"#);

        let sql = with_ctx(Dialect::Mysql, |ctx| create(ctx, &query)).unwrap().sql;
        assert_eq!(sql, "INSERT INTO `Log` () VALUES ()");
    }

    #[test]
    fn create_many_binds_null_for_missing_columns() {
        let query = Query::new("User", Action::CreateMany).with_arguments(QueryArguments::new().data_many(vec![
            data_record([("email", "a@b.com"), ("name", "A")]),
            data_record([("email", "c@d.com")]),
        ]));

        let compiled = with_ctx(Dialect::Sqlite, |ctx| create_many(ctx, &query)).unwrap();

        assert_eq!(
            compiled.sql,
            "INSERT INTO `User` (`email`,`name`) VALUES (?,?),(?,?)"
        );
        assert_eq!(
            compiled.args,
            vec![
                QueryValue::from("a@b.com"),
                QueryValue::from("A"),
                QueryValue::from("c@d.com"),
                QueryValue::Null,
            ]
        );
    }

    #[test]
    fn create_many_rejects_extra_columns_and_empty_lists() {
        let query = Query::new("User", Action::CreateMany).with_arguments(QueryArguments::new().data_many(vec![
            data_record([("email", "a@b.com")]),
            data_record([("email", "c@d.com"), ("name", "C")]),
        ]));

        let err = with_ctx(Dialect::Postgres, |ctx| create_many(ctx, &query)).unwrap_err();
        assert!(err.to_string().contains("`name`"));

        let empty = Query::new("User", Action::CreateMany).with_arguments(QueryArguments::new().data_many(vec![]));
        assert!(with_ctx(Dialect::Postgres, |ctx| create_many(ctx, &empty)).is_err());
    }

    #[test]
    fn update_sets_before_where() {
        let query = Query::new("User", Action::Update).with_arguments(
            QueryArguments::new()
                .data(data_record([("name", DataValue::from("Bob")), ("age", DataValue::from(31))]))
                .filter(Filter::new().field("id", equals(7))),
        );

        let compiled = with_ctx(Dialect::Postgres, |ctx| update(ctx, &query, true)).unwrap();

        assert_eq!(
            compiled.sql,
            r#"UPDATE "User" SET "name" = $1, "age" = $2 WHERE "id" = $3 RETURNING *"#
        );
        assert_eq!(compiled.args.len(), 3);
        assert!(compiled.returns_rows);
    }

    #[test]
    fn update_many_never_returns_rows() {
        let query = Query::new("User", Action::UpdateMany)
            .with_arguments(QueryArguments::new().data(data_record([("active", false)])));

        let compiled = with_ctx(Dialect::Postgres, |ctx| update(ctx, &query, false)).unwrap();
        assert_eq!(compiled.sql, r#"UPDATE "User" SET "active" = $1"#);
        assert!(!compiled.returns_rows);
    }

    #[test]
    fn update_without_fields_is_rejected() {
        let query = Query::new("User", Action::Update).with_arguments(QueryArguments::new().data(DataRecord::new()));
        let err = with_ctx(Dialect::Postgres, |ctx| update(ctx, &query, true)).unwrap_err();

        assert!(err.is_argument_error());
    }

    fn upsert_query(update: Option<DataRecord>) -> Query {
        let mut arguments = QueryArguments::new()
            .filter(Filter::new().field("email", "a@b.com"))
            .create(data_record([("email", "a@b.com"), ("name", "A")]));

        if let Some(update) = update {
            arguments = arguments.update(update);
        }

        Query::new("User", Action::Upsert).with_arguments(arguments)
    }

    #[test]
    fn upsert_per_dialect() {
        let query = upsert_query(Some(data_record([("name", "B")])));

        let postgres = with_ctx(Dialect::Postgres, |ctx| upsert(ctx, &query)).unwrap();
        assert_eq!(
            postgres.sql,
            r#"INSERT INTO "User" ("email","name") VALUES ($1,$2) ON CONFLICT ("email") DO UPDATE SET "name" = $3 RETURNING *"#
        );
        assert_eq!(postgres.args.len(), 3);

        let sqlite = with_ctx(Dialect::Sqlite, |ctx| upsert(ctx, &query)).unwrap();
        assert_eq!(
            sqlite.sql,
            "INSERT INTO `User` (`email`,`name`) VALUES (?,?) ON CONFLICT (`email`) DO UPDATE SET `name` = ?"
        );

        let mysql = with_ctx(Dialect::Mysql, |ctx| upsert(ctx, &query)).unwrap();
        assert_eq!(
            mysql.sql,
            "INSERT INTO `User` (`email`,`name`) VALUES (?,?) ON DUPLICATE KEY UPDATE `name` = ?"
        );
    }

    #[test]
    fn upsert_without_update_ignores_conflicts() {
        let query = upsert_query(None);

        let postgres = with_ctx(Dialect::Postgres, |ctx| upsert(ctx, &query)).unwrap();
        assert_eq!(
            postgres.sql,
            r#"INSERT INTO "User" ("email","name") VALUES ($1,$2) ON CONFLICT ("email") DO NOTHING RETURNING *"#
        );

        let mysql = with_ctx(Dialect::Mysql, |ctx| upsert(ctx, &query)).unwrap();
        assert_eq!(mysql.sql, "INSERT IGNORE INTO `User` (`email`,`name`) VALUES (?,?)");
    }

    #[test]
    fn upsert_requires_create_and_where() {
        let no_create = Query::new("User", Action::Upsert)
            .with_arguments(QueryArguments::new().filter(Filter::new().field("email", "a@b.com")));
        assert!(with_ctx(Dialect::Postgres, |ctx| upsert(ctx, &no_create)).is_err());

        let no_where = Query::new("User", Action::Upsert)
            .with_arguments(QueryArguments::new().create(data_record([("email", "a@b.com")])));
        assert!(with_ctx(Dialect::Postgres, |ctx| upsert(ctx, &no_where)).is_err());
    }

    #[test]
    fn delete_without_where_deletes_everything() {
        let query = Query::new("Session", Action::DeleteMany);
        let sql = with_ctx(Dialect::Mysql, |ctx| delete(ctx, &query)).unwrap().sql;

        assert_eq!(sql, "DELETE FROM `Session`");
    }
}
