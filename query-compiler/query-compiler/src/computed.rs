use crate::{
    CompileError, CompileResult,
    context::Context,
    filter::TableRef,
    fragment::{Fragment, ParamGroup},
    read::order_by_clause,
};
use query_structure::{ComputedField, ComputedOp, CorrelationValue, QueryValue};

/// A correlated scalar subquery projected as `alias`.
///
/// Correlation columns and ordering fields belong to the subquery's own table and are written
/// unqualified. `FieldRef` values point at the base row through `base`.
pub(crate) fn render_computed(
    ctx: &Context<'_>,
    alias: &str,
    field: &ComputedField,
    base: &TableRef,
) -> CompileResult<Fragment> {
    ctx.check_model(&field.from_table)?;

    let model = ctx.registry.find_by_table(&field.from_table);
    let table = model.map_or(field.from_table.as_str(), |model| model.table_name.as_str());
    let column = |name: &str| ctx.quote(model.map_or(name, |model| model.column_name(name)));

    let projection = match (field.op, &field.column) {
        (ComputedOp::Count, None) => "COUNT(*)".to_owned(),
        (op, Some(name)) => match op.sql_function() {
            Some(function) => format!("{function}({})", column(name)),
            None => column(name),
        },
        (op, None) => {
            return Err(CompileError::argument(format!(
                "Computed field `{alias}` uses `{op}` and needs a column."
            )));
        }
    };

    let mut sql = Fragment::sql(format!("(SELECT {projection} FROM {}", ctx.quote(table)));

    for (idx, (name, value)) in field.correlating_where.iter().enumerate() {
        sql.push_str(if idx == 0 { " WHERE " } else { " AND " });
        sql.push_str(&column(name));

        match value {
            CorrelationValue::FieldRef(base_field) => {
                sql.push_str(" = ");
                sql.push_str(&base.qualified_column(base_field, ctx));
            }
            CorrelationValue::Value(QueryValue::Null) => {
                sql.push_str(" IS NULL");
            }
            CorrelationValue::Value(value) => {
                sql.push_str(" = ");
                sql.push_param(ParamGroup::Computed, value.clone());
            }
        }
    }

    if !field.order_by.is_empty() {
        sql.push_str(&order_by_clause(ctx, &field.order_by, column));
    }

    if field.op == ComputedOp::First {
        sql.push_str(" LIMIT 1");
    }

    sql.push_str(&format!(") AS {}", ctx.quote(alias)));

    Ok(sql)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Dialect;
    use pretty_assertions::assert_eq;
    use query_structure::{FieldInfo, ModelSchema, OrderBy, SchemaRegistry, TypeIdentifier};

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new()
            .with_model(
                ModelSchema::new("User")
                    .field(FieldInfo::new("id", TypeIdentifier::Int).id())
                    .field(FieldInfo::new("userId", TypeIdentifier::Int).column("user_id")),
            )
            .with_model(ModelSchema::new("Order").table("orders"))
    }

    fn render(dialect: Dialect, field: &ComputedField) -> (String, Vec<QueryValue>) {
        let registry = registry();
        let ctx = Context {
            dialect,
            registry: &registry,
            strict: true,
        };

        render_computed(&ctx, "maxPrice", field, &TableRef::aliased("User", "t0"))
            .unwrap()
            .render(dialect.placeholder_format())
    }

    #[test]
    fn aggregate_with_field_ref_and_static_value() {
        let field = ComputedField::new(ComputedOp::Max, "orders")
            .column("price")
            .correlate("userId", CorrelationValue::field_ref("id"))
            .correlate("status", "paid");

        let (sql, args) = render(Dialect::Postgres, &field);

        assert_eq!(
            sql,
            r#"(SELECT MAX("price") FROM "orders" WHERE "userId" = "t0"."id" AND "status" = $1) AS "maxPrice""#
        );
        assert_eq!(args, vec![QueryValue::from("paid")]);
    }

    #[test]
    fn from_table_accepts_the_model_name() {
        let field = ComputedField::new(ComputedOp::Count, "Order").correlate("deletedAt", QueryValue::Null);
        let (sql, _) = render(Dialect::Sqlite, &field);

        assert_eq!(
            sql,
            r#"(SELECT COUNT(*) FROM `orders` WHERE `deletedAt` IS NULL) AS `maxPrice`"#
        );
    }

    #[test]
    fn first_orders_and_limits() {
        let field = ComputedField::new(ComputedOp::First, "orders")
            .column("status")
            .correlate("userId", CorrelationValue::field_ref("userId"))
            .order_by(OrderBy::desc("createdAt"));

        let (sql, _) = render(Dialect::Mysql, &field);

        assert_eq!(
            sql,
            "(SELECT `status` FROM `orders` WHERE `userId` = `t0`.`user_id` ORDER BY `createdAt` DESC LIMIT 1) AS `maxPrice`"
        );
    }

    #[test]
    fn aggregates_other_than_count_need_a_column() {
        let registry = registry();
        let ctx = Context {
            dialect: Dialect::Postgres,
            registry: &registry,
            strict: false,
        };

        let err = render_computed(
            &ctx,
            "avgPrice",
            &ComputedField::new(ComputedOp::Avg, "orders"),
            &TableRef::aliased("User", "t0"),
        )
        .unwrap_err();

        assert!(err.is_argument_error());
        assert_eq!(err.to_string(), "Computed field `avgPrice` uses `avg` and needs a column.");
    }
}
