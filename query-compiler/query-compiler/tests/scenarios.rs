mod common;

use common::compiler;
use pretty_assertions::assert_eq;
use query_structure::{
    Action, AggregationSpec, ArgType, ConnectTarget, DataValue, Filter, Query, QueryArguments, QueryValue,
    RelationWrite, data_record,
    filter::{equals, gte, some},
};
use serde_json::json;

#[test]
fn find_many_with_a_literal_filter() {
    let query = Query::new("User", Action::FindMany)
        .with_arguments(QueryArguments::new().filter(Filter::new().field("email", "a@b.com")));

    let compiled = compiler("postgresql").compile(&query).unwrap();

    assert_eq!(compiled.sql, r#"SELECT * FROM "User" WHERE "email" = $1"#);
    assert_eq!(compiled.args, vec![QueryValue::from("a@b.com")]);
    assert_eq!(compiled.arg_types, vec![ArgType::Text]);
}

#[test]
fn create_returns_the_inserted_row_on_postgres() {
    let query = Query::new("User", Action::Create)
        .with_arguments(QueryArguments::new().data(data_record([("id", "123"), ("email", "a@b.com")])));

    let compiled = compiler("postgresql").compile(&query).unwrap();

    assert_eq!(compiled.sql, r#"INSERT INTO "User" ("id","email") VALUES ($1,$2) RETURNING *"#);
    assert_eq!(compiled.args, vec![QueryValue::from("123"), QueryValue::from("a@b.com")]);
}

#[test]
fn some_quantifier_compiles_to_exists() {
    let query = Query::new("Product", Action::FindMany).with_arguments(
        QueryArguments::new().filter(Filter::new().field("reviews", some(Filter::new().field("rating", gte(4))))),
    );

    let compiled = compiler("postgresql").compile(&query).unwrap();

    assert_eq!(
        compiled.sql,
        r#"SELECT * FROM "Product" WHERE EXISTS (SELECT 1 FROM "Review" WHERE "productId" = "Product"."id" AND "rating" >= $1)"#
    );
    assert_eq!(compiled.args, vec![QueryValue::Int(4)]);
}

#[test]
fn filtered_counts_number_their_placeholders_after_the_where_clause() {
    let query = Query::new("Order", Action::Aggregate).with_arguments(
        QueryArguments::new()
            .filter(Filter::new().field("userId", equals("u1")))
            .aggregation(
                AggregationSpec::new()
                    .count_all()
                    .count_filtered("paid", Filter::new().field("status", "paid"))
                    .count_filtered("refunded", Filter::new().field("status", "refunded")),
            ),
    );

    let compiled = compiler("postgresql").compile(&query).unwrap();

    assert_eq!(
        compiled.sql,
        r#"SELECT COUNT(*) AS "_count", COUNT(*) FILTER (WHERE "status" = $2) AS "paid", COUNT(*) FILTER (WHERE "status" = $3) AS "refunded" FROM "orders" WHERE "user_id" = $1"#
    );
    assert_eq!(
        compiled.args,
        vec![QueryValue::from("u1"), QueryValue::from("paid"), QueryValue::from("refunded")]
    );
}

#[test]
fn filtered_counts_over_a_page_refer_to_the_limited_rows() {
    let query = Query::new("Product", Action::Aggregate).with_arguments(
        QueryArguments::new()
            .filter(Filter::new().field("name", "Lamp"))
            .take(10)
            .aggregation(
                AggregationSpec::new()
                    .count_filtered("wellReviewed", Filter::new().field("reviews", some(Filter::new().field("rating", gte(4)))))
                    .count_filtered("named", Filter::new().field("name", "Desk")),
            ),
    );

    let compiled = compiler("postgresql").compile(&query).unwrap();

    assert_eq!(
        compiled.sql,
        [
            r#"SELECT COUNT(*) FILTER (WHERE EXISTS (SELECT 1 FROM "Review" WHERE "productId" = "sub"."id" AND "rating" >= $2)) AS "wellReviewed","#,
            r#"COUNT(*) FILTER (WHERE "sub"."name" = $3) AS "named""#,
            r#"FROM (SELECT * FROM "Product" WHERE "name" = $1 LIMIT 10) AS "sub""#,
        ]
        .join(" ")
    );
    assert_eq!(
        compiled.args,
        vec![QueryValue::from("Lamp"), QueryValue::Int(4), QueryValue::from("Desk")]
    );
}

fn create_post_with_tags() -> Query {
    Query::new("Post", Action::Create).with_arguments(QueryArguments::new().data(data_record([
        ("id", DataValue::from("p1")),
        ("title", DataValue::from("Hello")),
        (
            "tags",
            DataValue::from(RelationWrite::default().connect([ConnectTarget::id("u1"), ConnectTarget::id("u2")])),
        ),
    ])))
}

#[test]
fn many_to_many_connect_becomes_idempotent_junction_inserts() {
    let mutation = compiler("postgresql")
        .compile_with_relations(&create_post_with_tags())
        .unwrap();

    assert_eq!(
        mutation.main_query.sql,
        r#"INSERT INTO "Post" ("id","title") VALUES ($1,$2) RETURNING *"#
    );

    let statements = mutation
        .relation_mutations
        .iter()
        .map(|query| (query.sql.as_str(), query.args.clone()))
        .collect::<Vec<_>>();

    assert_eq!(
        statements,
        vec![
            (
                r#"INSERT INTO "_PostToTag" ("A","B") VALUES ($1,$2) ON CONFLICT DO NOTHING"#,
                vec![QueryValue::from("p1"), QueryValue::from("u1")]
            ),
            (
                r#"INSERT INTO "_PostToTag" ("A","B") VALUES ($1,$2) ON CONFLICT DO NOTHING"#,
                vec![QueryValue::from("p1"), QueryValue::from("u2")]
            ),
        ]
    );
}

#[test]
fn junction_inserts_are_idempotent_in_every_dialect() {
    let mysql = compiler("mysql").compile_with_relations(&create_post_with_tags()).unwrap();
    assert_eq!(
        mysql.relation_mutations[0].sql,
        "INSERT IGNORE INTO `_PostToTag` (`A`,`B`) VALUES (?,?)"
    );

    let sqlite = compiler("sqlite").compile_with_relations(&create_post_with_tags()).unwrap();
    assert_eq!(
        sqlite.relation_mutations[1].sql,
        "INSERT OR IGNORE INTO `_PostToTag` (`A`,`B`) VALUES (?,?)"
    );
}

#[test]
fn plain_compile_rejects_relation_writes() {
    let err = compiler("postgresql").compile(&create_post_with_tags()).unwrap_err();

    assert!(err.is_argument_error());
    assert!(err.to_string().contains("compile_with_relations"));
}

#[test]
fn connect_and_disconnect_on_update() {
    let query = Query::new("Tag", Action::Update).with_arguments(
        QueryArguments::new()
            .filter(Filter::new().field("id", equals("t1")))
            .data(data_record([
                ("name", DataValue::from("rust")),
                (
                    "posts",
                    DataValue::from(
                        RelationWrite::default()
                            .connect([ConnectTarget::id("p1")])
                            .disconnect([ConnectTarget::id("p2")]),
                    ),
                ),
            ])),
    );

    let mutation = compiler("sqlite").compile_with_relations(&query).unwrap();

    assert_eq!(mutation.main_query.sql, "UPDATE `Tag` SET `name` = ? WHERE `id` = ?");
    assert_eq!(
        mutation
            .relation_mutations
            .iter()
            .map(|query| query.sql.as_str())
            .collect::<Vec<_>>(),
        vec![
            "INSERT OR IGNORE INTO `_PostToTag` (`B`,`A`) VALUES (?,?)",
            "DELETE FROM `_PostToTag` WHERE `B` = ? AND `A` = ?",
        ]
    );
    assert_eq!(
        mutation.relation_mutations[1].args,
        vec![QueryValue::from("t1"), QueryValue::from("p2")]
    );
}

#[test]
fn update_with_only_junction_writes_selects_the_row() {
    let query = Query::new("Post", Action::Update).with_arguments(
        QueryArguments::new()
            .filter(Filter::new().field("id", "p1"))
            .data(data_record([(
                "tags",
                RelationWrite::default().disconnect([ConnectTarget::id("u1")]),
            )])),
    );

    let mutation = compiler("postgresql").compile_with_relations(&query).unwrap();

    assert_eq!(mutation.main_query.sql, r#"SELECT * FROM "Post" WHERE "id" = $1"#);
    assert_eq!(
        mutation.relation_mutations[0].sql,
        r#"DELETE FROM "_PostToTag" WHERE "A" = $1 AND "B" = $2"#
    );
}

#[test]
fn connect_by_a_non_id_field_looks_the_id_up() {
    let query = Query::new("Post", Action::Create).with_arguments(QueryArguments::new().data(data_record([
        ("id", DataValue::from("p1")),
        (
            "tags",
            DataValue::from(RelationWrite::default().connect([ConnectTarget {
                field: "name".into(),
                value: QueryValue::from("rust"),
            }])),
        ),
    ])));

    let mutation = compiler("postgresql").compile_with_relations(&query).unwrap();

    assert_eq!(
        mutation.relation_mutations[0].sql,
        r#"INSERT INTO "_PostToTag" ("A","B") VALUES ($1,(SELECT "id" FROM "Tag" WHERE "name" = $2)) ON CONFLICT DO NOTHING"#
    );
}

#[test]
fn relation_writes_need_a_many_to_many_relation_and_a_source_id() {
    let to_one = Query::new("Post", Action::Create).with_arguments(QueryArguments::new().data(data_record([
        ("id", DataValue::from("p1")),
        ("author", DataValue::from(RelationWrite::default().connect([ConnectTarget::id("u1")]))),
    ])));

    let err = compiler("postgresql").compile_with_relations(&to_one).unwrap_err();
    assert!(err.to_string().contains("`authorId`"));

    let update_without_id = Query::new("Post", Action::Update).with_arguments(
        QueryArguments::new()
            .filter(Filter::new().field("title", "Hello"))
            .data(data_record([(
                "tags",
                RelationWrite::default().connect([ConnectTarget::id("u1")]),
            )])),
    );

    let err = compiler("postgresql").compile_with_relations(&update_without_id).unwrap_err();
    assert!(err.is_argument_error());
    assert!(err.to_string().contains("`id` in `where`"));
}

#[test]
fn connecting_a_created_row_without_an_id_waits_for_the_generated_one() {
    let query = Query::new("Post", Action::Create).with_arguments(QueryArguments::new().data(data_record([
        ("title", DataValue::from("Hello")),
        (
            "tags",
            DataValue::from(RelationWrite::default().connect([ConnectTarget::id("t1"), ConnectTarget::id("t2")])),
        ),
    ])));

    let mutation = compiler("postgresql").compile_with_relations(&query).unwrap();

    assert_eq!(
        mutation.main_query.sql,
        r#"INSERT INTO "Post" ("title") VALUES ($1) RETURNING *"#
    );
    assert_eq!(mutation.generated_id.as_ref().map(|id| id.column.as_str()), Some("id"));
    assert_eq!(
        mutation.relation_mutations[0].args,
        vec![QueryValue::Null, QueryValue::from("t1")]
    );

    let bound = mutation.bind_generated_id(&QueryValue::from("p9"));

    assert_eq!(bound[1].args, vec![QueryValue::from("p9"), QueryValue::from("t2")]);
    assert_eq!(bound[1].arg_types, vec![ArgType::Text, ArgType::Text]);
    assert_eq!(bound[1].sql, mutation.relation_mutations[1].sql);
}

#[test]
fn implicit_junction_columns_follow_the_model_names() {
    let query = Query::new("Tag", Action::Create).with_arguments(QueryArguments::new().data(data_record([
        ("id", DataValue::from("t1")),
        (
            "posts",
            DataValue::from(RelationWrite::default().connect([ConnectTarget::id("p1")])),
        ),
    ])));

    let mutation = compiler("postgresql").compile_with_relations(&query).unwrap();

    assert_eq!(
        mutation.relation_mutations[0].sql,
        r#"INSERT INTO "_PostToTag" ("B","A") VALUES ($1,$2) ON CONFLICT DO NOTHING"#
    );
    assert_eq!(
        mutation.relation_mutations[0].args,
        vec![QueryValue::from("t1"), QueryValue::from("p1")]
    );
    assert!(mutation.generated_id.is_none());
}

#[test]
fn compile_from_json() {
    let compiled = compiler("mysql")
        .compile_json(json!({
            "modelName": "User",
            "action": "findFirst",
            "query": {
                "arguments": {
                    "where": { "OR": [{ "email": { "endsWith": "@b.com" } }, { "name": null }] },
                    "orderBy": { "name": "desc" },
                },
            },
        }))
        .unwrap();

    assert_eq!(
        compiled.sql,
        "SELECT * FROM `User` WHERE ((`email` LIKE ?) OR (`name` IS NULL)) ORDER BY `name` DESC LIMIT 1"
    );
    assert_eq!(compiled.args, vec![QueryValue::from("%@b.com")]);
}

#[test]
fn unknown_actions_are_unsupported() {
    let err = compiler("postgresql")
        .compile_json(json!({ "modelName": "User", "action": "truncate", "query": {} }))
        .unwrap_err();

    assert!(!err.is_argument_error());
}

#[test]
fn argument_values_keep_their_type_and_order() {
    let query = Query::new("User", Action::FindMany).with_arguments(
        QueryArguments::new().filter(
            Filter::from_json(json!({
                "name": "Ann",
                "age": 41,
                "score": 9.5,
                "active": true,
                "createdAt": { "gte": "2024-01-01T00:00:00.000Z" },
                "deletedAt": { "not": null },
            }))
            .unwrap(),
        ),
    );

    let compiled = compiler("sqlite").compile(&query).unwrap();

    assert_eq!(
        compiled.args,
        vec![
            QueryValue::from("Ann"),
            QueryValue::Int(41),
            QueryValue::Float(9.5),
            QueryValue::Boolean(true),
            QueryValue::from("2024-01-01T00:00:00.000Z"),
        ]
    );
    assert_eq!(
        compiled.arg_types,
        vec![ArgType::Text, ArgType::Int32, ArgType::Double, ArgType::Boolean, ArgType::Text]
    );
}
