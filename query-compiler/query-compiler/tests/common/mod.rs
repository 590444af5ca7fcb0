#![allow(dead_code)]

use query_compiler::{CompilerConfig, CompilerSettings, Dialect, QueryCompiler};
use query_structure::{FieldInfo, ModelSchema, RelationInfo, SchemaRegistry, TypeIdentifier};
use std::sync::Arc;

pub const DIALECTS: [&str; 3] = ["postgresql", "mysql", "sqlite"];

pub fn registry() -> SchemaRegistry {
    SchemaRegistry::new()
        .with_model(
            ModelSchema::new("User")
                .field(FieldInfo::new("id", TypeIdentifier::String).id())
                .field(FieldInfo::new("email", TypeIdentifier::String))
                .field(FieldInfo::new("name", TypeIdentifier::String))
                .relation(RelationInfo::one_to_many("posts", "Post", "authorId"))
                .relation(RelationInfo::one_to_many("orders", "Order", "userId")),
        )
        .with_model(
            ModelSchema::new("Post")
                .field(FieldInfo::new("id", TypeIdentifier::String).id())
                .field(FieldInfo::new("title", TypeIdentifier::String))
                .field(FieldInfo::new("authorId", TypeIdentifier::String))
                .relation(RelationInfo::many_to_one("author", "User", "authorId"))
                .relation(RelationInfo::many_to_many("tags", "Tag", "_PostToTag"))
                .relation(RelationInfo::one_to_many("comments", "Comment", "postId")),
        )
        .with_model(
            ModelSchema::new("Tag")
                .field(FieldInfo::new("id", TypeIdentifier::String).id())
                .field(FieldInfo::new("name", TypeIdentifier::String))
                .relation(RelationInfo::many_to_many("posts", "Post", "_PostToTag")),
        )
        .with_model(
            ModelSchema::new("Comment")
                .field(FieldInfo::new("id", TypeIdentifier::Int).id())
                .field(FieldInfo::new("body", TypeIdentifier::String))
                .field(FieldInfo::new("approved", TypeIdentifier::Boolean))
                .field(FieldInfo::new("postId", TypeIdentifier::String)),
        )
        .with_model(
            ModelSchema::new("Product")
                .field(FieldInfo::new("id", TypeIdentifier::Int).id())
                .field(FieldInfo::new("name", TypeIdentifier::String))
                .relation(RelationInfo::one_to_many("reviews", "Review", "productId")),
        )
        .with_model(
            ModelSchema::new("Review")
                .field(FieldInfo::new("id", TypeIdentifier::Int).id())
                .field(FieldInfo::new("rating", TypeIdentifier::Int))
                .field(FieldInfo::new("productId", TypeIdentifier::Int))
                .relation(RelationInfo::many_to_one("product", "Product", "productId")),
        )
        .with_model(
            ModelSchema::new("Order")
                .table("orders")
                .field(FieldInfo::new("id", TypeIdentifier::Int).id())
                .field(FieldInfo::new("userId", TypeIdentifier::String).column("user_id"))
                .field(FieldInfo::new("price", TypeIdentifier::Decimal))
                .field(FieldInfo::new("status", TypeIdentifier::String)),
        )
}

pub fn compiler(dialect: &str) -> QueryCompiler {
    let config = CompilerConfig::new(Dialect::from_name(dialect)).with_settings(CompilerSettings::default());
    QueryCompiler::new(config, Arc::new(registry()))
}

pub fn strict_compiler(dialect: &str) -> QueryCompiler {
    let config = CompilerConfig::new(Dialect::from_name(dialect))
        .with_settings(CompilerSettings::default())
        .strict_validation(true);

    QueryCompiler::new(config, Arc::new(registry()))
}
