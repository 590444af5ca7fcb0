use super::{DEFAULT_ID_COLUMN, ModelSchema, RelationInfo, RelationKind};
use crate::{QueryStructureError, Result};
use indexmap::IndexMap;
use once_cell::sync::{Lazy, OnceCell};
use serde::Deserialize;
use std::sync::Arc;

static DEFAULT_REGISTRY: OnceCell<Arc<SchemaRegistry>> = OnceCell::new();
static EMPTY_REGISTRY: Lazy<Arc<SchemaRegistry>> = Lazy::new(|| Arc::new(SchemaRegistry::default()));

/// Catalog of registered models, keyed by model name.
///
/// Every lookup degrades gracefully for unknown models: table and column names fall back to the
/// literal names they were asked for, so queries compile without any registry at all.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "Vec<ModelSchema>")]
pub struct SchemaRegistry {
    models: IndexMap<String, ModelSchema>,
}

impl From<Vec<ModelSchema>> for SchemaRegistry {
    fn from(models: Vec<ModelSchema>) -> Self {
        models.into_iter().fold(SchemaRegistry::new(), SchemaRegistry::with_model)
    }
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a list of models in the schema JSON shape.
    pub fn from_json(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value)
            .map_err(|err| QueryStructureError::invalid_argument("schema", err.to_string()))
    }

    /// Registers `model`, replacing a previous registration under the same name.
    pub fn register_model(&mut self, model: ModelSchema) {
        tracing::trace!(model = %model.name, table = %model.table_name, "registering model");
        self.models.insert(model.name.clone(), model);
    }

    pub fn with_model(mut self, model: ModelSchema) -> Self {
        self.register_model(model);
        self
    }

    /// Makes `registry` the process-wide default returned by [`SchemaRegistry::default_instance`].
    /// Can only happen once.
    pub fn install_default(registry: SchemaRegistry) -> Result<()> {
        DEFAULT_REGISTRY
            .set(Arc::new(registry))
            .map_err(|_| QueryStructureError::DefaultRegistryAlreadyInstalled)
    }

    /// The installed default registry, or an empty one.
    pub fn default_instance() -> Arc<SchemaRegistry> {
        match DEFAULT_REGISTRY.get() {
            Some(registry) => Arc::clone(registry),
            None => Arc::clone(&EMPTY_REGISTRY),
        }
    }

    pub fn model(&self, name: &str) -> Option<&ModelSchema> {
        self.models.get(name)
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn models(&self) -> impl Iterator<Item = &ModelSchema> {
        self.models.values()
    }

    /// The model stored in `table`, looked up by table name first and by model name second.
    pub fn find_by_table(&self, table: &str) -> Option<&ModelSchema> {
        self.models
            .values()
            .find(|m| m.table_name == table)
            .or_else(|| self.models.get(table))
    }

    pub fn resolve_table<'a>(&'a self, model: &'a str) -> &'a str {
        self.models.get(model).map(|m| m.table_name.as_str()).unwrap_or(model)
    }

    pub fn resolve_column<'a>(&'a self, model: &str, field: &'a str) -> &'a str {
        match self.models.get(model) {
            Some(m) => m.column_name(field),
            None => field,
        }
    }

    pub fn resolve_relation(&self, model: &str, relation: &str) -> Option<&RelationInfo> {
        self.models.get(model).and_then(|m| m.find_relation(relation))
    }

    pub fn id_column(&self, model: &str) -> &str {
        self.models.get(model).map(ModelSchema::id_column).unwrap_or(DEFAULT_ID_COLUMN)
    }

    /// Whether rows of `model` store the foreign key of `relation`.
    pub fn holds_foreign_key(&self, model: &str, relation: &RelationInfo) -> bool {
        match relation.kind {
            RelationKind::ManyToOne => true,
            RelationKind::OneToMany | RelationKind::ManyToMany => false,
            RelationKind::OneToOne => relation
                .holds_foreign_key
                .unwrap_or_else(|| self.one_to_one_key_side(model, relation)),
        }
    }

    /// Exactly one side of an unflagged one-to-one relation holds the key: the side with the
    /// column, else the side the key is named after the target of (`userId` points at `User`), else
    /// the model whose name sorts last.
    fn one_to_one_key_side(&self, model: &str, relation: &RelationInfo) -> bool {
        let target = relation.target_model.as_str();
        let has_key = |name: &str| {
            self.models
                .get(name)
                .is_some_and(|m| m.has_column(&relation.foreign_key))
        };

        match (has_key(model), has_key(target)) {
            (own, _) if model == target => own,
            (true, false) => true,
            (false, true) => false,
            _ => {
                let key = relation.foreign_key.to_lowercase();
                let named_after = |name: &str| key.starts_with(&name.to_lowercase());

                match (named_after(target), named_after(model)) {
                    (true, false) => true,
                    (false, true) => false,
                    _ => model > target,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldInfo, TypeIdentifier};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::new()
            .with_model(
                ModelSchema::new("User")
                    .table("users")
                    .field(FieldInfo::new("id", TypeIdentifier::String).id())
                    .field(FieldInfo::new("firstName", TypeIdentifier::String).column("first_name"))
                    .relation(RelationInfo::one_to_one("profile", "Profile", "userId")),
            )
            .with_model(
                ModelSchema::new("Profile")
                    .field(FieldInfo::new("id", TypeIdentifier::String).id())
                    .field(FieldInfo::new("userId", TypeIdentifier::String))
                    .relation(RelationInfo::one_to_one("user", "User", "userId")),
            )
    }

    #[test]
    fn resolves_mapped_names() {
        let registry = registry();

        assert_eq!(registry.resolve_table("User"), "users");
        assert_eq!(registry.resolve_column("User", "firstName"), "first_name");
        assert_eq!(registry.resolve_column("User", "nickname"), "nickname");
    }

    #[test]
    fn unknown_models_fall_back_to_literal_names() {
        let registry = SchemaRegistry::new();

        assert_eq!(registry.resolve_table("Order"), "Order");
        assert_eq!(registry.resolve_column("Order", "total"), "total");
        assert_eq!(registry.id_column("Order"), "id");
        assert!(registry.resolve_relation("Order", "items").is_none());
    }

    #[test]
    fn one_to_one_key_side_follows_the_columns() {
        let registry = registry();
        let from_user = registry.resolve_relation("User", "profile").unwrap();
        let from_profile = registry.resolve_relation("Profile", "user").unwrap();

        assert!(!registry.holds_foreign_key("User", from_user));
        assert!(registry.holds_foreign_key("Profile", from_profile));
    }

    #[test]
    fn one_to_one_key_side_without_fields_is_decided_once() {
        let registry = SchemaRegistry::new()
            .with_model(ModelSchema::new("User").relation(RelationInfo::one_to_one("profile", "Profile", "userId")))
            .with_model(ModelSchema::new("Profile").relation(RelationInfo::one_to_one("user", "User", "userId")))
            .with_model(ModelSchema::new("Account").relation(RelationInfo::one_to_one("wallet", "Wallet", "ownerRef")))
            .with_model(ModelSchema::new("Wallet").relation(RelationInfo::one_to_one("account", "Account", "ownerRef")));

        let holds = |model: &str, field: &str| {
            let relation = registry.resolve_relation(model, field).unwrap();
            registry.holds_foreign_key(model, relation)
        };

        assert!(!holds("User", "profile"));
        assert!(holds("Profile", "user"));

        assert!(!holds("Account", "wallet"));
        assert!(holds("Wallet", "account"));
    }

    #[test]
    fn one_to_one_key_side_flag_wins_over_the_columns() {
        let registry = SchemaRegistry::new()
            .with_model(
                ModelSchema::new("User")
                    .field(FieldInfo::new("id", TypeIdentifier::String).id())
                    .field(FieldInfo::new("profileId", TypeIdentifier::String))
                    .relation(RelationInfo::one_to_one("profile", "Profile", "profileId").holds_foreign_key(false)),
            )
            .with_model(
                ModelSchema::new("Profile").relation(RelationInfo::one_to_one("user", "User", "profileId").holds_foreign_key(true)),
            );

        let from_user = registry.resolve_relation("User", "profile").unwrap();
        let from_profile = registry.resolve_relation("Profile", "user").unwrap();

        assert!(!registry.holds_foreign_key("User", from_user));
        assert!(registry.holds_foreign_key("Profile", from_profile));

        let parsed: RelationInfo = serde_json::from_value(json!({
            "name": "profile",
            "type": "oneToOne",
            "targetModel": "Profile",
            "foreignKey": "profileId",
            "holdsForeignKey": false
        }))
        .unwrap();
        assert_eq!(parsed, *from_user);
    }

    #[test]
    fn find_by_table_matches_table_then_model_name() {
        let registry = registry();

        assert_eq!(registry.find_by_table("users").map(|m| m.name.as_str()), Some("User"));
        assert_eq!(registry.find_by_table("Profile").map(|m| m.name.as_str()), Some("Profile"));
        assert!(registry.find_by_table("orders").is_none());
    }

    #[test]
    fn registry_deserializes_from_a_model_list() {
        let registry = SchemaRegistry::from_json(json!([
            { "name": "Post", "tableName": "posts" },
            { "name": "Tag", "tableName": "tags" }
        ]))
        .unwrap();

        assert_eq!(registry.model_names().collect::<Vec<_>>(), vec!["Post", "Tag"]);
    }
}
