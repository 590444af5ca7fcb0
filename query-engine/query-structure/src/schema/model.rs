use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

pub const DEFAULT_ID_COLUMN: &str = "id";
pub const DEFAULT_JOIN_COLUMN: &str = "A";
pub const DEFAULT_INVERSE_JOIN_COLUMN: &str = "B";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeIdentifier {
    String,
    Int,
    BigInt,
    Float,
    Decimal,
    Boolean,
    DateTime,
    Json,
    Bytes,
    #[serde(rename = "UUID")]
    Uuid,
    Enum(String),
}

impl FromStr for TypeIdentifier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s {
            "String" => TypeIdentifier::String,
            "Int" => TypeIdentifier::Int,
            "BigInt" => TypeIdentifier::BigInt,
            "Float" => TypeIdentifier::Float,
            "Decimal" => TypeIdentifier::Decimal,
            "Boolean" => TypeIdentifier::Boolean,
            "DateTime" => TypeIdentifier::DateTime,
            "Json" => TypeIdentifier::Json,
            "Bytes" => TypeIdentifier::Bytes,
            "UUID" | "Uuid" => TypeIdentifier::Uuid,
            other => return Err(format!("Unknown scalar type `{other}`")),
        };

        Ok(ty)
    }
}

impl fmt::Display for TypeIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeIdentifier::Enum(name) => write!(f, "Enum({name})"),
            TypeIdentifier::Uuid => f.write_str("UUID"),
            other => write!(f, "{other:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldInfo {
    pub name: String,
    pub column_name: String,
    #[serde(rename = "type")]
    pub type_identifier: TypeIdentifier,
    #[serde(default)]
    pub is_id: bool,
}

impl FieldInfo {
    /// A field stored in a column of the same name.
    pub fn new(name: impl Into<String>, type_identifier: TypeIdentifier) -> Self {
        let name = name.into();

        Self {
            column_name: name.clone(),
            name,
            type_identifier,
            is_id: false,
        }
    }

    pub fn column(mut self, column_name: impl Into<String>) -> Self {
        self.column_name = column_name.into();
        self
    }

    pub fn id(mut self) -> Self {
        self.is_id = true;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationKind {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl RelationKind {
    pub fn is_list(self) -> bool {
        matches!(self, RelationKind::OneToMany | RelationKind::ManyToMany)
    }
}

/// A relation as seen from the model declaring it.
///
/// For `oneToMany` the foreign key lives on the target, for `manyToOne` on the declaring model.
/// `oneToOne` relations hold the key on the side flagged with `holdsForeignKey`, else on whichever
/// side has a field for it. `references` is the column on the other side the key points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: RelationKind,
    pub target_model: String,
    #[serde(default)]
    pub foreign_key: String,
    #[serde(default = "default_references")]
    pub references: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_table: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub join_column: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inverse_join_column: Option<String>,
    /// Which side of a `oneToOne` relation stores the key, when the fields cannot tell.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub holds_foreign_key: Option<bool>,
}

fn implicit_join_columns<'a>(model: &str, target_model: &str) -> (&'a str, &'a str) {
    if model <= target_model {
        (DEFAULT_JOIN_COLUMN, DEFAULT_INVERSE_JOIN_COLUMN)
    } else {
        (DEFAULT_INVERSE_JOIN_COLUMN, DEFAULT_JOIN_COLUMN)
    }
}

fn default_references() -> String {
    DEFAULT_ID_COLUMN.to_owned()
}

impl RelationInfo {
    fn new(name: impl Into<String>, kind: RelationKind, target_model: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            target_model: target_model.into(),
            foreign_key: String::new(),
            references: default_references(),
            join_table: None,
            join_column: None,
            inverse_join_column: None,
            holds_foreign_key: None,
        }
    }

    pub fn one_to_many(name: impl Into<String>, target_model: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::new(name, RelationKind::OneToMany, target_model).foreign_key(foreign_key)
    }

    pub fn many_to_one(name: impl Into<String>, target_model: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::new(name, RelationKind::ManyToOne, target_model).foreign_key(foreign_key)
    }

    pub fn one_to_one(name: impl Into<String>, target_model: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::new(name, RelationKind::OneToOne, target_model).foreign_key(foreign_key)
    }

    pub fn many_to_many(name: impl Into<String>, target_model: impl Into<String>, join_table: impl Into<String>) -> Self {
        let mut relation = Self::new(name, RelationKind::ManyToMany, target_model);
        relation.join_table = Some(join_table.into());
        relation
    }

    pub fn foreign_key(mut self, foreign_key: impl Into<String>) -> Self {
        self.foreign_key = foreign_key.into();
        self
    }

    pub fn references(mut self, references: impl Into<String>) -> Self {
        self.references = references.into();
        self
    }

    pub fn holds_foreign_key(mut self, holds: bool) -> Self {
        self.holds_foreign_key = Some(holds);
        self
    }

    /// Junction columns pointing at the declaring model and at the target model.
    pub fn join_columns(mut self, join_column: impl Into<String>, inverse_join_column: impl Into<String>) -> Self {
        self.join_column = Some(join_column.into());
        self.inverse_join_column = Some(inverse_join_column.into());
        self
    }

    pub fn is_many_to_many(&self) -> bool {
        self.kind == RelationKind::ManyToMany
    }

    /// The junction table of a many-to-many relation, `_<Model>To<Target>` style names included.
    pub fn junction_table(&self) -> Option<&str> {
        self.join_table.as_deref()
    }

    /// The junction column pointing at `model`, the model declaring this relation.
    ///
    /// Implicit junction tables store the model whose name sorts first in `A` and the other one in
    /// `B`, so both sides of the relation agree on the columns without configuration.
    pub fn join_column(&self, model: &str) -> &str {
        match &self.join_column {
            Some(column) => column,
            None => implicit_join_columns(model, &self.target_model).0,
        }
    }

    /// The junction column pointing at the target model.
    pub fn inverse_join_column(&self, model: &str) -> &str {
        match &self.inverse_join_column {
            Some(column) => column,
            None => implicit_join_columns(model, &self.target_model).1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSchema {
    pub name: String,
    pub table_name: String,
    #[serde(default)]
    pub fields: IndexMap<String, FieldInfo>,
    #[serde(default)]
    pub relations: IndexMap<String, RelationInfo>,
}

impl ModelSchema {
    /// A model stored in a table of the same name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();

        Self {
            table_name: name.clone(),
            name,
            fields: IndexMap::new(),
            relations: IndexMap::new(),
        }
    }

    pub fn table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn field(mut self, field: FieldInfo) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    pub fn relation(mut self, relation: RelationInfo) -> Self {
        self.relations.insert(relation.name.clone(), relation);
        self
    }

    pub fn find_field(&self, name: &str) -> Option<&FieldInfo> {
        self.fields.get(name)
    }

    pub fn find_relation(&self, name: &str) -> Option<&RelationInfo> {
        self.relations.get(name)
    }

    pub fn id_field(&self) -> Option<&FieldInfo> {
        self.fields.values().find(|f| f.is_id)
    }

    pub fn id_column(&self) -> &str {
        self.id_field().map(|f| f.column_name.as_str()).unwrap_or(DEFAULT_ID_COLUMN)
    }

    /// Maps a field name to its column, leaving unknown names untouched.
    pub fn column_name<'a>(&'a self, field: &'a str) -> &'a str {
        self.fields.get(field).map(|f| f.column_name.as_str()).unwrap_or(field)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.fields.values().any(|f| f.column_name == column || f.name == column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.values().map(|f| f.column_name.as_str())
    }
}
