use crate::{CompileError, CompileResult, Dialect};
use heck::ToSnakeCase;
use query_structure::SchemaRegistry;

/// What every part of a compilation needs to know, borrowed for the duration of one `compile` call.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Context<'a> {
    pub(crate) dialect: Dialect,
    pub(crate) registry: &'a SchemaRegistry,
    pub(crate) strict: bool,
}

impl Context<'_> {
    pub(crate) fn quote(&self, ident: &str) -> String {
        self.dialect.quote(ident)
    }

    pub(crate) fn table(&self, model: &str) -> String {
        self.registry.resolve_table(model).to_owned()
    }

    pub(crate) fn column(&self, model: &str, field: &str) -> String {
        self.registry.resolve_column(model, field).to_owned()
    }

    /// Rejects unregistered PascalCase model names when strict validation is on.
    pub(crate) fn check_model(&self, model: &str) -> CompileResult<()> {
        if !self.strict || self.registry.is_registered(model) || self.registry.find_by_table(model).is_some() {
            return Ok(());
        }

        if !looks_like_model_name(model) {
            return Ok(());
        }

        Err(CompileError::StrictValidation {
            model: model.to_owned(),
            suggestion: model.to_snake_case(),
            registered: self.registry.model_names().map(ToOwned::to_owned).collect(),
        })
    }
}

/// `User`, `OrderItem`: starts upper-case, has lower-case letters and no underscores.
fn looks_like_model_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
        && name.chars().any(|c| c.is_ascii_lowercase())
        && !name.contains('_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use query_structure::ModelSchema;

    #[test]
    fn model_name_heuristic() {
        assert!(looks_like_model_name("User"));
        assert!(looks_like_model_name("OrderItem"));
        assert!(!looks_like_model_name("users"));
        assert!(!looks_like_model_name("order_items"));
        assert!(!looks_like_model_name("USERS"));
        assert!(!looks_like_model_name("Order_Item"));
    }

    #[test]
    fn strict_mode_suggests_the_snake_case_table() {
        let registry = SchemaRegistry::new().with_model(ModelSchema::new("Account").table("accounts"));
        let ctx = Context {
            dialect: Dialect::Postgres,
            registry: &registry,
            strict: true,
        };

        assert!(ctx.check_model("Account").is_ok());
        assert!(ctx.check_model("accounts").is_ok());
        assert!(ctx.check_model("order_items").is_ok());

        let err = ctx.check_model("OrderItem").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Model `OrderItem` is not registered. Did you mean the table `order_item`? Registered models: Account."
        );
    }

    #[test]
    fn lenient_mode_accepts_anything() {
        let registry = SchemaRegistry::new();
        let ctx = Context {
            dialect: Dialect::Sqlite,
            registry: &registry,
            strict: false,
        };

        assert!(ctx.check_model("OrderItem").is_ok());
    }
}
