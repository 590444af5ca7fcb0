//! Compiles query IR values into parameterized SQL for one dialect.
//!
//! ```ignore
//! let compiler = QueryCompiler::new(CompilerConfig::new(Dialect::Postgres), registry);
//! let compiled = compiler.compile(&query)?;
//! ```

mod alias;
mod compiled;
mod computed;
mod config;
mod context;
mod dialect;
mod error;
mod filter;
mod fragment;
mod include;
mod read;
mod relations;
mod write;

pub use compiled::{CompiledMutation, CompiledQuery, GeneratedId, IncludeInfo};
pub use config::{CompilerConfig, CompilerSettings, STRICT_VALIDATION_ENV};
pub use dialect::{Capability, Dialect, PlaceholderFormat};
pub use error::{CompileError, CompileResult};

use context::Context;
use query_structure::{Action, Query, SchemaRegistry};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct QueryCompiler {
    config: CompilerConfig,
    registry: Arc<SchemaRegistry>,
}

impl QueryCompiler {
    pub fn new(config: CompilerConfig, registry: Arc<SchemaRegistry>) -> Self {
        Self { config, registry }
    }

    /// A compiler for a dialect name, using the process-wide settings and default registry.
    pub fn for_dialect(dialect: &str) -> Self {
        Self::new(
            CompilerConfig::new(Dialect::from_name(dialect)),
            SchemaRegistry::default_instance(),
        )
    }

    pub fn dialect(&self) -> Dialect {
        self.config.dialect
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SchemaRegistry> {
        &self.registry
    }

    /// Compiles `query` into a single statement. Data holding `connect`/`disconnect` instructions
    /// is rejected, see [`QueryCompiler::compile_with_relations`].
    pub fn compile(&self, query: &Query) -> CompileResult<CompiledQuery> {
        let compiled = dispatch(&self.context(), query)?;
        self.trace(query, &compiled);

        Ok(compiled)
    }

    /// Compiles a query given in the JSON protocol shape.
    pub fn compile_json(&self, query: serde_json::Value) -> CompileResult<CompiledQuery> {
        self.compile(&Query::from_json(query)?)
    }

    /// Compiles a `create` or `update` together with the junction table statements of its
    /// many-to-many `connect`/`disconnect` instructions.
    pub fn compile_with_relations(&self, query: &Query) -> CompileResult<CompiledMutation> {
        let mutation = relations::compile_with_relations(&self.context(), query)?;

        self.trace(query, &mutation.main_query);
        for statement in &mutation.relation_mutations {
            self.trace(query, statement);
        }

        Ok(mutation)
    }

    fn context(&self) -> Context<'_> {
        Context {
            dialect: self.config.dialect,
            registry: &self.registry,
            strict: self.config.is_strict(),
        }
    }

    fn trace(&self, query: &Query, compiled: &CompiledQuery) {
        debug_assert_eq!(compiled.placeholder_count(), compiled.args.len());

        tracing::debug!(
            model = %query.model,
            action = %query.action,
            dialect = %self.config.dialect,
            sql = %compiled.sql,
            args = compiled.args.len(),
            "compiled query"
        );
    }
}

pub(crate) fn dispatch(ctx: &Context<'_>, query: &Query) -> CompileResult<CompiledQuery> {
    ctx.check_model(&query.model)?;

    match query.action {
        Action::FindUnique
        | Action::FindUniqueOrThrow
        | Action::FindFirst
        | Action::FindFirstOrThrow
        | Action::FindMany => read::find(ctx, query),
        Action::Count => read::count(ctx, query),
        Action::Aggregate => read::aggregate(ctx, query),
        Action::GroupBy => read::group_by(ctx, query),
        Action::Create => write::create(ctx, query),
        Action::CreateMany => write::create_many(ctx, query),
        Action::Update => write::update(ctx, query, true),
        Action::UpdateMany => write::update(ctx, query, false),
        Action::Upsert => write::upsert(ctx, query),
        Action::Delete | Action::DeleteMany => write::delete(ctx, query),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use query_structure::{Filter, QueryArguments};
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn compiled_statements_are_logged() {
        let compiler = QueryCompiler::new(
            CompilerConfig::new(Dialect::Postgres).strict_validation(false),
            Arc::new(SchemaRegistry::new()),
        );
        let query = Query::new("User", Action::DeleteMany)
            .with_arguments(QueryArguments::new().filter(Filter::new().field("id", 1)));

        compiler.compile(&query).unwrap();

        assert!(logs_contain("compiled query"));
        assert!(logs_contain(r#"DELETE FROM "User" WHERE "id" = $1"#));
    }

    #[test]
    fn for_dialect_uses_the_default_registry() {
        let compiler = QueryCompiler::for_dialect("supabase");

        assert_eq!(compiler.dialect(), Dialect::Postgres);
        assert!(Arc::ptr_eq(compiler.registry(), &SchemaRegistry::default_instance()));
    }
}
