use driver_adapters::AdapterError;
use query_compiler::CompileError;
use query_structure::Action;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExecutorError>;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Returned by the adapter, unchanged.
    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error("Failed to convert the value of column `{column}`: {message}")]
    Conversion { column: String, message: String },

    #[error("No `{model}` record was found for a {action} query.")]
    RecordNotFound { model: String, action: Action },

    #[error("The database returned no generated `{column}` for the created row, its relations cannot be connected.")]
    MissingGeneratedId { column: String },
}

impl ExecutorError {
    pub(crate) fn conversion(column: &str, message: impl Into<String>) -> Self {
        Self::Conversion {
            column: column.to_owned(),
            message: message.into(),
        }
    }

    pub fn is_record_not_found(&self) -> bool {
        matches!(self, Self::RecordNotFound { .. })
    }
}
