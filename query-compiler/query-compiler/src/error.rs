use query_structure::QueryStructureError;
use thiserror::Error;

pub type CompileResult<T> = std::result::Result<T, CompileError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("{}", message)]
    Argument { message: String },

    #[error("Unknown filter operator(s) on field `{}`: {}. Supported operators are: {}.", field, operators.join(", "), supported)]
    UnknownOperators {
        field: String,
        operators: Vec<String>,
        supported: String,
    },

    #[error(
        "Model `{}` is not registered. Did you mean the table `{}`?{}",
        model,
        suggestion,
        registered_hint(registered)
    )]
    StrictValidation {
        model: String,
        suggestion: String,
        registered: Vec<String>,
    },

    #[error("{}", message)]
    Unsupported { message: String },
}

fn registered_hint(registered: &[String]) -> String {
    if registered.is_empty() {
        String::new()
    } else {
        format!(" Registered models: {}.", registered.join(", "))
    }
}

impl CompileError {
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument {
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::Unsupported {
            message: message.into(),
        }
    }

    /// Everything but unsupported actions is a caller-fixable argument error.
    pub fn is_argument_error(&self) -> bool {
        !matches!(self, CompileError::Unsupported { .. })
    }
}

impl From<QueryStructureError> for CompileError {
    fn from(err: QueryStructureError) -> Self {
        match err {
            QueryStructureError::UnknownAction { .. } => CompileError::unsupported(err.to_string()),
            err => CompileError::argument(err.to_string()),
        }
    }
}
