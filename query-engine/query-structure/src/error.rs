use thiserror::Error;

pub type Result<T> = std::result::Result<T, QueryStructureError>;

/// Failures while assembling an IR value, either through the builders or from loosely-typed JSON.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueryStructureError {
    #[error("Cannot build a query without `{}`.", field)]
    MissingField { field: &'static str },

    #[error("Unknown query action `{}`.", action)]
    UnknownAction { action: String },

    #[error("Invalid `{}` argument: {}", argument, message)]
    InvalidArgument { argument: String, message: String },

    #[error("Invalid filter at `{}`: {}", path, message)]
    InvalidFilter { path: String, message: String },

    #[error("A schema registry has already been installed as the process default.")]
    DefaultRegistryAlreadyInstalled,
}

impl QueryStructureError {
    pub(crate) fn invalid_argument(argument: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            argument: argument.into(),
            message: message.into(),
        }
    }

    pub(crate) fn invalid_filter(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidFilter {
            path: path.into(),
            message: message.into(),
        }
    }
}
