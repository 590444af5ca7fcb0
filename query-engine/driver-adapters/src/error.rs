use serde::Deserialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdapterError>;

/// Failures reported by a driver. Adapters written outside of Rust report them as JSON objects
/// tagged with `kind`, which deserialize into this type directly.
#[derive(Debug, Clone, PartialEq, Eq, Error, Deserialize)]
#[serde(tag = "kind")]
pub enum AdapterError {
    /// The database rejected a statement.
    #[error("Error in query: {message}{}", code.as_ref().map(|code| format!(" (code {code})")).unwrap_or_default())]
    Query {
        #[serde(default)]
        code: Option<String>,
        message: String,
    },

    #[error("Error in connector: {message}")]
    Connection { message: String },

    #[error("Transaction already closed: {message}")]
    TransactionClosed { message: String },

    /// A value could not be converted between the driver and the engine.
    #[error("Conversion failed: {message}")]
    Conversion { message: String },

    #[error("{message}")]
    Generic { message: String },
}

impl AdapterError {
    pub fn query(message: impl Into<String>) -> Self {
        Self::Query {
            code: None,
            message: message.into(),
        }
    }

    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    pub fn transaction_closed(action: &str) -> Self {
        Self::TransactionClosed {
            message: format!("A {action} cannot be executed on a closed transaction."),
        }
    }
}

impl From<query_value::ConversionFailure> for AdapterError {
    fn from(failure: query_value::ConversionFailure) -> Self {
        Self::Conversion {
            message: failure.to_string(),
        }
    }
}
